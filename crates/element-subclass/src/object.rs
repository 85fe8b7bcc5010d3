use std::ffi::{c_void, CString};
use std::sync::Arc;

use element_sys as sys;

use crate::capability::{patch_slots, Overrides};
use crate::error::MarshalError;
use crate::subclass::{parent_class, type_data, Extendable, ObjectSubclass};
use crate::trampoline::{guard, instance_of};
use crate::types::{IsA, ObjectType, Type};
use crate::value::{marshal_warning, string_from_ptr, ParamSpec, Value};

crate::object_wrapper!(
    /// Root of every runtime class.
    pub struct Object(sys::el_object) @type sys::el_object_get_type()
);

/// Receives writes of the declared properties. `index` is the position in
/// [`ObjectSubclass::properties`].
pub trait SetProperty: ObjectSubclass {
    fn set_property(&self, object: &Object, index: usize, value: &Value, pspec: &ParamSpec);
}

/// Answers reads of the declared properties.
pub trait GetProperty: ObjectSubclass {
    fn property(&self, object: &Object, index: usize, pspec: &ParamSpec) -> Value;
}

/// Runs once the instance is fully initialized.
pub trait Constructed: ObjectSubclass {
    fn constructed(&self, object: &Object);
}

unsafe fn declared_property<T: ObjectSubclass>(id: u32) -> Option<(usize, &'static ParamSpec)> {
    let data = type_data::<T>()?;
    let index = (id as usize).checked_sub(1)?;
    match data.properties().get(index) {
        Some(pspec) => Some((index, pspec)),
        None => {
            log::warn!(target: "element_subclass::trampoline", "{}: unknown property id {id}", T::NAME);
            None
        }
    }
}

pub(crate) unsafe extern "C" fn set_property<T: SetProperty>(
    object: *mut sys::el_object,
    id: u32,
    value: *const sys::el_value,
    _pspec: *const sys::el_param_spec,
) {
    let Some((index, pspec)) = declared_property::<T>(id) else {
        return;
    };
    let value = match Value::from_raw(value) {
        Ok(value) => value,
        Err(err) => {
            marshal_warning(pspec.name(), &err);
            return;
        }
    };
    let wrapper = Object::from_raw_borrow(object);
    guard::<T, _>(object, "set_property", (), |imp| {
        SetProperty::set_property(imp, &wrapper, index, &value, pspec)
    });
}

pub(crate) unsafe extern "C" fn get_property<T: GetProperty>(
    object: *mut sys::el_object,
    id: u32,
    value: *mut sys::el_value,
    _pspec: *const sys::el_param_spec,
) {
    let Some((index, pspec)) = declared_property::<T>(id) else {
        return;
    };
    let wrapper = Object::from_raw_borrow(object);
    let answer = guard::<T, _>(object, "property", None, |imp| {
        Some(GetProperty::property(imp, &wrapper, index, pspec))
    });
    match answer {
        Some(answer) if answer.value_type() == pspec.value_type() => answer.write_raw(value),
        Some(answer) => marshal_warning(
            pspec.name(),
            &MarshalError::TypeMismatch {
                expected: pspec.value_type(),
                found: answer.value_type(),
            },
        ),
        // the runtime already initialized `value` to the type's default
        None => {}
    }
}

pub(crate) unsafe extern "C" fn constructed<T: Constructed>(object: *mut sys::el_object) {
    let wrapper = Object::from_raw_borrow(object);
    guard::<T, _>(object, "constructed", (), |imp| Constructed::constructed(imp, &wrapper));
}

/// Calls into the parent class's object slots.
pub trait ObjectParent: ObjectSubclass {
    fn parent_constructed(&self, object: &Object) {
        unsafe {
            let parent = parent_class::<Self, sys::el_object_class>();
            if let Some(constructed) = parent.as_ref().and_then(|parent| parent.constructed) {
                constructed(object.as_ptr());
            }
        }
    }
}

impl<T: ObjectSubclass> ObjectParent for T {}

unsafe impl Extendable for Object {
    type Class = sys::el_object_class;

    fn parent_type() -> Option<Type> {
        None
    }

    unsafe fn install(klass: *mut c_void, overrides: &Overrides) {
        let klass = klass as *mut sys::el_object_class;
        patch_slots!((*klass), overrides.object; set_property, get_property, constructed);
    }
}

/// Methods available on every instance.
pub trait ObjectExt: IsA<Object> {
    fn name(&self) -> Option<String> {
        unsafe { string_from_ptr(sys::el_object_get_name(self.as_object_ptr()), "object name") }
    }

    fn type_(&self) -> Type {
        Type(unsafe { sys::el_object_type(self.as_object_ptr()) })
    }

    fn ref_count(&self) -> u32 {
        unsafe { sys::el_object_ref_count(self.as_object_ptr()) }
    }

    fn is<W: ObjectType>(&self) -> bool {
        self.type_().is_a(W::static_type())
    }

    /// Views the instance as `W` if its type derives from `W`'s.
    fn downcast_ref<W: ObjectType>(&self) -> Option<&W> {
        self.is::<W>().then(|| unsafe { &*(self as *const Self as *const W) })
    }

    /// Host state of the instance, if it is an instance of `T`.
    fn imp<T: ObjectSubclass>(&self) -> Option<Arc<T>> {
        unsafe { instance_of::<T>(self.as_object_ptr()).ok() }
    }

    /// Writes a property through the runtime's property path.
    fn set_property(&self, name: &str, value: impl Into<Value>) -> Result<(), MarshalError> {
        let name_c = CString::new(name).map_err(|_| MarshalError::InteriorNul)?;
        let value = value.into();
        let mut raw = value.to_raw();
        let accepted = unsafe {
            let accepted = sys::el_object_set_property(self.as_object_ptr(), name_c.as_ptr(), &raw);
            sys::el_value_unset(&mut raw);
            accepted
        };
        if accepted == sys::EL_FALSE {
            return Err(MarshalError::PropertyRejected(name.to_owned()));
        }
        Ok(())
    }

    fn property(&self, name: &str) -> Result<Value, MarshalError> {
        let name_c = CString::new(name).map_err(|_| MarshalError::InteriorNul)?;
        unsafe {
            let mut raw = sys::el_value::zeroed();
            if sys::el_object_get_property(self.as_object_ptr(), name_c.as_ptr(), &mut raw) == sys::EL_FALSE {
                return Err(MarshalError::PropertyRejected(name.to_owned()));
            }
            let value = Value::from_raw(&raw);
            sys::el_value_unset(&mut raw);
            value
        }
    }
}

impl<O: IsA<Object>> ObjectExt for O {}
