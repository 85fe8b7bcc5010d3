//! Class table builder: registers host types as foreign subclasses.

use std::any::TypeId;
use std::collections::HashMap;
use std::ffi::{c_void, CString};
use std::mem::size_of;
use std::sync::Arc;

use arc_swap::ArcSwap;
use element_sys as sys;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::capability::{CapabilitySet, Overrides};
use crate::error::RegistrationError;
use crate::interface::TypeInit;
use crate::trampoline;
use crate::types::{ObjectType, Type};
use crate::value::{cstring_lossy, ParamSpec};

const TARGET: &str = "element_subclass::extend";

/// A host type extending a foreign base class.
///
/// Optional virtual methods are not declared here: implementing one of the
/// capability traits (`SinkRender`, `SrcGetSize`, ...) is enough for
/// [`extend!`](crate::extend!) to patch the matching slot.
pub trait ObjectSubclass: Send + Sync + Sized + 'static {
    /// Runtime type name; must be unique in the process.
    const NAME: &'static str;

    type ParentType: Extendable;

    /// Creates the host state of a new instance.
    fn new() -> Self;

    /// Properties installed with runtime ids `1..=n` in this order.
    fn properties() -> Vec<ParamSpec> {
        Vec::new()
    }

    /// Runs once the runtime type exists, before `class_init`. Interfaces
    /// are added here.
    fn type_init(_type_: &mut TypeInit<Self>) {}

    fn class_init(_klass: &mut ClassBuilder) {}
}

/// Layout and ancestry a base class promises to the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionDescriptor {
    pub foreign_type: Type,
    pub class_struct_size: usize,
    pub instance_struct_size: usize,
    pub parent: Option<Type>,
}

/// A foreign class that host types can derive from.
///
/// # Safety
/// `Class` and `Raw` must match the runtime's class and instance structs of
/// `static_type()`, and `install` may only write slots of `Class`.
pub unsafe trait Extendable: ObjectType {
    type Class: 'static;

    /// Immediate parent in the runtime's type tree.
    fn parent_type() -> Option<Type>;

    fn descriptor() -> ExtensionDescriptor {
        ExtensionDescriptor {
            foreign_type: Self::static_type(),
            class_struct_size: size_of::<Self::Class>(),
            instance_struct_size: size_of::<Self::Raw>(),
            parent: Self::parent_type(),
        }
    }

    /// Patches the detected slots of this level and every level above it,
    /// parent level first.
    ///
    /// # Safety
    /// `klass` must be a class table of a type deriving from `static_type()`.
    unsafe fn install(klass: *mut c_void, overrides: &Overrides);
}

/// Registration record of a host type.
#[derive(Debug)]
pub struct TypeData {
    type_: Type,
    parent_class: *const c_void,
    capabilities: CapabilitySet,
    properties: Vec<ParamSpec>,
    rust_type: &'static str,
    name: &'static str,
}

// The parent class table is immutable after registration.
unsafe impl Send for TypeData {}
unsafe impl Sync for TypeData {}

impl TypeData {
    pub fn type_(&self) -> Type {
        self.type_
    }

    pub fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    pub fn properties(&self) -> &[ParamSpec] {
        &self.properties
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn rust_type(&self) -> &'static str {
        self.rust_type
    }

    pub fn parent_class(&self) -> *const c_void {
        self.parent_class
    }
}

pub(crate) struct ClassInitData {
    pub(crate) overrides: Overrides,
    pub(crate) panic: Option<String>,
}

type TypeMap = HashMap<TypeId, &'static TypeData>;

static TYPES: Lazy<ArcSwap<TypeMap>> = Lazy::new(|| ArcSwap::from_pointee(HashMap::new()));
static REGISTRATION: Mutex<()> = parking_lot::const_mutex(());

/// Registration record of `T`, if it was extended.
pub fn type_data<T: ObjectSubclass>() -> Option<&'static TypeData> {
    TYPES.load().get(&TypeId::of::<T>()).copied()
}

/// Registers `T` as a subclass of `T::ParentType`, patching the slots in
/// `overrides`. Registering the same type again returns its existing type.
///
/// Use [`extend!`](crate::extend!) so the overrides are detected at `T`.
pub fn extend<T: ObjectSubclass>(overrides: Overrides) -> Result<Type, RegistrationError> {
    let _registration = REGISTRATION.lock();

    let types = TYPES.load_full();
    if let Some(data) = types.get(&TypeId::of::<T>()) {
        return Ok(data.type_);
    }
    if let Some(existing) = types.values().find(|data| data.name == T::NAME) {
        return Err(RegistrationError::NameConflict {
            name: T::NAME.to_owned(),
            existing: existing.rust_type,
        });
    }
    let name = CString::new(T::NAME).map_err(|_| RegistrationError::InvalidName(T::NAME.to_owned()))?;
    // registers the parent chain, so native names are known below
    let descriptor = <T::ParentType as Extendable>::descriptor();
    if Type::from_name(T::NAME).is_some() {
        return Err(RegistrationError::NameTaken(T::NAME.to_owned()));
    }
    validate_descriptor(T::NAME, &descriptor)?;
    let parent_class = unsafe { sys::el_type_class_peek(descriptor.foreign_type.into_raw()) };

    let mut init = ClassInitData { overrides, panic: None };
    let info = sys::el_type_info {
        class_size: descriptor.class_struct_size,
        class_init: Some(trampoline::class_init::<T>),
        class_data: &mut init as *mut ClassInitData as *mut c_void,
        instance_size: descriptor.instance_struct_size,
        instance_init: Some(trampoline::instance_init::<T>),
    };
    let raw = unsafe { sys::el_type_register_static(descriptor.foreign_type.into_raw(), name.as_ptr(), &info) };
    let type_ = Type::from_raw(raw).ok_or_else(|| RegistrationError::Rejected(T::NAME.to_owned()))?;

    if let Some(message) = init.panic {
        log::error!(target: TARGET, "{}: class init panicked: {message}", T::NAME);
        return Err(RegistrationError::ClassInit {
            name: T::NAME.to_owned(),
            message,
        });
    }

    let data: &'static TypeData = Box::leak(Box::new(TypeData {
        type_,
        parent_class: parent_class as *const c_void,
        capabilities: overrides.capabilities(),
        properties: T::properties(),
        rust_type: std::any::type_name::<T>(),
        name: T::NAME,
    }));
    let mut updated = (*types).clone();
    updated.insert(TypeId::of::<T>(), data);
    TYPES.store(Arc::new(updated));

    log::debug!(
        target: TARGET,
        "registered {} ({}) deriving from {} with {:?}",
        T::NAME,
        data.rust_type,
        descriptor.foreign_type,
        data.capabilities
    );
    Ok(type_)
}

fn validate_descriptor(name: &str, descriptor: &ExtensionDescriptor) -> Result<(), RegistrationError> {
    let mismatch = |detail: String| RegistrationError::AbiMismatch {
        name: name.to_owned(),
        detail,
    };
    let parent = descriptor.foreign_type;
    let query = parent
        .query()
        .ok_or_else(|| mismatch(format!("base type {parent:?} is unknown to the runtime")))?;
    if query.class_size != descriptor.class_struct_size {
        return Err(mismatch(format!(
            "class struct of {parent} is {} bytes, the runtime has {}",
            descriptor.class_struct_size, query.class_size
        )));
    }
    if query.instance_size != descriptor.instance_struct_size {
        return Err(mismatch(format!(
            "instance struct of {parent} is {} bytes, the runtime has {}",
            descriptor.instance_struct_size, query.instance_size
        )));
    }
    if parent.parent() != descriptor.parent {
        return Err(mismatch(format!(
            "{parent} derives from {:?}, expected {:?}",
            parent.parent(),
            descriptor.parent
        )));
    }
    Ok(())
}

/// Immediate parent class table of the class registered for `T`.
///
/// # Safety
/// `C` must be the class struct of `T::ParentType` or one of its ancestors.
pub unsafe fn parent_class<T: ObjectSubclass, C>() -> *const C {
    match type_data::<T>() {
        Some(data) => data.parent_class.cast(),
        None => sys::el_type_class_peek(<T::ParentType as ObjectType>::static_type().into_raw()) as *const C,
    }
}

/// Handed to [`ObjectSubclass::class_init`] while the class table is built.
pub struct ClassBuilder {
    klass: *mut c_void,
}

impl ClassBuilder {
    pub(crate) fn new(klass: *mut c_void) -> Self {
        Self { klass }
    }

    pub(crate) fn as_ptr(&self) -> *mut c_void {
        self.klass
    }

    pub fn type_(&self) -> Type {
        let raw = unsafe { (*(self.klass as *const sys::el_type_class)).type_ };
        Type(raw)
    }

    pub(crate) fn is_element(&self) -> bool {
        let element = unsafe { sys::el_element_get_type() };
        if !self.type_().is_a(Type(element)) {
            log::warn!(target: TARGET, "{} is not an element, class data ignored", self.type_());
            return false;
        }
        true
    }

    /// Describes an element class. Ignored with a warning for non-elements.
    pub fn set_metadata(&mut self, long_name: &str, classification: &str, description: &str, author: &str) {
        if !self.is_element() {
            return;
        }
        let long_name = cstring_lossy(long_name, "element long name");
        let classification = cstring_lossy(classification, "element classification");
        let description = cstring_lossy(description, "element description");
        let author = cstring_lossy(author, "element author");
        unsafe {
            sys::el_element_class_set_metadata(
                self.klass.cast(),
                long_name.as_ptr(),
                classification.as_ptr(),
                description.as_ptr(),
                author.as_ptr(),
            );
        }
    }

    /// Adds or replaces one metadata entry, such as `doc-uri`.
    pub fn add_metadata(&mut self, key: &str, value: &str) {
        if !self.is_element() {
            return;
        }
        let key = cstring_lossy(key, "element metadata key");
        let value = cstring_lossy(value, "element metadata value");
        unsafe { sys::el_element_class_add_metadata(self.klass.cast(), key.as_ptr(), value.as_ptr()) };
    }
}

/// Registers a host type, detecting its capabilities at the call site.
///
/// ```ignore
/// let ty = extend!(MySink)?;
/// ```
#[macro_export]
macro_rules! extend {
    ($ty:ty) => {
        $crate::extend::<$ty>($crate::overrides!($ty))
    };
}

/// Capability set detected for a host type.
#[macro_export]
macro_rules! capabilities {
    ($ty:ty) => {
        $crate::overrides!($ty).capabilities()
    };
}
