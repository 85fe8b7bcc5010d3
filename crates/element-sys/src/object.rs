use std::alloc::{alloc_zeroed, dealloc};
use std::ffi::{c_char, c_void, CStr};
use std::ptr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use once_cell::sync::Lazy;

use crate::types::{ancestry, find_property, struct_layout, type_of_class, with_node, with_node_mut, PropertyEntry};
use crate::{
    el_boolean, el_boolean_from, el_free_string, el_param_spec, el_param_spec_free, el_strdup, el_type,
    el_type_class, el_type_class_peek, el_type_info, el_type_is_a, el_type_register_static, el_value,
    el_value_init, value::numeric, EL_FALSE, EL_PARAM_READABLE, EL_PARAM_WRITABLE, EL_TYPE_INVALID,
};

pub type el_set_property_func =
    unsafe extern "C" fn(object: *mut el_object, id: u32, value: *const el_value, pspec: *const el_param_spec);
pub type el_get_property_func =
    unsafe extern "C" fn(object: *mut el_object, id: u32, value: *mut el_value, pspec: *const el_param_spec);

#[repr(C)]
pub struct el_object_class {
    pub type_class: el_type_class,
    pub set_property: Option<el_set_property_func>,
    pub get_property: Option<el_get_property_func>,
    pub constructed: Option<unsafe extern "C" fn(object: *mut el_object)>,
    pub finalize: Option<unsafe extern "C" fn(object: *mut el_object)>,
}

/// Instance header. `private` is reserved for the extending side and starts at zero.
#[repr(C)]
pub struct el_object {
    pub klass: *mut el_object_class,
    pub ref_count: AtomicU32,
    pub private: AtomicU64,
    pub name: *mut c_char,
}

unsafe extern "C" fn object_finalize(_object: *mut el_object) {}

unsafe extern "C" fn object_class_init(klass: *mut c_void, _data: *mut c_void) {
    let klass = klass as *mut el_object_class;
    (*klass).finalize = Some(object_finalize);
}

static OBJECT_TYPE: Lazy<el_type> = Lazy::new(|| unsafe {
    let info = el_type_info {
        class_size: std::mem::size_of::<el_object_class>(),
        class_init: Some(object_class_init),
        class_data: ptr::null_mut(),
        instance_size: std::mem::size_of::<el_object>(),
        instance_init: None,
    };
    el_type_register_static(EL_TYPE_INVALID, b"ElObject\0".as_ptr().cast(), &info)
});

pub unsafe extern "C" fn el_object_get_type() -> el_type {
    *OBJECT_TYPE
}

/// Allocates an instance of `ty`, runs instance initializers root first and
/// then the `constructed` slot. Returns null for types not deriving from
/// `ElObject`.
pub unsafe extern "C" fn el_object_new(ty: el_type, name: *const c_char) -> *mut el_object {
    if el_type_is_a(ty, el_object_get_type()) == EL_FALSE {
        return ptr::null_mut();
    }
    let Some((instance_size, klass)) = with_node(ty, |node| (node.instance_size, node.class)) else {
        return ptr::null_mut();
    };
    let Some(layout) = struct_layout(instance_size) else {
        return ptr::null_mut();
    };
    let object = alloc_zeroed(layout) as *mut el_object;
    if object.is_null() {
        return ptr::null_mut();
    }
    (*object).klass = klass.cast();
    (*object).ref_count = AtomicU32::new(1);
    (*object).private = AtomicU64::new(0);
    (*object).name = el_strdup(name);

    let mut chain = ancestry(ty);
    chain.reverse();
    for level in chain {
        if let Some(Some(init)) = with_node(level, |node| node.instance_init) {
            init(object, klass.cast());
        }
    }

    if let Some(constructed) = (*(*object).klass).constructed {
        constructed(object);
    }
    object
}

pub unsafe extern "C" fn el_object_ref(object: *mut el_object) -> *mut el_object {
    if !object.is_null() {
        (*object).ref_count.fetch_add(1, Ordering::Relaxed);
    }
    object
}

/// Drops one reference; the last one runs `finalize` and frees the instance.
pub unsafe extern "C" fn el_object_unref(object: *mut el_object) {
    if object.is_null() {
        return;
    }
    if (*object).ref_count.fetch_sub(1, Ordering::AcqRel) != 1 {
        return;
    }
    let klass = (*object).klass;
    if let Some(finalize) = (*klass).finalize {
        finalize(object);
    }
    el_free_string((*object).name);
    let instance_size = with_node(type_of_class(klass.cast()), |node| node.instance_size).unwrap_or(0);
    if let Some(layout) = struct_layout(instance_size) {
        dealloc(object.cast(), layout);
    }
}

pub unsafe extern "C" fn el_object_ref_count(object: *const el_object) -> u32 {
    (*object).ref_count.load(Ordering::Acquire)
}

pub unsafe extern "C" fn el_object_type(object: *const el_object) -> el_type {
    type_of_class((*object).klass as *const c_void)
}

pub unsafe extern "C" fn el_object_get_name(object: *const el_object) -> *const c_char {
    (*object).name
}

pub unsafe extern "C" fn el_object_get_private(object: *const el_object) -> u64 {
    (*object).private.load(Ordering::Acquire)
}

pub unsafe extern "C" fn el_object_set_private(object: *mut el_object, private: u64) {
    (*object).private.store(private, Ordering::Release);
}

/// Installs `pspec` on the class under `id`, taking ownership of it.
/// Fails for id zero and for names already present along the ancestry.
pub unsafe extern "C" fn el_object_class_install_property(
    klass: *mut el_object_class,
    id: u32,
    pspec: *mut el_param_spec,
) -> el_boolean {
    if klass.is_null() || pspec.is_null() {
        return EL_FALSE;
    }
    let ty = type_of_class(klass.cast());
    let name = CStr::from_ptr((*pspec).name);
    if id == 0 || find_property(ty, name).is_some() {
        log::warn!(target: "element_sys", "cannot install property {name:?} with id {id}");
        el_param_spec_free(pspec);
        return EL_FALSE;
    }
    let installed = with_node_mut(ty, |node| {
        if node.properties.iter().any(|entry| entry.id == id) {
            return false;
        }
        node.properties.push(PropertyEntry { id, pspec });
        true
    })
    .unwrap_or(false);
    if !installed {
        el_param_spec_free(pspec);
    }
    el_boolean_from(installed)
}

pub unsafe extern "C" fn el_object_class_find_property(
    klass: *const el_object_class,
    name: *const c_char,
) -> *const el_param_spec {
    if klass.is_null() || name.is_null() {
        return ptr::null();
    }
    find_property(type_of_class(klass.cast()), CStr::from_ptr(name))
        .map(|(_, _, pspec)| pspec as *const el_param_spec)
        .unwrap_or(ptr::null())
}

/// Number of properties installed directly on the class of `ty`.
pub unsafe extern "C" fn el_object_class_n_properties(ty: el_type) -> u32 {
    with_node(ty, |node| node.properties.len() as u32).unwrap_or(0)
}

/// Validates `value` against the property and forwards it to the
/// `set_property` slot of the class that installed it.
pub unsafe extern "C" fn el_object_set_property(
    object: *mut el_object,
    name: *const c_char,
    value: *const el_value,
) -> el_boolean {
    if object.is_null() || name.is_null() || value.is_null() {
        return EL_FALSE;
    }
    let Some((owner, id, pspec)) = find_property(el_object_type(object), CStr::from_ptr(name)) else {
        return EL_FALSE;
    };
    if (*pspec).flags & EL_PARAM_WRITABLE == 0 || (*value).value_type != (*pspec).value_type {
        return EL_FALSE;
    }
    if let Some(number) = numeric(value) {
        if number < (*pspec).minimum || number > (*pspec).maximum {
            return EL_FALSE;
        }
    }
    let owner_class = el_type_class_peek(owner) as *mut el_object_class;
    match (*owner_class).set_property {
        Some(set_property) => {
            set_property(object, id, value, pspec);
            el_boolean_from(true)
        }
        None => EL_FALSE,
    }
}

/// Initializes `value` to the property's type and asks the owning class to fill it.
pub unsafe extern "C" fn el_object_get_property(
    object: *mut el_object,
    name: *const c_char,
    value: *mut el_value,
) -> el_boolean {
    if object.is_null() || name.is_null() || value.is_null() {
        return EL_FALSE;
    }
    let Some((owner, id, pspec)) = find_property(el_object_type(object), CStr::from_ptr(name)) else {
        return EL_FALSE;
    };
    if (*pspec).flags & EL_PARAM_READABLE == 0 {
        return EL_FALSE;
    }
    el_value_init(value, (*pspec).value_type);
    let owner_class = el_type_class_peek(owner) as *mut el_object_class;
    match (*owner_class).get_property {
        Some(get_property) => {
            get_property(object, id, value, pspec);
            el_boolean_from(true)
        }
        None => EL_FALSE,
    }
}
