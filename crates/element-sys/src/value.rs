use std::ffi::{c_char, c_void, CStr, CString};
use std::ptr;

use crate::{el_boolean, el_boolean_from, EL_FALSE};

pub type el_value_type = u32;

pub const EL_VALUE_INVALID: el_value_type = 0;
pub const EL_VALUE_BOOLEAN: el_value_type = 1;
pub const EL_VALUE_INT: el_value_type = 2;
pub const EL_VALUE_UINT: el_value_type = 3;
pub const EL_VALUE_INT64: el_value_type = 4;
pub const EL_VALUE_UINT64: el_value_type = 5;
pub const EL_VALUE_FLOAT: el_value_type = 6;
pub const EL_VALUE_DOUBLE: el_value_type = 7;
pub const EL_VALUE_STRING: el_value_type = 8;

#[repr(C)]
#[derive(Clone, Copy)]
pub union el_value_data {
    pub v_int: i32,
    pub v_uint: u32,
    pub v_int64: i64,
    pub v_uint64: u64,
    pub v_float: f32,
    pub v_double: f64,
    pub v_pointer: *mut c_void,
}

/// Tagged value. Booleans live in `v_int`, strings in `v_pointer` and are
/// owned by the value.
#[repr(C)]
pub struct el_value {
    pub value_type: el_value_type,
    pub data: el_value_data,
}

impl el_value {
    pub const fn zeroed() -> Self {
        el_value {
            value_type: EL_VALUE_INVALID,
            data: el_value_data { v_uint64: 0 },
        }
    }
}

pub const EL_PARAM_READABLE: u32 = 1 << 0;
pub const EL_PARAM_WRITABLE: u32 = 1 << 1;
pub const EL_PARAM_READWRITE: u32 = EL_PARAM_READABLE | EL_PARAM_WRITABLE;

/// Property description. `minimum`/`maximum` bound numeric values only.
#[repr(C)]
pub struct el_param_spec {
    pub name: *mut c_char,
    pub nick: *mut c_char,
    pub blurb: *mut c_char,
    pub value_type: el_value_type,
    pub flags: u32,
    pub minimum: f64,
    pub maximum: f64,
    pub default_value: el_value,
}

pub unsafe extern "C" fn el_strdup(s: *const c_char) -> *mut c_char {
    if s.is_null() {
        return ptr::null_mut();
    }
    CStr::from_ptr(s).to_owned().into_raw()
}

pub unsafe extern "C" fn el_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

pub unsafe extern "C" fn el_value_init(value: *mut el_value, value_type: el_value_type) {
    ptr::write(
        value,
        el_value {
            value_type,
            data: el_value_data { v_uint64: 0 },
        },
    );
}

/// Releases owned contents and resets the value to `EL_VALUE_INVALID`.
pub unsafe extern "C" fn el_value_unset(value: *mut el_value) {
    if value.is_null() {
        return;
    }
    if (*value).value_type == EL_VALUE_STRING {
        el_free_string((*value).data.v_pointer.cast());
    }
    el_value_init(value, EL_VALUE_INVALID);
}

/// Deep copy into an uninitialized or unset `dest`.
pub unsafe extern "C" fn el_value_copy(src: *const el_value, dest: *mut el_value) {
    let value_type = (*src).value_type;
    if value_type == EL_VALUE_STRING {
        el_value_init(dest, EL_VALUE_STRING);
        (*dest).data.v_pointer = el_strdup((*src).data.v_pointer as *const c_char).cast();
    } else {
        ptr::write(
            dest,
            el_value {
                value_type,
                data: (*src).data,
            },
        );
    }
}

/// Replaces the string held by `value` with a copy of `s`.
pub unsafe extern "C" fn el_value_set_string(value: *mut el_value, s: *const c_char) -> el_boolean {
    if (*value).value_type != EL_VALUE_STRING {
        return EL_FALSE;
    }
    el_free_string((*value).data.v_pointer.cast());
    (*value).data.v_pointer = el_strdup(s).cast();
    el_boolean_from(true)
}

pub unsafe extern "C" fn el_value_get_string(value: *const el_value) -> *const c_char {
    if (*value).value_type != EL_VALUE_STRING {
        return ptr::null();
    }
    (*value).data.v_pointer as *const c_char
}

/// Numeric view of a value, used for range checks.
pub(crate) unsafe fn numeric(value: *const el_value) -> Option<f64> {
    let data = (*value).data;
    match (*value).value_type {
        EL_VALUE_INT => Some(f64::from(data.v_int)),
        EL_VALUE_UINT => Some(f64::from(data.v_uint)),
        EL_VALUE_INT64 => Some(data.v_int64 as f64),
        EL_VALUE_UINT64 => Some(data.v_uint64 as f64),
        EL_VALUE_FLOAT => Some(f64::from(data.v_float)),
        EL_VALUE_DOUBLE => Some(data.v_double),
        _ => None,
    }
}

/// Creates a property description. Strings and the default are copied.
pub unsafe extern "C" fn el_param_spec_new(
    name: *const c_char,
    nick: *const c_char,
    blurb: *const c_char,
    value_type: el_value_type,
    flags: u32,
    minimum: f64,
    maximum: f64,
    default_value: *const el_value,
) -> *mut el_param_spec {
    if name.is_null() || value_type == EL_VALUE_INVALID {
        return ptr::null_mut();
    }
    let mut default = el_value::zeroed();
    if default_value.is_null() {
        el_value_init(&mut default, value_type);
    } else {
        if (*default_value).value_type != value_type {
            return ptr::null_mut();
        }
        el_value_copy(default_value, &mut default);
    }
    Box::into_raw(Box::new(el_param_spec {
        name: el_strdup(name),
        nick: el_strdup(nick),
        blurb: el_strdup(blurb),
        value_type,
        flags,
        minimum,
        maximum,
        default_value: default,
    }))
}

pub unsafe extern "C" fn el_param_spec_free(pspec: *mut el_param_spec) {
    if pspec.is_null() {
        return;
    }
    let mut pspec = Box::from_raw(pspec);
    el_free_string(pspec.name);
    el_free_string(pspec.nick);
    el_free_string(pspec.blurb);
    el_value_unset(&mut pspec.default_value);
}
