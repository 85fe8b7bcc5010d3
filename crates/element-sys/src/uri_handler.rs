use std::ffi::{c_char, CStr};
use std::mem::size_of;
use std::ptr;

use once_cell::sync::Lazy;

use crate::{
    el_boolean, el_object, el_object_get_interface, el_strdup, el_type, el_type_interface,
    el_type_register_interface, EL_FALSE,
};

pub type el_uri_type = u32;

pub const EL_URI_UNKNOWN: el_uri_type = 0;
pub const EL_URI_SINK: el_uri_type = 1;
pub const EL_URI_SRC: el_uri_type = 2;

#[repr(C)]
pub struct el_uri_handler_interface {
    pub parent: el_type_interface,
    pub uri_type: el_uri_type,
    /// Nul-terminated array of lowercase protocols. Lives as long as the type.
    pub protocols: *const *const c_char,
    /// Returns a string the caller frees with `el_free_string`, or null.
    pub get_uri: Option<unsafe extern "C" fn(handler: *mut el_object) -> *mut c_char>,
    /// On failure may store a message in `error` that the caller frees with
    /// `el_free_string`.
    pub set_uri: Option<
        unsafe extern "C" fn(handler: *mut el_object, uri: *const c_char, error: *mut *mut c_char) -> el_boolean,
    >,
}

static URI_HANDLER_TYPE: Lazy<el_type> = Lazy::new(|| unsafe {
    el_type_register_interface(b"ElURIHandler\0".as_ptr().cast(), size_of::<el_uri_handler_interface>())
});

pub unsafe extern "C" fn el_uri_handler_get_type() -> el_type {
    *URI_HANDLER_TYPE
}

unsafe fn uri_handler_iface(handler: *const el_object) -> *const el_uri_handler_interface {
    el_object_get_interface(handler, el_uri_handler_get_type()) as *const el_uri_handler_interface
}

/// `message` must be nul-terminated.
unsafe fn set_error(error: *mut *mut c_char, message: &[u8]) {
    if !error.is_null() {
        *error = el_strdup(message.as_ptr().cast());
    }
}

pub unsafe extern "C" fn el_uri_handler_get_uri_type(handler: *const el_object) -> el_uri_type {
    let iface = uri_handler_iface(handler);
    if iface.is_null() {
        return EL_URI_UNKNOWN;
    }
    (*iface).uri_type
}

/// Borrowed protocol list of `handler`, or null.
pub unsafe extern "C" fn el_uri_handler_get_protocols(handler: *const el_object) -> *const *const c_char {
    let iface = uri_handler_iface(handler);
    if iface.is_null() {
        return ptr::null();
    }
    (*iface).protocols
}

pub unsafe extern "C" fn el_uri_handler_get_uri(handler: *mut el_object) -> *mut c_char {
    let iface = uri_handler_iface(handler);
    match iface.as_ref().and_then(|iface| iface.get_uri) {
        Some(get_uri) => get_uri(handler),
        None => ptr::null_mut(),
    }
}

/// Protocol of `uri`: the text before the first `:`, when it is a valid
/// scheme.
fn uri_protocol(uri: &CStr) -> Option<&[u8]> {
    let bytes = uri.to_bytes();
    let end = bytes.iter().position(|&b| b == b':')?;
    let scheme = &bytes[..end];
    let valid = scheme.first().is_some_and(u8::is_ascii_alphabetic)
        && scheme.iter().all(|&b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'));
    valid.then_some(scheme)
}

unsafe fn supports_protocol(protocols: *const *const c_char, protocol: &[u8]) -> bool {
    if protocols.is_null() {
        return false;
    }
    let mut current = protocols;
    while !(*current).is_null() {
        if CStr::from_ptr(*current).to_bytes().eq_ignore_ascii_case(protocol) {
            return true;
        }
        current = current.add(1);
    }
    false
}

/// Hands `uri` to the handler after checking its protocol against the
/// handler's list.
pub unsafe extern "C" fn el_uri_handler_set_uri(
    handler: *mut el_object,
    uri: *const c_char,
    error: *mut *mut c_char,
) -> el_boolean {
    if uri.is_null() {
        set_error(error, b"no URI given\0");
        return EL_FALSE;
    }
    let iface = uri_handler_iface(handler);
    let Some(iface) = iface.as_ref() else {
        set_error(error, b"object does not implement ElURIHandler\0");
        return EL_FALSE;
    };
    let Some(protocol) = uri_protocol(CStr::from_ptr(uri)) else {
        set_error(error, b"malformed URI\0");
        return EL_FALSE;
    };
    if !supports_protocol(iface.protocols, protocol) {
        set_error(error, b"unsupported URI protocol\0");
        return EL_FALSE;
    }
    match iface.set_uri {
        Some(set_uri) => set_uri(handler, uri, error),
        None => {
            set_error(error, b"handler cannot change its URI\0");
            EL_FALSE
        }
    }
}
