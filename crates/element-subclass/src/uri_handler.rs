//! The URI handler interface: elements that read from or write to a URI.
//!
//! ```ignore
//! impl ObjectSubclass for FileSrc {
//!     fn type_init(type_: &mut TypeInit<Self>) {
//!         type_.add_interface::<UriHandler>();
//!     }
//! }
//! ```

use std::ffi::{c_char, CStr, CString};
use std::ptr;

use element_sys as sys;

use crate::error::UriError;
use crate::interface::{Interface, IsImplementable};
use crate::object::Object;
use crate::subclass::ObjectSubclass;
use crate::trampoline::guard;
use crate::types::{IsA, ObjectType, Type};
use crate::value::cstring_lossy;

/// Marker for the runtime's `ElURIHandler` interface.
pub enum UriHandler {}

unsafe impl Interface for UriHandler {
    type Vtable = sys::el_uri_handler_interface;

    fn static_type() -> Type {
        Type(unsafe { sys::el_uri_handler_get_type() })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UriType {
    Unknown,
    Sink,
    Src,
}

impl UriType {
    pub fn from_raw(raw: sys::el_uri_type) -> Self {
        match raw {
            sys::EL_URI_SINK => UriType::Sink,
            sys::EL_URI_SRC => UriType::Src,
            _ => UriType::Unknown,
        }
    }

    pub fn into_raw(self) -> sys::el_uri_type {
        match self {
            UriType::Unknown => sys::EL_URI_UNKNOWN,
            UriType::Sink => sys::EL_URI_SINK,
            UriType::Src => sys::EL_URI_SRC,
        }
    }
}

pub trait UriHandlerImpl: ObjectSubclass {
    const URI_TYPE: UriType;

    /// Lowercase protocols such as `file`, without the `:`.
    fn protocols() -> &'static [&'static str];

    fn uri(&self, handler: &Object) -> Option<String>;

    /// Called only with URIs whose protocol is in [`protocols`](Self::protocols).
    fn set_uri(&self, handler: &Object, uri: &str) -> anyhow::Result<()>;
}

unsafe extern "C" fn get_uri<T: UriHandlerImpl>(handler: *mut sys::el_object) -> *mut c_char {
    let wrapper = Object::from_raw_borrow(handler);
    match guard::<T, _>(handler, "uri", None, |imp| imp.uri(&wrapper)) {
        Some(uri) => {
            let uri = cstring_lossy(&uri, "handler URI");
            sys::el_strdup(uri.as_ptr())
        }
        None => ptr::null_mut(),
    }
}

unsafe extern "C" fn set_uri<T: UriHandlerImpl>(
    handler: *mut sys::el_object,
    uri: *const c_char,
    error: *mut *mut c_char,
) -> sys::el_boolean {
    let wrapper = Object::from_raw_borrow(handler);
    let uri = CStr::from_ptr(uri).to_string_lossy();
    let result = guard::<T, _>(handler, "set_uri", Err(anyhow::anyhow!("{} panicked", T::NAME)), |imp| {
        imp.set_uri(&wrapper, &uri)
    });
    match result {
        Ok(()) => sys::EL_TRUE,
        Err(err) => {
            if !error.is_null() {
                let message = cstring_lossy(&format!("{err:#}"), "URI error");
                *error = sys::el_strdup(message.as_ptr());
            }
            sys::EL_FALSE
        }
    }
}

/// Leaks the protocol list once per implementing type; vtables live as long
/// as the process.
fn leak_protocols(protocols: &[&str]) -> *const *const c_char {
    let owned: &'static [CString] = Vec::leak(
        protocols
            .iter()
            .map(|protocol| cstring_lossy(&protocol.to_ascii_lowercase(), "URI protocol"))
            .collect(),
    );
    let mut pointers: Vec<*const c_char> = owned.iter().map(|protocol| protocol.as_ptr()).collect();
    pointers.push(ptr::null());
    Vec::leak(pointers).as_ptr()
}

unsafe impl<T: UriHandlerImpl> IsImplementable<T> for UriHandler {
    fn interface_init(vtable: &mut sys::el_uri_handler_interface) {
        vtable.uri_type = T::URI_TYPE.into_raw();
        vtable.protocols = leak_protocols(T::protocols());
        vtable.get_uri = Some(get_uri::<T>);
        vtable.set_uri = Some(set_uri::<T>);
    }
}

/// Drives any object through its URI handler interface.
pub trait UriHandlerExt: IsA<Object> {
    fn is_uri_handler(&self) -> bool {
        let type_ = Type(unsafe { sys::el_object_type(self.as_object_ptr()) });
        type_.implements(UriHandler::static_type())
    }

    fn uri_type(&self) -> UriType {
        UriType::from_raw(unsafe { sys::el_uri_handler_get_uri_type(self.as_object_ptr()) })
    }

    fn protocols(&self) -> Vec<String> {
        let mut protocols = Vec::new();
        unsafe {
            let mut current = sys::el_uri_handler_get_protocols(self.as_object_ptr());
            if current.is_null() {
                return protocols;
            }
            while !(*current).is_null() {
                protocols.push(CStr::from_ptr(*current).to_string_lossy().into_owned());
                current = current.add(1);
            }
        }
        protocols
    }

    fn uri(&self) -> Option<String> {
        unsafe {
            let raw = sys::el_uri_handler_get_uri(self.as_object_ptr());
            if raw.is_null() {
                return None;
            }
            let uri = CStr::from_ptr(raw).to_string_lossy().into_owned();
            sys::el_free_string(raw);
            Some(uri)
        }
    }

    fn set_uri(&self, uri: &str) -> Result<(), UriError> {
        if !self.is_uri_handler() {
            return Err(UriError::NotAHandler);
        }
        let uri = CString::new(uri).map_err(|_| UriError::InteriorNul)?;
        let mut error = ptr::null_mut();
        let accepted = unsafe { sys::el_uri_handler_set_uri(self.as_object_ptr(), uri.as_ptr(), &mut error) };
        let message = unsafe {
            if error.is_null() {
                None
            } else {
                let message = CStr::from_ptr(error).to_string_lossy().into_owned();
                sys::el_free_string(error);
                Some(message)
            }
        };
        if accepted == sys::EL_FALSE {
            return Err(UriError::Rejected(message.unwrap_or_else(|| "handler refused the URI".to_owned())));
        }
        Ok(())
    }
}

impl<O: IsA<Object>> UriHandlerExt for O {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_type_survives_the_raw_form() {
        for uri_type in [UriType::Unknown, UriType::Sink, UriType::Src] {
            assert_eq!(UriType::from_raw(uri_type.into_raw()), uri_type);
        }
    }

    #[test]
    fn leaked_protocols_are_lowercase_and_terminated() {
        let protocols = leak_protocols(&["File", "http"]);
        unsafe {
            assert_eq!(CStr::from_ptr(*protocols).to_str(), Ok("file"));
            assert_eq!(CStr::from_ptr(*protocols.add(1)).to_str(), Ok("http"));
            assert!((*protocols.add(2)).is_null());
        }
    }

    #[test]
    fn the_interface_is_registered_once() {
        let type_ = UriHandler::static_type();
        assert!(type_.is_interface());
        assert_eq!(type_, UriHandler::static_type());
    }
}
