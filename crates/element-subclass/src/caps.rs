use std::ffi::CStr;
use std::fmt;

use element_sys as sys;

use crate::mini::mini_object_wrapper;
use crate::value::{cstring_lossy, marshal_warning};

mini_object_wrapper!(Caps, CapsRef, sys::el_caps);

impl Caps {
    /// Media type strings are cut at an interior nul.
    pub fn new(media_type: &str) -> Self {
        let media_type = cstring_lossy(media_type, "caps media type");
        Self::from_new(unsafe { sys::el_caps_new(media_type.as_ptr()) })
    }
}

impl CapsRef {
    /// Empty when the runtime holds no or non-UTF-8 media type.
    pub fn media_type(&self) -> &str {
        let ptr = self.0.media_type;
        if ptr.is_null() {
            return "";
        }
        match unsafe { CStr::from_ptr(ptr) }.to_str() {
            Ok(media_type) => media_type,
            Err(err) => {
                marshal_warning("caps media type", &err);
                ""
            }
        }
    }
}

impl PartialEq for CapsRef {
    fn eq(&self, other: &Self) -> bool {
        unsafe { sys::el_caps_is_equal(self.as_ptr(), other.as_ptr()) != sys::EL_FALSE }
    }
}

impl PartialEq for Caps {
    fn eq(&self, other: &Self) -> bool {
        **self == **other
    }
}

impl fmt::Debug for CapsRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Caps").field(&self.media_type()).finish()
    }
}

impl fmt::Display for CapsRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.media_type())
    }
}
