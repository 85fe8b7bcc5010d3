//! Shared plumbing of the refcounted mini object wrappers.
//!
//! Every mini object comes in two forms: `XRef`, a borrowed view used for
//! arguments the runtime keeps ownership of, and `X`, an owned reference that
//! unrefs on drop and can be surrendered with `into_raw`.

use std::ffi::c_void;
use std::sync::Arc;

use element_sys as sys;
use parking_lot::Mutex;

use crate::registry::{registry, Handle};
use crate::trampoline::call_guarded;

type DisposeSlot = Mutex<Option<Box<dyn FnOnce() + Send>>>;

/// Attaches `notify` to run once when the object is freed. Fails if the
/// object already carries a notify.
pub(crate) unsafe fn set_dispose_notify(
    object: *mut sys::el_mini_object,
    notify: Box<dyn FnOnce() + Send>,
) -> bool {
    if (*object).notify.is_some() {
        return false;
    }
    let slot: Arc<DisposeSlot> = Arc::new(Mutex::new(Some(notify)));
    let handle = match registry().register(slot) {
        Ok(handle) => handle,
        Err(_) => return false,
    };
    let data = Box::into_raw(Box::new(handle)) as *mut c_void;
    sys::el_mini_object_set_dispose_notify(object, Some(dispose_trampoline), data);
    true
}

unsafe extern "C" fn dispose_trampoline(data: *mut c_void, _object: *mut sys::el_mini_object) {
    if data.is_null() {
        return;
    }
    let handle = *Box::from_raw(data as *mut Handle);
    let slot = match registry().release(handle) {
        Ok(value) => value.downcast::<DisposeSlot>(),
        Err(err) => {
            log::error!(target: "element_subclass::trampoline", "dispose notify {handle:?}: {err}");
            return;
        }
    };
    match slot {
        Ok(slot) => {
            let notify = slot.lock().take();
            if let Some(notify) = notify {
                call_guarded("dispose notify", notify);
            }
        }
        Err(_) => log::error!(
            target: "element_subclass::trampoline",
            "dispose notify {handle:?} resolved to a foreign value"
        ),
    }
}

macro_rules! mini_object_wrapper {
    ($(#[$owned_attr:meta])* $owned:ident, $(#[$ref_attr:meta])* $borrowed:ident, $raw:ty) => {
        $(#[$ref_attr])*
        #[repr(transparent)]
        pub struct $borrowed($raw);

        impl $borrowed {
            /// # Safety
            /// `ptr` must stay valid for `'a`.
            pub unsafe fn from_ptr<'a>(ptr: *const $raw) -> &'a $borrowed {
                &*(ptr as *const $borrowed)
            }

            /// # Safety
            /// `ptr` must stay valid and unaliased for `'a`.
            pub unsafe fn from_mut_ptr<'a>(ptr: *mut $raw) -> &'a mut $borrowed {
                &mut *(ptr as *mut $borrowed)
            }

            pub fn as_ptr(&self) -> *const $raw {
                &self.0
            }

            pub fn as_mut_ptr(&mut self) -> *mut $raw {
                &mut self.0
            }

            pub fn refcount(&self) -> u32 {
                unsafe { element_sys::el_mini_object_refcount(self.as_ptr().cast()) }
            }

            pub fn is_writable(&self) -> bool {
                self.refcount() == 1
            }
        }

        $(#[$owned_attr])*
        pub struct $owned(::std::ptr::NonNull<$raw>);

        // Refcounting is atomic; mutation needs `&mut` on a unique reference.
        unsafe impl Send for $owned {}
        unsafe impl Sync for $owned {}

        impl $owned {
            pub(crate) fn from_new(ptr: *mut $raw) -> Self {
                match ::std::ptr::NonNull::new(ptr) {
                    Some(ptr) => $owned(ptr),
                    None => ::std::alloc::handle_alloc_error(::std::alloc::Layout::new::<$raw>()),
                }
            }

            /// Takes over one reference.
            ///
            /// # Safety
            /// `ptr` must be null or a valid object whose reference the caller owns.
            pub unsafe fn from_raw_full(ptr: *mut $raw) -> Option<Self> {
                ::std::ptr::NonNull::new(ptr).map($owned)
            }

            /// Surrenders the reference to the caller.
            pub fn into_raw(self) -> *mut $raw {
                ::std::mem::ManuallyDrop::new(self).0.as_ptr()
            }

            /// The borrowed view, mutable only while this is the sole reference.
            pub fn get_mut(&mut self) -> Option<&mut $borrowed> {
                if self.is_writable() {
                    Some(unsafe { $borrowed::from_mut_ptr(self.0.as_ptr()) })
                } else {
                    None
                }
            }

            /// Runs `notify` once when the object is freed. Returns false if a
            /// notify is already attached.
            pub fn set_dispose_notify<F: FnOnce() + Send + 'static>(&mut self, notify: F) -> bool {
                unsafe { crate::mini::set_dispose_notify(self.0.as_ptr().cast(), Box::new(notify)) }
            }
        }

        impl ::std::ops::Deref for $owned {
            type Target = $borrowed;

            fn deref(&self) -> &$borrowed {
                unsafe { $borrowed::from_ptr(self.0.as_ptr()) }
            }
        }

        impl ::std::clone::Clone for $owned {
            fn clone(&self) -> Self {
                unsafe { element_sys::el_mini_object_ref(self.0.as_ptr().cast()) };
                $owned(self.0)
            }
        }

        impl ::std::ops::Drop for $owned {
            fn drop(&mut self) {
                unsafe { element_sys::el_mini_object_unref(self.0.as_ptr().cast()) };
            }
        }

        impl ::std::fmt::Debug for $owned {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Debug::fmt(&**self, f)
            }
        }
    };
}

pub(crate) use mini_object_wrapper;
