use std::ffi::{CStr, CString};
use std::fmt;
use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::ptr::NonNull;

use element_sys as sys;

/// Registered runtime type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Type(pub(crate) sys::el_type);

/// Sizes the runtime recorded for a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeQuery {
    pub class_size: usize,
    pub instance_size: usize,
}

impl Type {
    pub fn from_raw(raw: sys::el_type) -> Option<Self> {
        (raw != sys::EL_TYPE_INVALID).then_some(Type(raw))
    }

    pub fn into_raw(self) -> sys::el_type {
        self.0
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = CString::new(name).ok()?;
        Self::from_raw(unsafe { sys::el_type_from_name(name.as_ptr()) })
    }

    pub fn name(self) -> &'static str {
        unsafe {
            let name = sys::el_type_name(self.0);
            if name.is_null() {
                return "<invalid>";
            }
            CStr::from_ptr(name).to_str().unwrap_or("<non-utf8>")
        }
    }

    pub fn parent(self) -> Option<Type> {
        Self::from_raw(unsafe { sys::el_type_parent(self.0) })
    }

    pub fn is_a(self, ancestor: Type) -> bool {
        unsafe { sys::el_type_is_a(self.0, ancestor.0) != sys::EL_FALSE }
    }

    pub fn query(self) -> Option<TypeQuery> {
        let mut info = sys::el_type_query_info::default();
        let found = unsafe { sys::el_type_query(self.0, &mut info) };
        (found != sys::EL_FALSE).then_some(TypeQuery {
            class_size: info.class_size,
            instance_size: info.instance_size,
        })
    }

    /// Creates an instance of this type viewed as `W`.
    pub fn create<W: ObjectType>(self, name: Option<&str>) -> Option<W> {
        if !self.is_a(W::static_type()) {
            return None;
        }
        let name = name.and_then(|name| CString::new(name).ok());
        let name_ptr = name.as_ref().map_or(std::ptr::null(), |name| name.as_ptr());
        unsafe {
            let object = sys::el_object_new(self.0, name_ptr);
            W::from_raw_full(object.cast())
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({}, {:?})", self.0, self.name())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Refcounted handle to a runtime instance.
///
/// # Safety
/// Implementors must be `#[repr(transparent)]` over a `NonNull` to a struct
/// that starts with `el_object`, so handles of related types can be cast
/// into each other.
pub unsafe trait ObjectType: Sized + Clone + Send + Sync + 'static {
    type Raw: 'static;

    fn static_type() -> Type;

    fn as_ptr(&self) -> *mut Self::Raw;

    /// # Safety
    /// `ptr` must point to a live instance of `Self::static_type()` whose
    /// reference is transferred to the returned handle.
    unsafe fn from_ptr(ptr: NonNull<Self::Raw>) -> Self;

    unsafe fn from_raw_full(ptr: *mut Self::Raw) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self::from_ptr(ptr))
    }

    /// Views a pointer owned elsewhere without touching its refcount.
    unsafe fn from_raw_borrow(ptr: *mut Self::Raw) -> Borrowed<Self> {
        Borrowed(ManuallyDrop::new(Self::from_ptr(NonNull::new_unchecked(ptr))))
    }

    fn as_object_ptr(&self) -> *mut sys::el_object {
        self.as_ptr().cast()
    }
}

/// `Self` is an instance of `T`.
///
/// # Safety
/// `Self::static_type()` must derive from `T::static_type()` with `T::Raw`
/// as a prefix of `Self::Raw`.
pub unsafe trait IsA<T: ObjectType>: ObjectType {
    fn upcast_ref(&self) -> &T {
        unsafe { &*(self as *const Self as *const T) }
    }

    fn upcast(self) -> T {
        let ptr = ManuallyDrop::new(self).as_ptr();
        unsafe { T::from_ptr(NonNull::new_unchecked(ptr.cast())) }
    }
}

/// Handle borrowed for the duration of a callback. Never unrefs.
pub struct Borrowed<T: ObjectType>(ManuallyDrop<T>);

impl<T: ObjectType> Deref for Borrowed<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: ObjectType + fmt::Debug> fmt::Debug for Borrowed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Declares a refcounted wrapper around a runtime instance struct.
///
/// ```ignore
/// object_wrapper!(pub struct MySink(el_base_sink) @type my_sink_get_type(), @extends BaseSink, Element, Object);
/// ```
#[macro_export]
macro_rules! object_wrapper {
    (
        $(#[$attr:meta])*
        $vis:vis struct $name:ident($raw:ty) @type $get_type:expr
        $(, @extends $($parent:ty),+)? $(,)?
    ) => {
        $(#[$attr])*
        #[repr(transparent)]
        $vis struct $name {
            ptr: ::std::ptr::NonNull<$raw>,
        }

        unsafe impl $crate::ObjectType for $name {
            type Raw = $raw;

            fn static_type() -> $crate::Type {
                let raw = unsafe { $get_type };
                match $crate::Type::from_raw(raw) {
                    Some(ty) => ty,
                    None => panic!("{} has no registered type", stringify!($name)),
                }
            }

            fn as_ptr(&self) -> *mut $raw {
                self.ptr.as_ptr()
            }

            unsafe fn from_ptr(ptr: ::std::ptr::NonNull<$raw>) -> Self {
                Self { ptr }
            }
        }

        impl ::std::clone::Clone for $name {
            fn clone(&self) -> Self {
                unsafe { $crate::sys::el_object_ref(self.ptr.as_ptr().cast()) };
                Self { ptr: self.ptr }
            }
        }

        impl ::std::ops::Drop for $name {
            fn drop(&mut self) {
                unsafe { $crate::sys::el_object_unref(self.ptr.as_ptr().cast()) };
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("ptr", &self.ptr)
                    .field("type", &<Self as $crate::ObjectType>::static_type())
                    .finish()
            }
        }

        impl ::std::cmp::PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.ptr == other.ptr
            }
        }

        impl ::std::cmp::Eq for $name {}

        // Instances are refcounted atomically and their state is atomic.
        unsafe impl ::std::marker::Send for $name {}
        unsafe impl ::std::marker::Sync for $name {}

        unsafe impl $crate::IsA<$name> for $name {}
        $($(unsafe impl $crate::IsA<$parent> for $name {})+)?
    };
}
