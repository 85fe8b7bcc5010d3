//! Interfaces: vtables a type adds next to its class table.
//!
//! A host type adds them from [`ObjectSubclass::type_init`], which runs once
//! the runtime type exists and before [`ObjectSubclass::class_init`].

use std::ffi::c_void;
use std::marker::PhantomData;

use element_sys as sys;

use crate::subclass::ObjectSubclass;
use crate::trampoline::call_guarded;
use crate::types::Type;

const TARGET: &str = "element_subclass::extend";

/// A foreign interface.
///
/// # Safety
/// `Vtable` must be the runtime's vtable struct of `static_type()`, starting
/// with `el_type_interface`.
pub unsafe trait Interface: 'static {
    type Vtable: 'static;

    fn static_type() -> Type;
}

/// `T` can provide the methods of this interface.
///
/// # Safety
/// `interface_init` may only write slots of `Self::Vtable`.
pub unsafe trait IsImplementable<T: ObjectSubclass>: Interface {
    /// Points the vtable's slots at `T`'s implementation.
    fn interface_init(vtable: &mut Self::Vtable);
}

unsafe extern "C" fn interface_init<T: ObjectSubclass, I: IsImplementable<T>>(iface: *mut c_void, _data: *mut c_void) {
    let vtable = &mut *(iface as *mut I::Vtable);
    call_guarded(T::NAME, || I::interface_init(vtable));
}

/// Handed to [`ObjectSubclass::type_init`].
pub struct TypeInit<T: ObjectSubclass> {
    type_: Type,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ObjectSubclass> TypeInit<T> {
    pub(crate) fn new(type_: Type) -> Self {
        Self {
            type_,
            _marker: PhantomData,
        }
    }

    pub fn type_(&self) -> Type {
        self.type_
    }

    /// Adds interface `I`, implemented by `T`. Returns `false`, with a
    /// warning, when the runtime refuses it.
    pub fn add_interface<I: IsImplementable<T>>(&mut self) -> bool {
        let info = sys::el_interface_info {
            interface_init: Some(interface_init::<T, I>),
            interface_data: std::ptr::null_mut(),
        };
        let interface = I::static_type();
        let added = unsafe { sys::el_type_add_interface_static(self.type_.into_raw(), interface.into_raw(), &info) };
        if added == sys::EL_FALSE {
            log::warn!(target: TARGET, "{}: cannot add interface {interface}", T::NAME);
            return false;
        }
        log::debug!(target: TARGET, "{} implements {interface}", T::NAME);
        true
    }
}

impl Type {
    pub fn is_interface(self) -> bool {
        unsafe { sys::el_type_is_interface(self.0) != sys::EL_FALSE }
    }

    /// Whether this type or an ancestor added `interface`.
    pub fn implements(self, interface: Type) -> bool {
        unsafe { sys::el_type_implements(self.0, interface.0) != sys::EL_FALSE }
    }
}
