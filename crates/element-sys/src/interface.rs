use std::alloc::{alloc_zeroed, dealloc};
use std::ffi::{c_char, c_void, CStr};
use std::mem::size_of;
use std::ptr;

use crate::types::{ancestry, insert_node, struct_layout, with_node, with_node_mut, InterfaceEntry, TypeNode};
use crate::{el_boolean, el_boolean_from, el_object, el_type, EL_FALSE, EL_TYPE_INVALID};

/// Header of every interface vtable.
#[repr(C)]
pub struct el_type_interface {
    pub type_: el_type,
    /// Type the vtable was added to.
    pub instance_type: el_type,
}

pub type el_interface_init_func = unsafe extern "C" fn(iface: *mut c_void, iface_data: *mut c_void);

#[repr(C)]
#[derive(Clone, Copy)]
pub struct el_interface_info {
    pub interface_init: Option<el_interface_init_func>,
    pub interface_data: *mut c_void,
}

/// Registers an interface type whose vtables are `vtable_size` bytes,
/// header included.
pub unsafe extern "C" fn el_type_register_interface(name: *const c_char, vtable_size: usize) -> el_type {
    if name.is_null() || vtable_size < size_of::<el_type_interface>() {
        return EL_TYPE_INVALID;
    }
    let mut node = TypeNode::new(CStr::from_ptr(name).to_owned(), EL_TYPE_INVALID, vtable_size, 0);
    node.is_interface = true;
    insert_node(node)
}

pub unsafe extern "C" fn el_type_is_interface(ty: el_type) -> el_boolean {
    el_boolean_from(with_node(ty, |node| node.is_interface).unwrap_or(false))
}

/// Vtable of `interface` on `ty` or its closest ancestor implementing it.
pub unsafe extern "C" fn el_type_interface_peek(ty: el_type, interface: el_type) -> *mut c_void {
    for current in ancestry(ty) {
        let vtable = with_node(current, |node| {
            node.interfaces
                .iter()
                .find(|entry| entry.interface == interface)
                .map(|entry| entry.vtable)
        });
        if let Some(Some(vtable)) = vtable {
            return vtable.cast();
        }
    }
    ptr::null_mut()
}

pub unsafe extern "C" fn el_type_implements(ty: el_type, interface: el_type) -> el_boolean {
    el_boolean_from(!el_type_interface_peek(ty, interface).is_null())
}

/// Adds `interface` to the instantiable type `ty`.
///
/// The vtable starts as a copy of the one `ty` inherits, if any, and
/// `interface_init` runs afterwards, outside the type lock. Fails when `ty`
/// already added the interface itself.
pub unsafe extern "C" fn el_type_add_interface_static(
    ty: el_type,
    interface: el_type,
    info: *const el_interface_info,
) -> el_boolean {
    if info.is_null() {
        return EL_FALSE;
    }
    let info = *info;
    let Some(vtable_size) = with_node(interface, |node| node.is_interface.then_some(node.class_size)).flatten() else {
        log::warn!(target: "element_sys", "type {interface} is not an interface");
        return EL_FALSE;
    };
    if with_node(ty, |node| node.is_interface) != Some(false) {
        log::warn!(target: "element_sys", "cannot add interface {interface} to type {ty}");
        return EL_FALSE;
    }

    let Some(layout) = struct_layout(vtable_size) else {
        return EL_FALSE;
    };
    let vtable = alloc_zeroed(layout);
    if vtable.is_null() {
        return EL_FALSE;
    }
    let inherited = el_type_interface_peek(ty, interface) as *const u8;
    if !inherited.is_null() {
        ptr::copy_nonoverlapping(inherited, vtable, vtable_size);
    }
    let header = vtable as *mut el_type_interface;
    (*header).type_ = interface;
    (*header).instance_type = ty;

    let added = with_node_mut(ty, |node| {
        if node.interfaces.iter().any(|entry| entry.interface == interface) {
            return false;
        }
        node.interfaces.push(InterfaceEntry { interface, vtable });
        true
    });
    if added != Some(true) {
        dealloc(vtable, layout);
        log::warn!(target: "element_sys", "type {ty} already implements interface {interface}");
        return EL_FALSE;
    }
    if let Some(interface_init) = info.interface_init {
        interface_init(vtable.cast(), info.interface_data);
    }
    log::debug!(target: "element_sys", "type {ty} implements interface {interface}");
    crate::EL_TRUE
}

/// Vtable of `interface` for the type of `object`.
pub unsafe extern "C" fn el_object_get_interface(object: *const el_object, interface: el_type) -> *mut c_void {
    if object.is_null() {
        return ptr::null_mut();
    }
    el_type_interface_peek(crate::el_object_type(object), interface)
}
