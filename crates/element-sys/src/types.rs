use std::alloc::{alloc_zeroed, Layout};
use std::ffi::{c_char, c_void, CStr, CString};
use std::mem::size_of;
use std::ptr;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::{el_boolean, el_boolean_from, el_object, el_pad_template, el_param_spec, EL_FALSE};

/// Runtime type identifier. Zero is never a valid type.
pub type el_type = usize;

pub const EL_TYPE_INVALID: el_type = 0;

pub type el_class_init_func = unsafe extern "C" fn(klass: *mut c_void, class_data: *mut c_void);
pub type el_instance_init_func = unsafe extern "C" fn(instance: *mut el_object, klass: *mut c_void);

/// Static description handed to [`el_type_register_static`].
#[repr(C)]
#[derive(Clone, Copy)]
pub struct el_type_info {
    pub class_size: usize,
    pub class_init: Option<el_class_init_func>,
    pub class_data: *mut c_void,
    pub instance_size: usize,
    pub instance_init: Option<el_instance_init_func>,
}

/// Header shared by every class table.
#[repr(C)]
pub struct el_type_class {
    pub type_: el_type,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct el_type_query_info {
    pub type_: el_type,
    pub class_size: usize,
    pub instance_size: usize,
}

pub(crate) const STRUCT_ALIGN: usize = 16;

pub(crate) struct PropertyEntry {
    pub(crate) id: u32,
    pub(crate) pspec: *mut el_param_spec,
}

pub(crate) struct InterfaceEntry {
    pub(crate) interface: el_type,
    pub(crate) vtable: *mut u8,
}

pub(crate) struct TypeNode {
    pub(crate) name: CString,
    pub(crate) parent: el_type,
    pub(crate) class_size: usize,
    pub(crate) instance_size: usize,
    pub(crate) class: *mut u8,
    pub(crate) instance_init: Option<el_instance_init_func>,
    pub(crate) properties: Vec<PropertyEntry>,
    pub(crate) metadata: Vec<(CString, CString)>,
    /// Interface types have no class table and `class_size` is the size of
    /// their vtable.
    pub(crate) is_interface: bool,
    pub(crate) interfaces: Vec<InterfaceEntry>,
    pub(crate) pad_templates: Vec<*mut el_pad_template>,
}

impl TypeNode {
    pub(crate) fn new(name: CString, parent: el_type, class_size: usize, instance_size: usize) -> Self {
        Self {
            name,
            parent,
            class_size,
            instance_size,
            class: ptr::null_mut(),
            instance_init: None,
            properties: Vec::new(),
            metadata: Vec::new(),
            is_interface: false,
            interfaces: Vec::new(),
            pad_templates: Vec::new(),
        }
    }
}

// Class memory is written only during registration and never freed.
unsafe impl Send for TypeNode {}
unsafe impl Sync for TypeNode {}

static TYPES: Lazy<RwLock<Vec<TypeNode>>> = Lazy::new(|| RwLock::new(Vec::new()));

fn node_index(ty: el_type) -> Option<usize> {
    ty.checked_sub(1)
}

/// Appends `node` unless its name is taken.
pub(crate) fn insert_node(node: TypeNode) -> el_type {
    let mut types = TYPES.write();
    if types.iter().any(|existing| existing.name == node.name) {
        log::warn!(target: "element_sys", "type {:?} is already registered", node.name);
        return EL_TYPE_INVALID;
    }
    types.push(node);
    types.len()
}

pub(crate) fn with_node<R>(ty: el_type, f: impl FnOnce(&TypeNode) -> R) -> Option<R> {
    let types = TYPES.read();
    node_index(ty).and_then(|index| types.get(index)).map(f)
}

pub(crate) fn with_node_mut<R>(ty: el_type, f: impl FnOnce(&mut TypeNode) -> R) -> Option<R> {
    let mut types = TYPES.write();
    node_index(ty).and_then(|index| types.get_mut(index)).map(f)
}

pub(crate) fn struct_layout(size: usize) -> Option<Layout> {
    Layout::from_size_align(size.max(1), STRUCT_ALIGN).ok()
}

/// Types from `ty` up to the root, leaf first.
pub(crate) fn ancestry(ty: el_type) -> Vec<el_type> {
    let types = TYPES.read();
    let mut chain = Vec::new();
    let mut current = ty;
    while let Some(node) = node_index(current).and_then(|index| types.get(index)) {
        chain.push(current);
        current = node.parent;
    }
    chain
}

/// Locates a property by name along the ancestry of `ty`, returning the
/// owning type together with the id it was installed under.
pub(crate) fn find_property(ty: el_type, name: &CStr) -> Option<(el_type, u32, *mut el_param_spec)> {
    let types = TYPES.read();
    let mut current = ty;
    while let Some(node) = node_index(current).and_then(|index| types.get(index)) {
        for entry in &node.properties {
            let pspec_name = unsafe { CStr::from_ptr((*entry.pspec).name) };
            if pspec_name == name {
                return Some((current, entry.id, entry.pspec));
            }
        }
        current = node.parent;
    }
    None
}

pub(crate) fn find_metadata(ty: el_type, key: &CStr) -> *const c_char {
    let types = TYPES.read();
    let mut current = ty;
    while let Some(node) = node_index(current).and_then(|index| types.get(index)) {
        if let Some((_, value)) = node.metadata.iter().find(|(k, _)| k.as_c_str() == key) {
            return value.as_ptr();
        }
        current = node.parent;
    }
    ptr::null()
}

pub(crate) unsafe fn type_of_class(klass: *const c_void) -> el_type {
    if klass.is_null() {
        return EL_TYPE_INVALID;
    }
    (*(klass as *const el_type_class)).type_
}

/// Registers a new static type deriving from `parent`.
///
/// The class table is allocated zeroed, the parent's table is copied into its
/// prefix and `class_init` runs afterwards, outside the type lock. Returns
/// [`EL_TYPE_INVALID`] when the name is taken, the parent is unknown or the
/// sizes are smaller than the parent's.
pub unsafe extern "C" fn el_type_register_static(
    parent: el_type,
    name: *const c_char,
    info: *const el_type_info,
) -> el_type {
    if name.is_null() || info.is_null() {
        return EL_TYPE_INVALID;
    }
    let name = CStr::from_ptr(name).to_owned();
    let info = *info;

    let (ty, class) = {
        let mut types = TYPES.write();
        if types.iter().any(|node| node.name == name) {
            log::warn!(target: "element_sys", "type {name:?} is already registered");
            return EL_TYPE_INVALID;
        }

        let (parent_class, parent_class_size, parent_instance_size) = if parent == EL_TYPE_INVALID {
            (ptr::null_mut(), size_of::<el_type_class>(), 0)
        } else {
            match node_index(parent).and_then(|index| types.get(index)) {
                Some(node) if !node.is_interface => (node.class, node.class_size, node.instance_size),
                _ => {
                    log::warn!(target: "element_sys", "unknown or interface parent type {parent} for {name:?}");
                    return EL_TYPE_INVALID;
                }
            }
        };
        if info.class_size < parent_class_size || info.instance_size < parent_instance_size {
            log::warn!(
                target: "element_sys",
                "type {name:?} is smaller than its parent ({} < {parent_class_size} or {} < {parent_instance_size})",
                info.class_size,
                info.instance_size
            );
            return EL_TYPE_INVALID;
        }

        let Some(layout) = struct_layout(info.class_size) else {
            return EL_TYPE_INVALID;
        };
        let class = alloc_zeroed(layout);
        if class.is_null() {
            return EL_TYPE_INVALID;
        }
        if !parent_class.is_null() {
            ptr::copy_nonoverlapping(parent_class, class, parent_class_size);
        }

        let mut node = TypeNode::new(name, parent, info.class_size, info.instance_size);
        node.class = class;
        node.instance_init = info.instance_init;
        types.push(node);
        let ty = types.len();
        (*(class as *mut el_type_class)).type_ = ty;
        (ty, class)
    };

    if let Some(class_init) = info.class_init {
        class_init(class.cast(), info.class_data);
    }
    ty
}

pub unsafe extern "C" fn el_type_from_name(name: *const c_char) -> el_type {
    if name.is_null() {
        return EL_TYPE_INVALID;
    }
    let name = CStr::from_ptr(name);
    let types = TYPES.read();
    types
        .iter()
        .position(|node| node.name.as_c_str() == name)
        .map(|index| index + 1)
        .unwrap_or(EL_TYPE_INVALID)
}

pub unsafe extern "C" fn el_type_name(ty: el_type) -> *const c_char {
    with_node(ty, |node| node.name.as_ptr()).unwrap_or(ptr::null())
}

pub unsafe extern "C" fn el_type_parent(ty: el_type) -> el_type {
    with_node(ty, |node| node.parent).unwrap_or(EL_TYPE_INVALID)
}

/// Fills `query` with the registered sizes of `ty`; zeroes it for unknown types.
pub unsafe extern "C" fn el_type_query(ty: el_type, query: *mut el_type_query_info) -> el_boolean {
    if query.is_null() {
        return EL_FALSE;
    }
    let info = with_node(ty, |node| el_type_query_info {
        type_: ty,
        class_size: node.class_size,
        instance_size: node.instance_size,
    });
    *query = info.unwrap_or_default();
    el_boolean_from(info.is_some())
}

pub unsafe extern "C" fn el_type_class_peek(ty: el_type) -> *mut c_void {
    with_node(ty, |node| node.class.cast()).unwrap_or(ptr::null_mut())
}

/// Class table of the parent of the type owning `klass`.
pub unsafe extern "C" fn el_type_class_peek_parent(klass: *const c_void) -> *mut c_void {
    el_type_class_peek(el_type_parent(type_of_class(klass)))
}

pub unsafe extern "C" fn el_type_is_a(ty: el_type, ancestor: el_type) -> el_boolean {
    if ancestor == EL_TYPE_INVALID {
        return EL_FALSE;
    }
    el_boolean_from(ancestry(ty).contains(&ancestor))
}
