use std::ffi::c_void;
use std::mem::size_of;
use std::ptr;
use std::sync::atomic::Ordering;

use once_cell::sync::Lazy;

use crate::element::element_class_of;
use crate::{
    el_base_src, el_base_src_class, el_base_src_get_type, el_buffer, el_buffer_new_allocate, el_flow_return,
    el_type, el_type_class_peek, el_type_info, el_type_register_static, EL_FLOW_ERROR, EL_FLOW_NOT_SUPPORTED,
};

pub type el_push_src_create_func =
    unsafe extern "C" fn(src: *mut el_push_src, buffer: *mut *mut el_buffer) -> el_flow_return;

/// Source producing one buffer per call without a read offset or size.
/// Leaves offset and size to the base class.
#[repr(C)]
pub struct el_push_src_class {
    pub base_src_class: el_base_src_class,
    /// Stores a new buffer, owned by the caller, in `buffer`. Defaults to
    /// the base class's alloc-then-fill.
    pub create: Option<el_push_src_create_func>,
    /// Stores a new buffer, owned by the caller, in `buffer`. Defaults to a
    /// buffer of the current blocksize.
    pub alloc: Option<el_push_src_create_func>,
    /// `buffer` is borrowed.
    pub fill: Option<unsafe extern "C" fn(src: *mut el_push_src, buffer: *mut el_buffer) -> el_flow_return>,
}

#[repr(C)]
pub struct el_push_src {
    pub base_src: el_base_src,
}

unsafe fn push_class_of(src: *const el_base_src) -> *mut el_push_src_class {
    element_class_of(&(*src).element).cast()
}

unsafe extern "C" fn push_base_create(
    src: *mut el_base_src,
    _offset: u64,
    _size: u32,
    buffer: *mut *mut el_buffer,
) -> el_flow_return {
    match (*push_class_of(src)).create {
        Some(create) => create(src.cast(), buffer),
        None => EL_FLOW_NOT_SUPPORTED,
    }
}

unsafe extern "C" fn push_base_alloc(
    src: *mut el_base_src,
    _offset: u64,
    _size: u32,
    buffer: *mut *mut el_buffer,
) -> el_flow_return {
    match (*push_class_of(src)).alloc {
        Some(alloc) => alloc(src.cast(), buffer),
        None => EL_FLOW_NOT_SUPPORTED,
    }
}

unsafe extern "C" fn push_base_fill(
    src: *mut el_base_src,
    _offset: u64,
    _size: u32,
    buffer: *mut el_buffer,
) -> el_flow_return {
    match (*push_class_of(src)).fill {
        Some(fill) => fill(src.cast(), buffer),
        None => EL_FLOW_NOT_SUPPORTED,
    }
}

/// Runs the base class's create, which allocates and fills through the
/// push slots above.
unsafe extern "C" fn push_default_create(src: *mut el_push_src, buffer: *mut *mut el_buffer) -> el_flow_return {
    let base = el_type_class_peek(el_base_src_get_type()) as *const el_base_src_class;
    let Some(create) = base.as_ref().and_then(|base| base.create) else {
        return EL_FLOW_NOT_SUPPORTED;
    };
    let base_src = ptr::addr_of_mut!((*src).base_src);
    let offset = (*base_src).offset.load(Ordering::Acquire);
    create(base_src, offset, (*base_src).blocksize.load(Ordering::Acquire), buffer)
}

unsafe extern "C" fn push_default_alloc(src: *mut el_push_src, buffer: *mut *mut el_buffer) -> el_flow_return {
    let size = (*src).base_src.blocksize.load(Ordering::Acquire);
    *buffer = el_buffer_new_allocate(size as usize);
    if (*buffer).is_null() {
        return EL_FLOW_ERROR;
    }
    crate::EL_FLOW_OK
}

unsafe extern "C" fn push_src_class_init(klass: *mut c_void, _data: *mut c_void) {
    let klass = klass as *mut el_push_src_class;
    (*klass).base_src_class.create = Some(push_base_create);
    (*klass).base_src_class.alloc = Some(push_base_alloc);
    (*klass).base_src_class.fill = Some(push_base_fill);
    (*klass).create = Some(push_default_create);
    (*klass).alloc = Some(push_default_alloc);
}

static PUSH_SRC_TYPE: Lazy<el_type> = Lazy::new(|| unsafe {
    let info = el_type_info {
        class_size: size_of::<el_push_src_class>(),
        class_init: Some(push_src_class_init),
        class_data: ptr::null_mut(),
        instance_size: size_of::<el_push_src>(),
        instance_init: None,
    };
    el_type_register_static(el_base_src_get_type(), b"ElPushSrc\0".as_ptr().cast(), &info)
});

pub unsafe extern "C" fn el_push_src_get_type() -> el_type {
    *PUSH_SRC_TYPE
}
