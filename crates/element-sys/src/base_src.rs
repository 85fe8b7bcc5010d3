use std::ffi::c_void;
use std::mem::size_of;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use once_cell::sync::Lazy;

use crate::element::{element_class_for, element_class_of};
use crate::{
    el_boolean, el_boolean_from, el_buffer, el_buffer_new_allocate, el_buffer_unref, el_element,
    el_element_class, el_element_get_type, el_event, el_event_unref, el_flow_return, el_object, el_query,
    el_state_change, el_state_change_return, el_type, el_type_info, el_type_register_static,
    EL_BUFFER_OFFSET_NONE, EL_EVENT_FLUSH_START, EL_EVENT_FLUSH_STOP, EL_FALSE, EL_FLOW_EOS, EL_FLOW_FLUSHING,
    EL_FLOW_NOT_SUPPORTED, EL_FLOW_OK, EL_QUERY_DURATION, EL_QUERY_POSITION, EL_QUERY_SEEKING,
    EL_STATE_CHANGE_FAILURE, EL_STATE_CHANGE_PAUSED_TO_READY, EL_STATE_CHANGE_READY_TO_PAUSED,
    EL_STATE_CHANGE_SUCCESS, EL_TRUE,
};

pub const EL_BASE_SRC_DEFAULT_BLOCKSIZE: u32 = 4096;

pub type el_base_src_create_func = unsafe extern "C" fn(
    src: *mut el_base_src,
    offset: u64,
    size: u32,
    buffer: *mut *mut el_buffer,
) -> el_flow_return;

#[repr(C)]
pub struct el_base_src_class {
    pub element_class: el_element_class,
    pub start: Option<unsafe extern "C" fn(src: *mut el_base_src) -> el_boolean>,
    pub stop: Option<unsafe extern "C" fn(src: *mut el_base_src) -> el_boolean>,
    pub get_size: Option<unsafe extern "C" fn(src: *mut el_base_src, size: *mut u64) -> el_boolean>,
    pub is_seekable: Option<unsafe extern "C" fn(src: *mut el_base_src) -> el_boolean>,
    /// Stores a new buffer, owned by the caller, in `buffer`.
    pub create: Option<el_base_src_create_func>,
    /// Stores a new buffer, owned by the caller, in `buffer`.
    pub alloc: Option<el_base_src_create_func>,
    /// `buffer` is borrowed.
    pub fill: Option<
        unsafe extern "C" fn(src: *mut el_base_src, offset: u64, size: u32, buffer: *mut el_buffer) -> el_flow_return,
    >,
    pub do_seek: Option<unsafe extern "C" fn(src: *mut el_base_src, position: u64) -> el_boolean>,
    /// `event` is borrowed.
    pub event: Option<unsafe extern "C" fn(src: *mut el_base_src, event: *mut el_event) -> el_boolean>,
    pub query: Option<unsafe extern "C" fn(src: *mut el_base_src, query: *mut el_query) -> el_boolean>,
    pub unlock: Option<unsafe extern "C" fn(src: *mut el_base_src) -> el_boolean>,
    pub unlock_stop: Option<unsafe extern "C" fn(src: *mut el_base_src) -> el_boolean>,
}

#[repr(C)]
pub struct el_base_src {
    pub element: el_element,
    pub started: AtomicBool,
    pub flushing: AtomicBool,
    pub offset: AtomicU64,
    pub blocksize: AtomicU32,
}

unsafe fn src_class_of(src: *const el_base_src) -> *mut el_base_src_class {
    element_class_of(&(*src).element).cast()
}

unsafe fn call_or_true(
    src: *mut el_base_src,
    func: Option<unsafe extern "C" fn(*mut el_base_src) -> el_boolean>,
) -> el_boolean {
    match func {
        Some(func) => func(src),
        None => EL_TRUE,
    }
}

unsafe extern "C" fn src_change_state(
    element: *mut el_element,
    transition: el_state_change,
) -> el_state_change_return {
    let src = element as *mut el_base_src;
    let klass = src_class_of(src);
    match transition {
        EL_STATE_CHANGE_READY_TO_PAUSED => {
            if call_or_true(src, (*klass).start) == EL_FALSE {
                log::debug!(target: "element_sys", "base src start failed");
                return EL_STATE_CHANGE_FAILURE;
            }
            (*src).offset.store(0, Ordering::Release);
            (*src).flushing.store(false, Ordering::Release);
            (*src).started.store(true, Ordering::Release);
        }
        EL_STATE_CHANGE_PAUSED_TO_READY => {
            (*src).started.store(false, Ordering::Release);
            if call_or_true(src, (*klass).stop) == EL_FALSE {
                return EL_STATE_CHANGE_FAILURE;
            }
        }
        _ => {}
    }
    let parent = element_class_for(el_element_get_type());
    match (*parent).change_state {
        Some(change_state) => change_state(element, transition),
        None => EL_STATE_CHANGE_SUCCESS,
    }
}

unsafe extern "C" fn src_send_event(element: *mut el_element, event: *mut el_event) -> el_boolean {
    let src = element as *mut el_base_src;
    let result = match (*src_class_of(src)).event {
        Some(event_func) => event_func(src, event),
        None => EL_FALSE,
    };
    el_event_unref(event);
    result
}

unsafe extern "C" fn src_element_query(element: *mut el_element, query: *mut el_query) -> el_boolean {
    let src = element as *mut el_base_src;
    match (*src_class_of(src)).query {
        Some(query_func) => query_func(src, query),
        None => EL_FALSE,
    }
}

unsafe extern "C" fn src_default_event(src: *mut el_base_src, event: *mut el_event) -> el_boolean {
    let klass = src_class_of(src);
    match (*event).event_type {
        EL_EVENT_FLUSH_START => {
            (*src).flushing.store(true, Ordering::Release);
            call_or_true(src, (*klass).unlock)
        }
        EL_EVENT_FLUSH_STOP => {
            (*src).flushing.store(false, Ordering::Release);
            call_or_true(src, (*klass).unlock_stop)
        }
        _ => EL_TRUE,
    }
}

unsafe extern "C" fn src_default_query(src: *mut el_base_src, query: *mut el_query) -> el_boolean {
    match (*query).query_type {
        EL_QUERY_POSITION => {
            (*query).value = (*src).offset.load(Ordering::Acquire) as i64;
            EL_TRUE
        }
        EL_QUERY_DURATION => {
            let mut size = 0u64;
            (*query).value = if el_base_src_get_size(src, &mut size) != EL_FALSE {
                size as i64
            } else {
                -1
            };
            EL_TRUE
        }
        EL_QUERY_SEEKING => {
            (*query).seekable = el_base_src_is_seekable(src);
            EL_TRUE
        }
        _ => EL_FALSE,
    }
}

unsafe extern "C" fn src_default_alloc(
    _src: *mut el_base_src,
    _offset: u64,
    size: u32,
    buffer: *mut *mut el_buffer,
) -> el_flow_return {
    *buffer = el_buffer_new_allocate(size as usize);
    EL_FLOW_OK
}

/// Allocates through the class `alloc` slot and fills through `fill`.
unsafe extern "C" fn src_default_create(
    src: *mut el_base_src,
    offset: u64,
    size: u32,
    buffer: *mut *mut el_buffer,
) -> el_flow_return {
    let klass = src_class_of(src);
    let Some(fill) = (*klass).fill else {
        return EL_FLOW_NOT_SUPPORTED;
    };
    let mut allocated: *mut el_buffer = ptr::null_mut();
    let alloc = (*klass).alloc.unwrap_or(src_default_alloc);
    let ret = alloc(src, offset, size, &mut allocated);
    if ret != EL_FLOW_OK {
        el_buffer_unref(allocated);
        return ret;
    }
    if allocated.is_null() {
        return crate::EL_FLOW_ERROR;
    }
    let ret = fill(src, offset, size, allocated);
    if ret != EL_FLOW_OK {
        el_buffer_unref(allocated);
        return ret;
    }
    *buffer = allocated;
    EL_FLOW_OK
}

unsafe extern "C" fn src_class_init(klass: *mut c_void, _data: *mut c_void) {
    let klass = klass as *mut el_base_src_class;
    (*klass).element_class.change_state = Some(src_change_state);
    (*klass).element_class.send_event = Some(src_send_event);
    (*klass).element_class.query = Some(src_element_query);
    (*klass).create = Some(src_default_create);
    (*klass).alloc = Some(src_default_alloc);
    (*klass).event = Some(src_default_event);
    (*klass).query = Some(src_default_query);
}

unsafe extern "C" fn src_instance_init(instance: *mut el_object, _klass: *mut c_void) {
    let src = instance as *mut el_base_src;
    (*src).blocksize.store(EL_BASE_SRC_DEFAULT_BLOCKSIZE, Ordering::Relaxed);
}

static BASE_SRC_TYPE: Lazy<el_type> = Lazy::new(|| unsafe {
    let info = el_type_info {
        class_size: size_of::<el_base_src_class>(),
        class_init: Some(src_class_init),
        class_data: ptr::null_mut(),
        instance_size: size_of::<el_base_src>(),
        instance_init: Some(src_instance_init),
    };
    el_type_register_static(el_element_get_type(), b"ElBaseSrc\0".as_ptr().cast(), &info)
});

pub unsafe extern "C" fn el_base_src_get_type() -> el_type {
    *BASE_SRC_TYPE
}

/// Produces the next block. On success `*buffer` holds a buffer owned by the
/// caller and the read offset advances by its size. Returns `EL_FLOW_EOS`
/// once the offset reaches a known size.
pub unsafe extern "C" fn el_base_src_pull(src: *mut el_base_src, buffer: *mut *mut el_buffer) -> el_flow_return {
    if src.is_null() || buffer.is_null() {
        return EL_FLOW_FLUSHING;
    }
    *buffer = ptr::null_mut();
    if !(*src).started.load(Ordering::Acquire) || (*src).flushing.load(Ordering::Acquire) {
        return EL_FLOW_FLUSHING;
    }
    let offset = (*src).offset.load(Ordering::Acquire);
    let mut size = 0u64;
    if el_base_src_get_size(src, &mut size) != EL_FALSE && offset >= size {
        return EL_FLOW_EOS;
    }
    let Some(create) = (*src_class_of(src)).create else {
        return EL_FLOW_NOT_SUPPORTED;
    };
    let mut created: *mut el_buffer = ptr::null_mut();
    let ret = create(src, offset, (*src).blocksize.load(Ordering::Acquire), &mut created);
    if ret != EL_FLOW_OK {
        el_buffer_unref(created);
        return ret;
    }
    if created.is_null() {
        return crate::EL_FLOW_ERROR;
    }
    if (*created).offset == EL_BUFFER_OFFSET_NONE {
        (*created).offset = offset;
    }
    (*src).offset.store(offset + (*created).size as u64, Ordering::Release);
    *buffer = created;
    EL_FLOW_OK
}

/// Total size in bytes, when the class knows it.
pub unsafe extern "C" fn el_base_src_get_size(src: *mut el_base_src, size: *mut u64) -> el_boolean {
    match (*src_class_of(src)).get_size {
        Some(get_size) => get_size(src, size),
        None => EL_FALSE,
    }
}

pub unsafe extern "C" fn el_base_src_is_seekable(src: *mut el_base_src) -> el_boolean {
    match (*src_class_of(src)).is_seekable {
        Some(is_seekable) => is_seekable(src),
        None => EL_FALSE,
    }
}

/// Moves the read offset to `position` when the source is seekable and
/// `do_seek` accepts it.
pub unsafe extern "C" fn el_base_src_seek(src: *mut el_base_src, position: u64) -> el_boolean {
    if el_base_src_is_seekable(src) == EL_FALSE {
        return EL_FALSE;
    }
    let accepted = match (*src_class_of(src)).do_seek {
        Some(do_seek) => do_seek(src, position),
        None => EL_TRUE,
    };
    if accepted != EL_FALSE {
        (*src).offset.store(position, Ordering::Release);
    }
    accepted
}

pub unsafe extern "C" fn el_base_src_is_started(src: *const el_base_src) -> el_boolean {
    el_boolean_from((*src).started.load(Ordering::Acquire))
}

pub unsafe extern "C" fn el_base_src_get_offset(src: *const el_base_src) -> u64 {
    (*src).offset.load(Ordering::Acquire)
}

pub unsafe extern "C" fn el_base_src_set_blocksize(src: *mut el_base_src, blocksize: u32) {
    (*src).blocksize.store(blocksize, Ordering::Release);
}

pub unsafe extern "C" fn el_base_src_get_blocksize(src: *const el_base_src) -> u32 {
    (*src).blocksize.load(Ordering::Acquire)
}
