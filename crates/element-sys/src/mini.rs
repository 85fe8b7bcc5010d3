use std::ffi::{c_char, c_void, CStr};
use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::{
    el_boolean, el_boolean_from, el_clock_time, el_free_string, el_strdup, EL_BUFFER_OFFSET_NONE,
    EL_CLOCK_TIME_NONE, EL_FALSE,
};

pub type el_mini_object_type = u32;

pub const EL_MINI_OBJECT_BUFFER: el_mini_object_type = 1;
pub const EL_MINI_OBJECT_CAPS: el_mini_object_type = 2;
pub const EL_MINI_OBJECT_EVENT: el_mini_object_type = 3;
pub const EL_MINI_OBJECT_QUERY: el_mini_object_type = 4;

pub type el_mini_object_notify = unsafe extern "C" fn(data: *mut c_void, object: *mut el_mini_object);

/// Refcounted header of buffers, caps, events and queries.
#[repr(C)]
pub struct el_mini_object {
    pub type_: el_mini_object_type,
    pub ref_count: AtomicU32,
    pub notify: Option<el_mini_object_notify>,
    pub notify_data: *mut c_void,
    pub free: Option<unsafe extern "C" fn(object: *mut el_mini_object)>,
}

impl el_mini_object {
    fn new(type_: el_mini_object_type, free: unsafe extern "C" fn(*mut el_mini_object)) -> Self {
        el_mini_object {
            type_,
            ref_count: AtomicU32::new(1),
            notify: None,
            notify_data: ptr::null_mut(),
            free: Some(free),
        }
    }
}

pub unsafe extern "C" fn el_mini_object_ref(object: *mut el_mini_object) -> *mut el_mini_object {
    if !object.is_null() {
        (*object).ref_count.fetch_add(1, Ordering::Relaxed);
    }
    object
}

/// Drops one reference. The last one calls the dispose notify, if any, and
/// then frees the object.
pub unsafe extern "C" fn el_mini_object_unref(object: *mut el_mini_object) {
    if object.is_null() {
        return;
    }
    if (*object).ref_count.fetch_sub(1, Ordering::AcqRel) != 1 {
        return;
    }
    if let Some(notify) = (*object).notify.take() {
        notify((*object).notify_data, object);
    }
    if let Some(free) = (*object).free {
        free(object);
    }
}

pub unsafe extern "C" fn el_mini_object_refcount(object: *const el_mini_object) -> u32 {
    (*object).ref_count.load(Ordering::Acquire)
}

pub unsafe extern "C" fn el_mini_object_is_writable(object: *const el_mini_object) -> el_boolean {
    el_boolean_from(el_mini_object_refcount(object) == 1)
}

/// Installs the notify called once right before the object is freed,
/// replacing any previous one without calling it.
pub unsafe extern "C" fn el_mini_object_set_dispose_notify(
    object: *mut el_mini_object,
    notify: Option<el_mini_object_notify>,
    data: *mut c_void,
) {
    (*object).notify = notify;
    (*object).notify_data = data;
}

#[repr(C)]
pub struct el_buffer {
    pub mini: el_mini_object,
    pub pts: el_clock_time,
    pub dts: el_clock_time,
    pub duration: el_clock_time,
    pub offset: u64,
    pub offset_end: u64,
    pub flags: u32,
    pub data: *mut u8,
    pub size: usize,
    pub maxsize: usize,
}

unsafe extern "C" fn buffer_free(object: *mut el_mini_object) {
    let buffer = Box::from_raw(object as *mut el_buffer);
    drop(Box::from_raw(ptr::slice_from_raw_parts_mut(buffer.data, buffer.maxsize)));
}

fn buffer_from_storage(storage: Box<[u8]>) -> *mut el_buffer {
    let maxsize = storage.len();
    let data = Box::into_raw(storage) as *mut u8;
    Box::into_raw(Box::new(el_buffer {
        mini: el_mini_object::new(EL_MINI_OBJECT_BUFFER, buffer_free),
        pts: EL_CLOCK_TIME_NONE,
        dts: EL_CLOCK_TIME_NONE,
        duration: EL_CLOCK_TIME_NONE,
        offset: EL_BUFFER_OFFSET_NONE,
        offset_end: EL_BUFFER_OFFSET_NONE,
        flags: 0,
        data,
        size: maxsize,
        maxsize,
    }))
}

/// New zero-filled buffer of `size` bytes with unset timestamps.
pub unsafe extern "C" fn el_buffer_new_allocate(size: usize) -> *mut el_buffer {
    buffer_from_storage(vec![0u8; size].into_boxed_slice())
}

pub unsafe extern "C" fn el_buffer_new_copy(data: *const u8, size: usize) -> *mut el_buffer {
    if data.is_null() || size == 0 {
        return el_buffer_new_allocate(0);
    }
    buffer_from_storage(std::slice::from_raw_parts(data, size).to_vec().into_boxed_slice())
}

/// Deep copy, metadata included. The copy has no dispose notify.
pub unsafe extern "C" fn el_buffer_copy(buffer: *const el_buffer) -> *mut el_buffer {
    let copy = el_buffer_new_copy((*buffer).data, (*buffer).size);
    (*copy).pts = (*buffer).pts;
    (*copy).dts = (*buffer).dts;
    (*copy).duration = (*buffer).duration;
    (*copy).offset = (*buffer).offset;
    (*copy).offset_end = (*buffer).offset_end;
    (*copy).flags = (*buffer).flags;
    copy
}

/// Returns `buffer` if it is writable, otherwise a copy, consuming the
/// caller's reference in both cases.
pub unsafe extern "C" fn el_buffer_make_writable(buffer: *mut el_buffer) -> *mut el_buffer {
    if el_mini_object_is_writable(&(*buffer).mini) != EL_FALSE {
        return buffer;
    }
    let copy = el_buffer_copy(buffer);
    el_buffer_unref(buffer);
    copy
}

/// Sets the visible size within the allocated storage.
pub unsafe extern "C" fn el_buffer_resize(buffer: *mut el_buffer, size: usize) -> el_boolean {
    if size > (*buffer).maxsize {
        return EL_FALSE;
    }
    (*buffer).size = size;
    el_boolean_from(true)
}

pub unsafe extern "C" fn el_buffer_ref(buffer: *mut el_buffer) -> *mut el_buffer {
    el_mini_object_ref(buffer.cast()).cast()
}

pub unsafe extern "C" fn el_buffer_unref(buffer: *mut el_buffer) {
    el_mini_object_unref(buffer.cast())
}

#[repr(C)]
pub struct el_caps {
    pub mini: el_mini_object,
    pub media_type: *mut c_char,
}

unsafe extern "C" fn caps_free(object: *mut el_mini_object) {
    let caps = Box::from_raw(object as *mut el_caps);
    el_free_string(caps.media_type);
}

pub unsafe extern "C" fn el_caps_new(media_type: *const c_char) -> *mut el_caps {
    Box::into_raw(Box::new(el_caps {
        mini: el_mini_object::new(EL_MINI_OBJECT_CAPS, caps_free),
        media_type: el_strdup(media_type),
    }))
}

pub unsafe extern "C" fn el_caps_get_media_type(caps: *const el_caps) -> *const c_char {
    (*caps).media_type
}

pub unsafe extern "C" fn el_caps_is_equal(a: *const el_caps, b: *const el_caps) -> el_boolean {
    if a.is_null() || b.is_null() {
        return el_boolean_from(a == b);
    }
    let (a, b) = ((*a).media_type, (*b).media_type);
    if a.is_null() || b.is_null() {
        return el_boolean_from(a.is_null() && b.is_null());
    }
    el_boolean_from(CStr::from_ptr(a) == CStr::from_ptr(b))
}

pub unsafe extern "C" fn el_caps_ref(caps: *mut el_caps) -> *mut el_caps {
    el_mini_object_ref(caps.cast()).cast()
}

pub unsafe extern "C" fn el_caps_unref(caps: *mut el_caps) {
    el_mini_object_unref(caps.cast())
}

pub type el_event_type = u32;

pub const EL_EVENT_EOS: el_event_type = 1;
pub const EL_EVENT_FLUSH_START: el_event_type = 2;
pub const EL_EVENT_FLUSH_STOP: el_event_type = 3;
pub const EL_EVENT_CAPS: el_event_type = 4;
pub const EL_EVENT_SEGMENT: el_event_type = 5;
pub const EL_EVENT_CUSTOM: el_event_type = 6;

#[repr(C)]
pub struct el_event {
    pub mini: el_mini_object,
    pub event_type: el_event_type,
    pub seqnum: u32,
    pub caps: *mut el_caps,
    pub position: el_clock_time,
    pub name: *mut c_char,
}

static EVENT_SEQNUM: AtomicU32 = AtomicU32::new(1);

unsafe extern "C" fn event_free(object: *mut el_mini_object) {
    let event = Box::from_raw(object as *mut el_event);
    if !event.caps.is_null() {
        el_caps_unref(event.caps);
    }
    el_free_string(event.name);
}

unsafe fn event_new(event_type: el_event_type) -> *mut el_event {
    Box::into_raw(Box::new(el_event {
        mini: el_mini_object::new(EL_MINI_OBJECT_EVENT, event_free),
        event_type,
        seqnum: EVENT_SEQNUM.fetch_add(1, Ordering::Relaxed),
        caps: ptr::null_mut(),
        position: EL_CLOCK_TIME_NONE,
        name: ptr::null_mut(),
    }))
}

pub unsafe extern "C" fn el_event_new_eos() -> *mut el_event {
    event_new(EL_EVENT_EOS)
}

pub unsafe extern "C" fn el_event_new_flush_start() -> *mut el_event {
    event_new(EL_EVENT_FLUSH_START)
}

pub unsafe extern "C" fn el_event_new_flush_stop() -> *mut el_event {
    event_new(EL_EVENT_FLUSH_STOP)
}

/// Takes a new reference on `caps`.
pub unsafe extern "C" fn el_event_new_caps(caps: *mut el_caps) -> *mut el_event {
    let event = event_new(EL_EVENT_CAPS);
    (*event).caps = el_caps_ref(caps);
    event
}

pub unsafe extern "C" fn el_event_new_segment(position: el_clock_time) -> *mut el_event {
    let event = event_new(EL_EVENT_SEGMENT);
    (*event).position = position;
    event
}

pub unsafe extern "C" fn el_event_new_custom(name: *const c_char) -> *mut el_event {
    let event = event_new(EL_EVENT_CUSTOM);
    (*event).name = el_strdup(name);
    event
}

pub unsafe extern "C" fn el_event_ref(event: *mut el_event) -> *mut el_event {
    el_mini_object_ref(event.cast()).cast()
}

pub unsafe extern "C" fn el_event_unref(event: *mut el_event) {
    el_mini_object_unref(event.cast())
}

pub type el_query_type = u32;

pub const EL_QUERY_POSITION: el_query_type = 1;
pub const EL_QUERY_DURATION: el_query_type = 2;
pub const EL_QUERY_SEEKING: el_query_type = 3;

/// Query answered in place. `value` is -1 until answered.
#[repr(C)]
pub struct el_query {
    pub mini: el_mini_object,
    pub query_type: el_query_type,
    pub value: i64,
    pub seekable: el_boolean,
}

unsafe extern "C" fn query_free(object: *mut el_mini_object) {
    drop(Box::from_raw(object as *mut el_query));
}

pub unsafe extern "C" fn el_query_new(query_type: el_query_type) -> *mut el_query {
    Box::into_raw(Box::new(el_query {
        mini: el_mini_object::new(EL_MINI_OBJECT_QUERY, query_free),
        query_type,
        value: -1,
        seekable: EL_FALSE,
    }))
}

pub unsafe extern "C" fn el_query_unref(query: *mut el_query) {
    el_mini_object_unref(query.cast())
}
