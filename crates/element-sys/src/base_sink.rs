use std::ffi::c_void;
use std::mem::size_of;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use once_cell::sync::Lazy;

use crate::element::{element_class_for, element_class_of};
use crate::{
    el_boolean, el_boolean_from, el_buffer, el_buffer_unref, el_caps, el_element, el_element_class,
    el_element_get_type, el_event, el_event_unref, el_flow_return, el_mutex, el_mutex_init, el_mutex_lock,
    el_mutex_trylock, el_mutex_unlock, el_object, el_query, el_state_change, el_state_change_return, el_type,
    el_type_info, el_type_register_static, EL_EVENT_CAPS, EL_EVENT_EOS, EL_EVENT_FLUSH_START,
    EL_EVENT_FLUSH_STOP, EL_FALSE, EL_FLOW_EOS, EL_FLOW_FLUSHING, EL_FLOW_OK, EL_QUERY_SEEKING,
    EL_STATE_CHANGE_FAILURE, EL_STATE_CHANGE_PAUSED_TO_READY, EL_STATE_CHANGE_READY_TO_PAUSED,
    EL_STATE_CHANGE_SUCCESS, EL_TRUE,
};

#[repr(C)]
pub struct el_base_sink_class {
    pub element_class: el_element_class,
    pub start: Option<unsafe extern "C" fn(sink: *mut el_base_sink) -> el_boolean>,
    pub stop: Option<unsafe extern "C" fn(sink: *mut el_base_sink) -> el_boolean>,
    /// `caps` is borrowed.
    pub set_caps: Option<unsafe extern "C" fn(sink: *mut el_base_sink, caps: *mut el_caps) -> el_boolean>,
    /// Takes ownership of `event`.
    pub event: Option<unsafe extern "C" fn(sink: *mut el_base_sink, event: *mut el_event) -> el_boolean>,
    pub query: Option<unsafe extern "C" fn(sink: *mut el_base_sink, query: *mut el_query) -> el_boolean>,
    /// `buffer` is borrowed.
    pub preroll: Option<unsafe extern "C" fn(sink: *mut el_base_sink, buffer: *mut el_buffer) -> el_flow_return>,
    /// `buffer` is borrowed.
    pub render: Option<unsafe extern "C" fn(sink: *mut el_base_sink, buffer: *mut el_buffer) -> el_flow_return>,
    pub unlock: Option<unsafe extern "C" fn(sink: *mut el_base_sink) -> el_boolean>,
    pub unlock_stop: Option<unsafe extern "C" fn(sink: *mut el_base_sink) -> el_boolean>,
}

#[repr(C)]
pub struct el_base_sink {
    pub element: el_element,
    pub preroll_lock: el_mutex,
    pub started: AtomicBool,
    pub eos: AtomicBool,
    pub flushing: AtomicBool,
    pub have_preroll: AtomicBool,
    pub rendered: AtomicU64,
}

unsafe fn sink_class_of(sink: *const el_base_sink) -> *mut el_base_sink_class {
    element_class_of(&(*sink).element).cast()
}

unsafe fn call_or_true(
    sink: *mut el_base_sink,
    func: Option<unsafe extern "C" fn(*mut el_base_sink) -> el_boolean>,
) -> el_boolean {
    match func {
        Some(func) => func(sink),
        None => EL_TRUE,
    }
}

unsafe extern "C" fn sink_change_state(
    element: *mut el_element,
    transition: el_state_change,
) -> el_state_change_return {
    let sink = element as *mut el_base_sink;
    let klass = sink_class_of(sink);
    match transition {
        EL_STATE_CHANGE_READY_TO_PAUSED => {
            if call_or_true(sink, (*klass).start) == EL_FALSE {
                log::debug!(target: "element_sys", "base sink start failed");
                return EL_STATE_CHANGE_FAILURE;
            }
            (*sink).eos.store(false, Ordering::Release);
            (*sink).flushing.store(false, Ordering::Release);
            (*sink).have_preroll.store(false, Ordering::Release);
            (*sink).started.store(true, Ordering::Release);
        }
        EL_STATE_CHANGE_PAUSED_TO_READY => {
            (*sink).started.store(false, Ordering::Release);
            if call_or_true(sink, (*klass).stop) == EL_FALSE {
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

unsafe extern "C" fn sink_send_event(element: *mut el_element, event: *mut el_event) -> el_boolean {
    let sink = element as *mut el_base_sink;
    match (*sink_class_of(sink)).event {
        Some(event_func) => event_func(sink, event),
        None => {
            el_event_unref(event);
            EL_FALSE
        }
    }
}

unsafe extern "C" fn sink_element_query(element: *mut el_element, query: *mut el_query) -> el_boolean {
    let sink = element as *mut el_base_sink;
    match (*sink_class_of(sink)).query {
        Some(query_func) => query_func(sink, query),
        None => EL_FALSE,
    }
}

unsafe extern "C" fn sink_default_event(sink: *mut el_base_sink, event: *mut el_event) -> el_boolean {
    let klass = sink_class_of(sink);
    let result = match (*event).event_type {
        EL_EVENT_EOS => {
            (*sink).eos.store(true, Ordering::Release);
            EL_TRUE
        }
        EL_EVENT_FLUSH_START => {
            (*sink).flushing.store(true, Ordering::Release);
            call_or_true(sink, (*klass).unlock)
        }
        EL_EVENT_FLUSH_STOP => {
            (*sink).flushing.store(false, Ordering::Release);
            (*sink).eos.store(false, Ordering::Release);
            (*sink).have_preroll.store(false, Ordering::Release);
            call_or_true(sink, (*klass).unlock_stop)
        }
        EL_EVENT_CAPS => match (*klass).set_caps {
            Some(set_caps) => set_caps(sink, (*event).caps),
            None => EL_TRUE,
        },
        _ => EL_TRUE,
    };
    el_event_unref(event);
    result
}

unsafe extern "C" fn sink_default_query(_sink: *mut el_base_sink, query: *mut el_query) -> el_boolean {
    if (*query).query_type == EL_QUERY_SEEKING {
        (*query).seekable = EL_FALSE;
        return EL_TRUE;
    }
    EL_FALSE
}

unsafe extern "C" fn sink_class_init(klass: *mut c_void, _data: *mut c_void) {
    let klass = klass as *mut el_base_sink_class;
    (*klass).element_class.change_state = Some(sink_change_state);
    (*klass).element_class.send_event = Some(sink_send_event);
    (*klass).element_class.query = Some(sink_element_query);
    (*klass).event = Some(sink_default_event);
    (*klass).query = Some(sink_default_query);
}

unsafe extern "C" fn sink_instance_init(instance: *mut el_object, _klass: *mut c_void) {
    let sink = instance as *mut el_base_sink;
    el_mutex_init(ptr::addr_of_mut!((*sink).preroll_lock));
}

static BASE_SINK_TYPE: Lazy<el_type> = Lazy::new(|| unsafe {
    let info = el_type_info {
        class_size: size_of::<el_base_sink_class>(),
        class_init: Some(sink_class_init),
        class_data: ptr::null_mut(),
        instance_size: size_of::<el_base_sink>(),
        instance_init: Some(sink_instance_init),
    };
    el_type_register_static(el_element_get_type(), b"ElBaseSink\0".as_ptr().cast(), &info)
});

pub unsafe extern "C" fn el_base_sink_get_type() -> el_type {
    *BASE_SINK_TYPE
}

/// Pushes `buffer` into the sink, taking ownership of it. The first buffer
/// after start or flush goes through `preroll`, every buffer through
/// `render`. Neither is called with the preroll lock held.
pub unsafe extern "C" fn el_base_sink_chain(sink: *mut el_base_sink, buffer: *mut el_buffer) -> el_flow_return {
    if sink.is_null() || buffer.is_null() {
        el_buffer_unref(buffer);
        return EL_FLOW_FLUSHING;
    }
    if (*sink).flushing.load(Ordering::Acquire) || !(*sink).started.load(Ordering::Acquire) {
        el_buffer_unref(buffer);
        return EL_FLOW_FLUSHING;
    }
    if (*sink).eos.load(Ordering::Acquire) {
        el_buffer_unref(buffer);
        return EL_FLOW_EOS;
    }

    let klass = sink_class_of(sink);
    let mut ret = EL_FLOW_OK;
    if !(*sink).have_preroll.swap(true, Ordering::AcqRel) {
        if let Some(preroll) = (*klass).preroll {
            ret = preroll(sink, buffer);
        }
    }
    if ret == EL_FLOW_OK {
        if let Some(render) = (*klass).render {
            ret = render(sink, buffer);
        }
        if ret == EL_FLOW_OK {
            (*sink).rendered.fetch_add(1, Ordering::AcqRel);
        }
    }
    el_buffer_unref(buffer);
    ret
}

pub unsafe extern "C" fn el_base_sink_is_started(sink: *const el_base_sink) -> el_boolean {
    el_boolean_from((*sink).started.load(Ordering::Acquire))
}

pub unsafe extern "C" fn el_base_sink_is_eos(sink: *const el_base_sink) -> el_boolean {
    el_boolean_from((*sink).eos.load(Ordering::Acquire))
}

pub unsafe extern "C" fn el_base_sink_is_flushing(sink: *const el_base_sink) -> el_boolean {
    el_boolean_from((*sink).flushing.load(Ordering::Acquire))
}

pub unsafe extern "C" fn el_base_sink_rendered(sink: *const el_base_sink) -> u64 {
    (*sink).rendered.load(Ordering::Acquire)
}

pub unsafe extern "C" fn el_base_sink_preroll_lock(sink: *mut el_base_sink) {
    el_mutex_lock(ptr::addr_of_mut!((*sink).preroll_lock));
}

pub unsafe extern "C" fn el_base_sink_preroll_trylock(sink: *mut el_base_sink) -> el_boolean {
    el_mutex_trylock(ptr::addr_of_mut!((*sink).preroll_lock))
}

pub unsafe extern "C" fn el_base_sink_preroll_unlock(sink: *mut el_base_sink) {
    el_mutex_unlock(ptr::addr_of_mut!((*sink).preroll_lock));
}
