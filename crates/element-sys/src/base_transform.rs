use std::ffi::c_void;
use std::mem::size_of;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::Lazy;

use crate::element::{element_class_for, element_class_of};
use crate::{
    el_boolean, el_boolean_from, el_buffer, el_buffer_make_writable, el_buffer_new_allocate, el_buffer_unref,
    el_caps, el_element, el_element_class, el_element_get_type, el_event, el_event_unref, el_flow_return,
    el_state_change, el_state_change_return, el_type, el_type_info, el_type_register_static,
    EL_EVENT_CAPS, EL_FALSE, EL_FLOW_ERROR, EL_FLOW_FLUSHING, EL_FLOW_NOT_NEGOTIATED, EL_FLOW_OK,
    EL_STATE_CHANGE_FAILURE, EL_STATE_CHANGE_PAUSED_TO_READY, EL_STATE_CHANGE_READY_TO_PAUSED,
    EL_STATE_CHANGE_SUCCESS, EL_TRUE,
};

pub type el_pad_direction = u32;

pub const EL_PAD_UNKNOWN: el_pad_direction = 0;
pub const EL_PAD_SRC: el_pad_direction = 1;
pub const EL_PAD_SINK: el_pad_direction = 2;

#[repr(C)]
pub struct el_base_transform_class {
    pub element_class: el_element_class,
    pub start: Option<unsafe extern "C" fn(trans: *mut el_base_transform) -> el_boolean>,
    pub stop: Option<unsafe extern "C" fn(trans: *mut el_base_transform) -> el_boolean>,
    /// Both caps are borrowed.
    pub set_caps: Option<
        unsafe extern "C" fn(trans: *mut el_base_transform, incaps: *mut el_caps, outcaps: *mut el_caps) -> el_boolean,
    >,
    pub transform_size: Option<
        unsafe extern "C" fn(
            trans: *mut el_base_transform,
            direction: el_pad_direction,
            size: usize,
            othersize: *mut usize,
        ) -> el_boolean,
    >,
    /// Both buffers are borrowed.
    pub transform: Option<
        unsafe extern "C" fn(
            trans: *mut el_base_transform,
            inbuf: *mut el_buffer,
            outbuf: *mut el_buffer,
        ) -> el_flow_return,
    >,
    /// `buffer` is borrowed and writable.
    pub transform_ip: Option<unsafe extern "C" fn(trans: *mut el_base_transform, buffer: *mut el_buffer) -> el_flow_return>,
    /// Takes ownership of `event`.
    pub sink_event: Option<unsafe extern "C" fn(trans: *mut el_base_transform, event: *mut el_event) -> el_boolean>,
}

#[repr(C)]
pub struct el_base_transform {
    pub element: el_element,
    pub started: AtomicBool,
    pub passthrough: AtomicBool,
    pub in_place: AtomicBool,
}

unsafe fn transform_class_of(trans: *const el_base_transform) -> *mut el_base_transform_class {
    element_class_of(&(*trans).element).cast()
}

unsafe fn call_or_true(
    trans: *mut el_base_transform,
    func: Option<unsafe extern "C" fn(*mut el_base_transform) -> el_boolean>,
) -> el_boolean {
    match func {
        Some(func) => func(trans),
        None => EL_TRUE,
    }
}

unsafe extern "C" fn transform_change_state(
    element: *mut el_element,
    transition: el_state_change,
) -> el_state_change_return {
    let trans = element as *mut el_base_transform;
    let klass = transform_class_of(trans);
    match transition {
        EL_STATE_CHANGE_READY_TO_PAUSED => {
            if call_or_true(trans, (*klass).start) == EL_FALSE {
                return EL_STATE_CHANGE_FAILURE;
            }
            (*trans).started.store(true, Ordering::Release);
        }
        EL_STATE_CHANGE_PAUSED_TO_READY => {
            (*trans).started.store(false, Ordering::Release);
            if call_or_true(trans, (*klass).stop) == EL_FALSE {
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

unsafe extern "C" fn transform_send_event(element: *mut el_element, event: *mut el_event) -> el_boolean {
    let trans = element as *mut el_base_transform;
    match (*transform_class_of(trans)).sink_event {
        Some(sink_event) => sink_event(trans, event),
        None => {
            el_event_unref(event);
            EL_FALSE
        }
    }
}

unsafe extern "C" fn transform_default_sink_event(trans: *mut el_base_transform, event: *mut el_event) -> el_boolean {
    let result = if (*event).event_type == EL_EVENT_CAPS {
        el_base_transform_set_caps(trans, (*event).caps, (*event).caps)
    } else {
        EL_TRUE
    };
    el_event_unref(event);
    result
}

unsafe extern "C" fn transform_class_init(klass: *mut c_void, _data: *mut c_void) {
    let klass = klass as *mut el_base_transform_class;
    (*klass).element_class.change_state = Some(transform_change_state);
    (*klass).element_class.send_event = Some(transform_send_event);
    (*klass).sink_event = Some(transform_default_sink_event);
}

static BASE_TRANSFORM_TYPE: Lazy<el_type> = Lazy::new(|| unsafe {
    let info = el_type_info {
        class_size: size_of::<el_base_transform_class>(),
        class_init: Some(transform_class_init),
        class_data: ptr::null_mut(),
        instance_size: size_of::<el_base_transform>(),
        instance_init: None,
    };
    el_type_register_static(el_element_get_type(), b"ElBaseTransform\0".as_ptr().cast(), &info)
});

pub unsafe extern "C" fn el_base_transform_get_type() -> el_type {
    *BASE_TRANSFORM_TYPE
}

/// Runs `inbuf` through the transform, taking ownership of it. On success
/// `*outbuf` holds the result, owned by the caller.
///
/// Passthrough hands the input back untouched. `transform_ip` is preferred
/// when it is the only method or in-place mode is set; otherwise an output
/// buffer sized by `transform_size` is allocated for `transform`.
pub unsafe extern "C" fn el_base_transform_chain(
    trans: *mut el_base_transform,
    inbuf: *mut el_buffer,
    outbuf: *mut *mut el_buffer,
) -> el_flow_return {
    if trans.is_null() || inbuf.is_null() || outbuf.is_null() {
        el_buffer_unref(inbuf);
        return EL_FLOW_ERROR;
    }
    *outbuf = ptr::null_mut();
    if !(*trans).started.load(Ordering::Acquire) {
        el_buffer_unref(inbuf);
        return EL_FLOW_FLUSHING;
    }
    if (*trans).passthrough.load(Ordering::Acquire) {
        *outbuf = inbuf;
        return EL_FLOW_OK;
    }

    let klass = transform_class_of(trans);
    let in_place = (*trans).in_place.load(Ordering::Acquire);
    match ((*klass).transform_ip, (*klass).transform) {
        (Some(transform_ip), transform) if transform.is_none() || in_place => {
            let buffer = el_buffer_make_writable(inbuf);
            let ret = transform_ip(trans, buffer);
            if ret == EL_FLOW_OK {
                *outbuf = buffer;
            } else {
                el_buffer_unref(buffer);
            }
            ret
        }
        (_, Some(transform)) => {
            let mut outsize = (*inbuf).size;
            if el_base_transform_transform_size(trans, EL_PAD_SINK, (*inbuf).size, &mut outsize) == EL_FALSE {
                el_buffer_unref(inbuf);
                return EL_FLOW_ERROR;
            }
            let output = el_buffer_new_allocate(outsize);
            (*output).pts = (*inbuf).pts;
            (*output).dts = (*inbuf).dts;
            (*output).duration = (*inbuf).duration;
            (*output).offset = (*inbuf).offset;
            let ret = transform(trans, inbuf, output);
            el_buffer_unref(inbuf);
            if ret == EL_FLOW_OK {
                *outbuf = output;
            } else {
                el_buffer_unref(output);
            }
            ret
        }
        _ => {
            el_buffer_unref(inbuf);
            EL_FLOW_NOT_NEGOTIATED
        }
    }
}

/// Output size for `size` input bytes; defaults to the same size.
pub unsafe extern "C" fn el_base_transform_transform_size(
    trans: *mut el_base_transform,
    direction: el_pad_direction,
    size: usize,
    othersize: *mut usize,
) -> el_boolean {
    match (*transform_class_of(trans)).transform_size {
        Some(transform_size) => transform_size(trans, direction, size, othersize),
        None => {
            *othersize = size;
            EL_TRUE
        }
    }
}

pub unsafe extern "C" fn el_base_transform_set_caps(
    trans: *mut el_base_transform,
    incaps: *mut el_caps,
    outcaps: *mut el_caps,
) -> el_boolean {
    match (*transform_class_of(trans)).set_caps {
        Some(set_caps) => set_caps(trans, incaps, outcaps),
        None => EL_TRUE,
    }
}

pub unsafe extern "C" fn el_base_transform_set_passthrough(trans: *mut el_base_transform, passthrough: el_boolean) {
    (*trans).passthrough.store(passthrough != EL_FALSE, Ordering::Release);
}

pub unsafe extern "C" fn el_base_transform_is_passthrough(trans: *const el_base_transform) -> el_boolean {
    el_boolean_from((*trans).passthrough.load(Ordering::Acquire))
}

pub unsafe extern "C" fn el_base_transform_set_in_place(trans: *mut el_base_transform, in_place: el_boolean) {
    (*trans).in_place.store(in_place != EL_FALSE, Ordering::Release);
}

pub unsafe extern "C" fn el_base_transform_is_in_place(trans: *const el_base_transform) -> el_boolean {
    el_boolean_from((*trans).in_place.load(Ordering::Acquire))
}
