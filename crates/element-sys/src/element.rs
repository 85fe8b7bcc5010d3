use std::ffi::{c_char, c_void, CStr};
use std::mem::size_of;
use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering};

use once_cell::sync::Lazy;

use crate::types::{ancestry, find_metadata, type_of_class, with_node, with_node_mut};
use crate::{
    el_boolean, el_caps, el_caps_ref, el_caps_unref, el_event, el_event_unref, el_free_string, el_mutex,
    el_mutex_init, el_mutex_lock, el_mutex_unlock, el_object, el_object_class, el_object_get_type, el_object_new,
    el_pad_direction, el_query, el_strdup, el_type, el_type_class_peek, el_type_from_name, el_type_info,
    el_type_is_a, el_type_register_static, EL_FALSE, EL_TYPE_INVALID,
};

pub type el_state = u32;

pub const EL_STATE_VOID_PENDING: el_state = 0;
pub const EL_STATE_NULL: el_state = 1;
pub const EL_STATE_READY: el_state = 2;
pub const EL_STATE_PAUSED: el_state = 3;
pub const EL_STATE_PLAYING: el_state = 4;

/// `(current << 3) | next`.
pub type el_state_change = u32;

pub const fn el_state_transition(current: el_state, next: el_state) -> el_state_change {
    (current << 3) | next
}

pub const fn el_state_transition_current(transition: el_state_change) -> el_state {
    transition >> 3
}

pub const fn el_state_transition_next(transition: el_state_change) -> el_state {
    transition & 0x7
}

pub const EL_STATE_CHANGE_NULL_TO_READY: el_state_change = el_state_transition(EL_STATE_NULL, EL_STATE_READY);
pub const EL_STATE_CHANGE_READY_TO_PAUSED: el_state_change = el_state_transition(EL_STATE_READY, EL_STATE_PAUSED);
pub const EL_STATE_CHANGE_PAUSED_TO_PLAYING: el_state_change =
    el_state_transition(EL_STATE_PAUSED, EL_STATE_PLAYING);
pub const EL_STATE_CHANGE_PLAYING_TO_PAUSED: el_state_change =
    el_state_transition(EL_STATE_PLAYING, EL_STATE_PAUSED);
pub const EL_STATE_CHANGE_PAUSED_TO_READY: el_state_change = el_state_transition(EL_STATE_PAUSED, EL_STATE_READY);
pub const EL_STATE_CHANGE_READY_TO_NULL: el_state_change = el_state_transition(EL_STATE_READY, EL_STATE_NULL);

pub type el_state_change_return = u32;

pub const EL_STATE_CHANGE_FAILURE: el_state_change_return = 0;
pub const EL_STATE_CHANGE_SUCCESS: el_state_change_return = 1;
pub const EL_STATE_CHANGE_ASYNC: el_state_change_return = 2;
pub const EL_STATE_CHANGE_NO_PREROLL: el_state_change_return = 3;

#[repr(C)]
pub struct el_element_class {
    pub object_class: el_object_class,
    pub change_state:
        Option<unsafe extern "C" fn(element: *mut el_element, transition: el_state_change) -> el_state_change_return>,
    /// Takes ownership of `event`.
    pub send_event: Option<unsafe extern "C" fn(element: *mut el_element, event: *mut el_event) -> el_boolean>,
    pub query: Option<unsafe extern "C" fn(element: *mut el_element, query: *mut el_query) -> el_boolean>,
}

#[repr(C)]
pub struct el_element {
    pub object: el_object,
    pub state_lock: el_mutex,
    pub current_state: AtomicU32,
    pub pending_state: AtomicU32,
}

pub const EL_METADATA_LONG_NAME: &[u8] = b"long-name\0";
pub const EL_METADATA_KLASS: &[u8] = b"klass\0";
pub const EL_METADATA_DESCRIPTION: &[u8] = b"description\0";
pub const EL_METADATA_AUTHOR: &[u8] = b"author\0";

unsafe extern "C" fn element_change_state(
    _element: *mut el_element,
    _transition: el_state_change,
) -> el_state_change_return {
    EL_STATE_CHANGE_SUCCESS
}

unsafe extern "C" fn element_send_event(_element: *mut el_element, event: *mut el_event) -> el_boolean {
    el_event_unref(event);
    EL_FALSE
}

unsafe extern "C" fn element_query(_element: *mut el_element, _query: *mut el_query) -> el_boolean {
    EL_FALSE
}

unsafe extern "C" fn element_class_init(klass: *mut c_void, _data: *mut c_void) {
    let klass = klass as *mut el_element_class;
    (*klass).change_state = Some(element_change_state);
    (*klass).send_event = Some(element_send_event);
    (*klass).query = Some(element_query);
}

unsafe extern "C" fn element_instance_init(instance: *mut el_object, _klass: *mut c_void) {
    let element = instance as *mut el_element;
    el_mutex_init(ptr::addr_of_mut!((*element).state_lock));
    (*element).current_state.store(EL_STATE_NULL, Ordering::Relaxed);
    (*element).pending_state.store(EL_STATE_VOID_PENDING, Ordering::Relaxed);
}

static ELEMENT_TYPE: Lazy<el_type> = Lazy::new(|| unsafe {
    let info = el_type_info {
        class_size: size_of::<el_element_class>(),
        class_init: Some(element_class_init),
        class_data: ptr::null_mut(),
        instance_size: size_of::<el_element>(),
        instance_init: Some(element_instance_init),
    };
    el_type_register_static(el_object_get_type(), b"ElElement\0".as_ptr().cast(), &info)
});

pub unsafe extern "C" fn el_element_get_type() -> el_type {
    *ELEMENT_TYPE
}

pub(crate) unsafe fn element_class_of(element: *const el_element) -> *mut el_element_class {
    (*element).object.klass.cast()
}

/// Class table of `ty` viewed as an element class.
pub(crate) unsafe fn element_class_for(ty: el_type) -> *mut el_element_class {
    el_type_class_peek(ty).cast()
}

/// Walks the element one state at a time towards `state`, calling
/// `change_state` for each step under the state lock. Stops at the first
/// failing step and leaves the element in the last reached state.
pub unsafe extern "C" fn el_element_set_state(element: *mut el_element, state: el_state) -> el_state_change_return {
    if element.is_null() || !(EL_STATE_NULL..=EL_STATE_PLAYING).contains(&state) {
        return EL_STATE_CHANGE_FAILURE;
    }
    el_mutex_lock(ptr::addr_of_mut!((*element).state_lock));
    let klass = element_class_of(element);
    let mut result = EL_STATE_CHANGE_SUCCESS;
    let mut current = (*element).current_state.load(Ordering::Acquire);
    while current != state {
        let next = if state > current { current + 1 } else { current - 1 };
        (*element).pending_state.store(next, Ordering::Release);
        result = match (*klass).change_state {
            Some(change_state) => change_state(element, el_state_transition(current, next)),
            None => EL_STATE_CHANGE_SUCCESS,
        };
        if result == EL_STATE_CHANGE_FAILURE {
            log::debug!(target: "element_sys", "state change {current} -> {next} failed");
            break;
        }
        current = next;
        (*element).current_state.store(current, Ordering::Release);
    }
    (*element).pending_state.store(EL_STATE_VOID_PENDING, Ordering::Release);
    el_mutex_unlock(ptr::addr_of_mut!((*element).state_lock));
    result
}

pub unsafe extern "C" fn el_element_get_state(element: *const el_element) -> el_state {
    (*element).current_state.load(Ordering::Acquire)
}

/// Takes ownership of `event`.
pub unsafe extern "C" fn el_element_send_event(element: *mut el_element, event: *mut el_event) -> el_boolean {
    if element.is_null() || event.is_null() {
        el_event_unref(event);
        return EL_FALSE;
    }
    match (*element_class_of(element)).send_event {
        Some(send_event) => send_event(element, event),
        None => {
            el_event_unref(event);
            EL_FALSE
        }
    }
}

pub unsafe extern "C" fn el_element_query(element: *mut el_element, query: *mut el_query) -> el_boolean {
    if element.is_null() || query.is_null() {
        return EL_FALSE;
    }
    match (*element_class_of(element)).query {
        Some(query_func) => query_func(element, query),
        None => EL_FALSE,
    }
}

unsafe fn set_metadata_entry(ty: el_type, key: &[u8], value: *const c_char) {
    if value.is_null() {
        return;
    }
    let Ok(key) = CStr::from_bytes_with_nul(key) else {
        return;
    };
    let key = key.to_owned();
    let value = CStr::from_ptr(value).to_owned();
    with_node_mut(ty, |node| {
        node.metadata.retain(|(existing, _)| *existing != key);
        node.metadata.push((key, value));
    });
}

/// Stores one metadata entry of an element class, replacing an earlier value.
pub unsafe extern "C" fn el_element_class_add_metadata(
    klass: *mut el_element_class,
    key: *const c_char,
    value: *const c_char,
) {
    if klass.is_null() || key.is_null() {
        return;
    }
    set_metadata_entry(type_of_class(klass as *const c_void), CStr::from_ptr(key).to_bytes_with_nul(), value);
}

/// Stores the descriptive metadata of an element class.
pub unsafe extern "C" fn el_element_class_set_metadata(
    klass: *mut el_element_class,
    long_name: *const c_char,
    classification: *const c_char,
    description: *const c_char,
    author: *const c_char,
) {
    let ty = type_of_class(klass as *const c_void);
    set_metadata_entry(ty, EL_METADATA_LONG_NAME, long_name);
    set_metadata_entry(ty, EL_METADATA_KLASS, classification);
    set_metadata_entry(ty, EL_METADATA_DESCRIPTION, description);
    set_metadata_entry(ty, EL_METADATA_AUTHOR, author);
}

/// Metadata value for `key`, inherited from ancestors when unset.
pub unsafe extern "C" fn el_element_class_get_metadata(
    klass: *const el_element_class,
    key: *const c_char,
) -> *const c_char {
    if klass.is_null() || key.is_null() {
        return ptr::null();
    }
    find_metadata(type_of_class(klass as *const c_void), CStr::from_ptr(key))
}

/// Instantiates the element type registered as `type_name`.
pub unsafe extern "C" fn el_element_factory_make(type_name: *const c_char, name: *const c_char) -> *mut el_element {
    let ty = el_type_from_name(type_name);
    if ty == EL_TYPE_INVALID || el_type_is_a(ty, el_element_get_type()) == EL_FALSE {
        return ptr::null_mut();
    }
    el_object_new(ty, name).cast()
}

pub type el_pad_presence = u32;

pub const EL_PAD_ALWAYS: el_pad_presence = 0;
pub const EL_PAD_SOMETIMES: el_pad_presence = 1;
pub const EL_PAD_REQUEST: el_pad_presence = 2;

/// Describes pads an element class can create.
#[repr(C)]
pub struct el_pad_template {
    pub name_template: *mut c_char,
    pub direction: el_pad_direction,
    pub presence: el_pad_presence,
    pub caps: *mut el_caps,
}

/// Copies `name_template` and takes a reference on `caps`.
pub unsafe extern "C" fn el_pad_template_new(
    name_template: *const c_char,
    direction: el_pad_direction,
    presence: el_pad_presence,
    caps: *mut el_caps,
) -> *mut el_pad_template {
    if name_template.is_null() || caps.is_null() {
        return ptr::null_mut();
    }
    Box::into_raw(Box::new(el_pad_template {
        name_template: el_strdup(name_template),
        direction,
        presence,
        caps: el_caps_ref(caps),
    }))
}

pub unsafe extern "C" fn el_pad_template_free(templ: *mut el_pad_template) {
    if templ.is_null() {
        return;
    }
    let templ = Box::from_raw(templ);
    el_free_string(templ.name_template);
    el_caps_unref(templ.caps);
}

/// Adds `templ` to the class, taking ownership of it. A template with the
/// same name added earlier to the same class is replaced.
pub unsafe extern "C" fn el_element_class_add_pad_template(klass: *mut el_element_class, templ: *mut el_pad_template) {
    if klass.is_null() || templ.is_null() {
        el_pad_template_free(templ);
        return;
    }
    let name = CStr::from_ptr((*templ).name_template);
    let replaced = with_node_mut(type_of_class(klass as *const c_void), |node| {
        let existing = node
            .pad_templates
            .iter()
            .position(|&other| CStr::from_ptr((*other).name_template) == name);
        match existing {
            Some(index) => Some(std::mem::replace(&mut node.pad_templates[index], templ)),
            None => {
                node.pad_templates.push(templ);
                None
            }
        }
    });
    match replaced {
        Some(Some(old)) => el_pad_template_free(old),
        Some(None) => {}
        None => el_pad_template_free(templ),
    }
}

/// Templates of the class and its ancestors, closest first. A name defined
/// by a subclass hides the ancestors' template of that name.
unsafe fn class_pad_templates(klass: *const el_element_class) -> Vec<*mut el_pad_template> {
    let mut templates: Vec<*mut el_pad_template> = Vec::new();
    for ty in ancestry(type_of_class(klass as *const c_void)) {
        let own = with_node(ty, |node| node.pad_templates.clone()).unwrap_or_default();
        for templ in own {
            let name = CStr::from_ptr((*templ).name_template);
            if !templates.iter().any(|&seen| CStr::from_ptr((*seen).name_template) == name) {
                templates.push(templ);
            }
        }
    }
    templates
}

/// Borrowed template named `name`, or null.
pub unsafe extern "C" fn el_element_class_get_pad_template(
    klass: *const el_element_class,
    name: *const c_char,
) -> *const el_pad_template {
    if klass.is_null() || name.is_null() {
        return ptr::null();
    }
    let name = CStr::from_ptr(name);
    class_pad_templates(klass)
        .into_iter()
        .find(|&templ| CStr::from_ptr((*templ).name_template) == name)
        .map_or(ptr::null(), |templ| templ as *const el_pad_template)
}

pub unsafe extern "C" fn el_element_class_get_n_pad_templates(klass: *const el_element_class) -> usize {
    if klass.is_null() {
        return 0;
    }
    class_pad_templates(klass).len()
}

/// Borrowed template at `index` in [`el_element_class_get_pad_template`]
/// lookup order, or null.
pub unsafe extern "C" fn el_element_class_get_pad_template_nth(
    klass: *const el_element_class,
    index: usize,
) -> *const el_pad_template {
    if klass.is_null() {
        return ptr::null();
    }
    class_pad_templates(klass)
        .get(index)
        .map_or(ptr::null(), |&templ| templ as *const el_pad_template)
}
