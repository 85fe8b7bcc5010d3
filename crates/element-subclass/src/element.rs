use std::ffi::{c_void, CString};

use element_sys as sys;
use thiserror::Error;

use crate::capability::{patch_slots, Overrides};
use crate::event::Event;
use crate::object::Object;
use crate::query::QueryRef;
use crate::subclass::{parent_class, Extendable, ObjectSubclass};
use crate::trampoline::guard;
use crate::types::{IsA, ObjectType, Type};
use crate::value::{cstring_lossy, string_from_ptr};

crate::object_wrapper!(
    pub struct Element(sys::el_element) @type sys::el_element_get_type(),
    @extends Object
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum State {
    VoidPending,
    Null,
    Ready,
    Paused,
    Playing,
}

impl State {
    pub fn from_raw(raw: sys::el_state) -> Option<Self> {
        match raw {
            sys::EL_STATE_VOID_PENDING => Some(State::VoidPending),
            sys::EL_STATE_NULL => Some(State::Null),
            sys::EL_STATE_READY => Some(State::Ready),
            sys::EL_STATE_PAUSED => Some(State::Paused),
            sys::EL_STATE_PLAYING => Some(State::Playing),
            _ => None,
        }
    }

    pub fn into_raw(self) -> sys::el_state {
        match self {
            State::VoidPending => sys::EL_STATE_VOID_PENDING,
            State::Null => sys::EL_STATE_NULL,
            State::Ready => sys::EL_STATE_READY,
            State::Paused => sys::EL_STATE_PAUSED,
            State::Playing => sys::EL_STATE_PLAYING,
        }
    }
}

/// One step of a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateChange {
    pub current: State,
    pub next: State,
}

impl StateChange {
    pub const NULL_TO_READY: StateChange = StateChange::new(State::Null, State::Ready);
    pub const READY_TO_PAUSED: StateChange = StateChange::new(State::Ready, State::Paused);
    pub const PAUSED_TO_PLAYING: StateChange = StateChange::new(State::Paused, State::Playing);
    pub const PLAYING_TO_PAUSED: StateChange = StateChange::new(State::Playing, State::Paused);
    pub const PAUSED_TO_READY: StateChange = StateChange::new(State::Paused, State::Ready);
    pub const READY_TO_NULL: StateChange = StateChange::new(State::Ready, State::Null);

    pub const fn new(current: State, next: State) -> Self {
        Self { current, next }
    }

    pub fn from_raw(raw: sys::el_state_change) -> Option<Self> {
        Some(Self {
            current: State::from_raw(sys::el_state_transition_current(raw))?,
            next: State::from_raw(sys::el_state_transition_next(raw))?,
        })
    }

    pub fn into_raw(self) -> sys::el_state_change {
        sys::el_state_transition(self.current.into_raw(), self.next.into_raw())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateChangeSuccess {
    Success,
    Async,
    NoPreroll,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
#[error("state change failed")]
pub struct StateChangeError;

pub fn state_change_from_raw(raw: sys::el_state_change_return) -> Result<StateChangeSuccess, StateChangeError> {
    match raw {
        sys::EL_STATE_CHANGE_SUCCESS => Ok(StateChangeSuccess::Success),
        sys::EL_STATE_CHANGE_ASYNC => Ok(StateChangeSuccess::Async),
        sys::EL_STATE_CHANGE_NO_PREROLL => Ok(StateChangeSuccess::NoPreroll),
        _ => Err(StateChangeError),
    }
}

pub fn state_change_into_raw(result: Result<StateChangeSuccess, StateChangeError>) -> sys::el_state_change_return {
    match result {
        Ok(StateChangeSuccess::Success) => sys::EL_STATE_CHANGE_SUCCESS,
        Ok(StateChangeSuccess::Async) => sys::EL_STATE_CHANGE_ASYNC,
        Ok(StateChangeSuccess::NoPreroll) => sys::EL_STATE_CHANGE_NO_PREROLL,
        Err(StateChangeError) => sys::EL_STATE_CHANGE_FAILURE,
    }
}

pub trait ChangeState: ObjectSubclass
where
    <Self as ObjectSubclass>::ParentType: IsA<Element>,
{
    fn change_state(&self, element: &Element, transition: StateChange) -> Result<StateChangeSuccess, StateChangeError>;
}

pub trait SendEvent: ObjectSubclass
where
    <Self as ObjectSubclass>::ParentType: IsA<Element>,
{
    fn send_event(&self, element: &Element, event: Event) -> bool;
}

pub trait ElementQuery: ObjectSubclass
where
    <Self as ObjectSubclass>::ParentType: IsA<Element>,
{
    fn query(&self, element: &Element, query: &mut QueryRef) -> bool;
}

pub(crate) unsafe extern "C" fn change_state<T: ChangeState>(
    element: *mut sys::el_element,
    transition: sys::el_state_change,
) -> sys::el_state_change_return
where
    T::ParentType: IsA<Element>,
{
    let Some(transition) = StateChange::from_raw(transition) else {
        return sys::EL_STATE_CHANGE_FAILURE;
    };
    let wrapper = Element::from_raw_borrow(element);
    let result = guard::<T, _>(element.cast(), "change_state", Err(StateChangeError), |imp| {
        ChangeState::change_state(imp, &wrapper, transition)
    });
    state_change_into_raw(result)
}

pub(crate) unsafe extern "C" fn send_event<T: SendEvent>(
    element: *mut sys::el_element,
    event: *mut sys::el_event,
) -> sys::el_boolean
where
    T::ParentType: IsA<Element>,
{
    let Some(event) = Event::from_raw_full(event) else {
        return sys::EL_FALSE;
    };
    let wrapper = Element::from_raw_borrow(element);
    let handled = guard::<T, _>(element.cast(), "send_event", false, |imp| {
        SendEvent::send_event(imp, &wrapper, event)
    });
    sys::el_boolean_from(handled)
}

pub(crate) unsafe extern "C" fn query<T: ElementQuery>(
    element: *mut sys::el_element,
    query: *mut sys::el_query,
) -> sys::el_boolean
where
    T::ParentType: IsA<Element>,
{
    if query.is_null() {
        return sys::EL_FALSE;
    }
    let wrapper = Element::from_raw_borrow(element);
    let query = QueryRef::from_mut_ptr(query);
    let answered = guard::<T, _>(element.cast(), "query", false, |imp| ElementQuery::query(imp, &wrapper, query));
    sys::el_boolean_from(answered)
}

/// Calls into the parent class's element slots.
pub trait ElementParent: ObjectSubclass
where
    <Self as ObjectSubclass>::ParentType: IsA<Element>,
{
    fn parent_change_state(
        &self,
        element: &Element,
        transition: StateChange,
    ) -> Result<StateChangeSuccess, StateChangeError> {
        unsafe {
            let parent = parent_class::<Self, sys::el_element_class>();
            match (*parent).change_state {
                Some(change_state) => state_change_from_raw(change_state(element.as_ptr(), transition.into_raw())),
                None => Ok(StateChangeSuccess::Success),
            }
        }
    }

    fn parent_send_event(&self, element: &Element, event: Event) -> bool {
        unsafe {
            let parent = parent_class::<Self, sys::el_element_class>();
            match (*parent).send_event {
                Some(send_event) => send_event(element.as_ptr(), event.into_raw()) != sys::EL_FALSE,
                None => false,
            }
        }
    }

    fn parent_element_query(&self, element: &Element, query: &mut QueryRef) -> bool {
        unsafe {
            let parent = parent_class::<Self, sys::el_element_class>();
            match (*parent).query {
                Some(parent_query) => parent_query(element.as_ptr(), query.as_mut_ptr()) != sys::EL_FALSE,
                None => false,
            }
        }
    }
}

impl<T: ObjectSubclass> ElementParent for T where T::ParentType: IsA<Element> {}

unsafe impl Extendable for Element {
    type Class = sys::el_element_class;

    fn parent_type() -> Option<Type> {
        Some(Object::static_type())
    }

    unsafe fn install(klass: *mut c_void, overrides: &Overrides) {
        Object::install(klass, overrides);
        let klass = klass as *mut sys::el_element_class;
        patch_slots!((*klass), overrides.element; change_state, send_event, query);
    }
}

pub trait ElementExt: IsA<Element> {
    fn set_state(&self, state: State) -> Result<StateChangeSuccess, StateChangeError> {
        state_change_from_raw(unsafe { sys::el_element_set_state(self.as_ptr().cast(), state.into_raw()) })
    }

    fn current_state(&self) -> State {
        let raw = unsafe { sys::el_element_get_state(self.as_ptr().cast()) };
        State::from_raw(raw).unwrap_or(State::VoidPending)
    }

    fn send_event(&self, event: Event) -> bool {
        unsafe { sys::el_element_send_event(self.as_ptr().cast(), event.into_raw()) != sys::EL_FALSE }
    }

    fn query(&self, query: &mut QueryRef) -> bool {
        unsafe { sys::el_element_query(self.as_ptr().cast(), query.as_mut_ptr()) != sys::EL_FALSE }
    }

    /// Metadata of the element's class, see [`element_metadata`].
    fn metadata(&self, key: &str) -> Option<String> {
        let type_ = Type(unsafe { sys::el_object_type(self.as_object_ptr()) });
        element_metadata(type_, key)
    }
}

impl<O: IsA<Element>> ElementExt for O {}

/// Metadata entry `key` of an element type, inherited from ancestors.
/// Keys are `long-name`, `klass`, `description` and `author`.
pub fn element_metadata(type_: Type, key: &str) -> Option<String> {
    let element = unsafe { sys::el_element_get_type() };
    if !type_.is_a(Type(element)) {
        return None;
    }
    let key = CString::new(key).ok()?;
    unsafe {
        let klass = sys::el_type_class_peek(type_.into_raw()) as *const sys::el_element_class;
        string_from_ptr(sys::el_element_class_get_metadata(klass, key.as_ptr()), "element metadata")
    }
}

/// Instantiates the element type registered under `type_name`.
pub fn element_factory_make(type_name: &str, name: Option<&str>) -> Option<Element> {
    let type_name = cstring_lossy(type_name, "element type name");
    let name = name.map(|name| cstring_lossy(name, "element name"));
    let name_ptr = name.as_ref().map_or(std::ptr::null(), |name| name.as_ptr());
    unsafe { Element::from_raw_full(sys::el_element_factory_make(type_name.as_ptr(), name_ptr)) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const STATES: [State; 5] = [State::VoidPending, State::Null, State::Ready, State::Paused, State::Playing];

    fn any_state() -> impl Strategy<Value = State> {
        prop::sample::select(STATES.to_vec())
    }

    proptest! {
        #[test]
        fn every_transition_survives_the_raw_form(current in any_state(), next in any_state()) {
            let transition = StateChange::new(current, next);
            prop_assert_eq!(StateChange::from_raw(transition.into_raw()), Some(transition));
        }

        #[test]
        fn decoded_raw_transitions_encode_back(raw in 0u32..4096) {
            if let Some(transition) = StateChange::from_raw(raw) {
                prop_assert_eq!(transition.into_raw(), raw);
            }
        }

        #[test]
        fn state_change_returns_survive_the_host_form(raw in 0u32..8) {
            let result = state_change_from_raw(raw);
            let known = raw <= sys::EL_STATE_CHANGE_NO_PREROLL;
            prop_assert_eq!(state_change_into_raw(result) == raw, known);
        }
    }

    #[test]
    fn every_state_survives_the_raw_form() {
        for state in STATES {
            assert_eq!(State::from_raw(state.into_raw()), Some(state));
        }
    }

    #[test]
    fn state_change_raw_round_trip() {
        let raw = StateChange::READY_TO_PAUSED.into_raw();
        assert_eq!(raw, sys::EL_STATE_CHANGE_READY_TO_PAUSED);
        assert_eq!(StateChange::from_raw(raw), Some(StateChange::READY_TO_PAUSED));
        assert_eq!(StateChange::from_raw(sys::el_state_transition(7, 1)), None);
    }

    #[test]
    fn state_change_return_mapping() {
        assert_eq!(state_change_from_raw(sys::EL_STATE_CHANGE_ASYNC), Ok(StateChangeSuccess::Async));
        assert_eq!(state_change_from_raw(sys::EL_STATE_CHANGE_FAILURE), Err(StateChangeError));
        assert_eq!(state_change_into_raw(Err(StateChangeError)), sys::EL_STATE_CHANGE_FAILURE);
    }
}
