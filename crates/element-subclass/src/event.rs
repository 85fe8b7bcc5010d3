use std::fmt;

use element_sys as sys;

use crate::caps::CapsRef;
use crate::clock::ClockTime;
use crate::mini::mini_object_wrapper;
use crate::value::{cstring_lossy, string_from_ptr};

mini_object_wrapper!(Event, EventRef, sys::el_event);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Eos,
    FlushStart,
    FlushStop,
    Caps,
    Segment,
    Custom,
    Unknown(u32),
}

impl EventType {
    pub fn from_raw(raw: sys::el_event_type) -> Self {
        match raw {
            sys::EL_EVENT_EOS => EventType::Eos,
            sys::EL_EVENT_FLUSH_START => EventType::FlushStart,
            sys::EL_EVENT_FLUSH_STOP => EventType::FlushStop,
            sys::EL_EVENT_CAPS => EventType::Caps,
            sys::EL_EVENT_SEGMENT => EventType::Segment,
            sys::EL_EVENT_CUSTOM => EventType::Custom,
            other => EventType::Unknown(other),
        }
    }

    pub fn into_raw(self) -> sys::el_event_type {
        match self {
            EventType::Eos => sys::EL_EVENT_EOS,
            EventType::FlushStart => sys::EL_EVENT_FLUSH_START,
            EventType::FlushStop => sys::EL_EVENT_FLUSH_STOP,
            EventType::Caps => sys::EL_EVENT_CAPS,
            EventType::Segment => sys::EL_EVENT_SEGMENT,
            EventType::Custom => sys::EL_EVENT_CUSTOM,
            EventType::Unknown(other) => other,
        }
    }
}

impl Event {
    pub fn eos() -> Self {
        Self::from_new(unsafe { sys::el_event_new_eos() })
    }

    pub fn flush_start() -> Self {
        Self::from_new(unsafe { sys::el_event_new_flush_start() })
    }

    pub fn flush_stop() -> Self {
        Self::from_new(unsafe { sys::el_event_new_flush_stop() })
    }

    /// The event keeps its own reference to `caps`.
    pub fn caps(caps: &CapsRef) -> Self {
        Self::from_new(unsafe { sys::el_event_new_caps(caps.as_ptr() as *mut sys::el_caps) })
    }

    pub fn segment(position: ClockTime) -> Self {
        Self::from_new(unsafe { sys::el_event_new_segment(position.nseconds()) })
    }

    pub fn custom(name: &str) -> Self {
        let name = cstring_lossy(name, "custom event name");
        Self::from_new(unsafe { sys::el_event_new_custom(name.as_ptr()) })
    }
}

impl EventRef {
    pub fn event_type(&self) -> EventType {
        EventType::from_raw(self.0.event_type)
    }

    pub fn seqnum(&self) -> u32 {
        self.0.seqnum
    }

    pub fn caps(&self) -> Option<&CapsRef> {
        (!self.0.caps.is_null()).then(|| unsafe { CapsRef::from_ptr(self.0.caps) })
    }

    pub fn position(&self) -> Option<ClockTime> {
        ClockTime::from_raw(self.0.position)
    }

    pub fn name(&self) -> Option<String> {
        unsafe { string_from_ptr(self.0.name, "custom event name") }
    }
}

impl fmt::Debug for EventRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("type", &self.event_type())
            .field("seqnum", &self.seqnum())
            .field("caps", &self.caps())
            .field("position", &self.position())
            .finish()
    }
}
