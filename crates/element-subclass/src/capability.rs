//! Capability detection.
//!
//! Each optional virtual method of a base class is a single-method trait.
//! [`overrides!`](crate::overrides!) probes a concrete host type for every
//! one of them and collects a trampoline for each trait it implements; slots
//! whose trait is not implemented stay `None` and keep the parent's pointer.

use std::fmt;

use element_sys as sys;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    SetProperty,
    GetProperty,
    Constructed,
    ChangeState,
    SendEvent,
    ElementQuery,
    SinkStart,
    SinkStop,
    SinkSetCaps,
    SinkEvent,
    SinkQuery,
    SinkPreroll,
    SinkRender,
    SinkUnlock,
    SinkUnlockStop,
    SrcStart,
    SrcStop,
    SrcGetSize,
    SrcIsSeekable,
    SrcCreate,
    SrcAlloc,
    SrcFill,
    SrcDoSeek,
    SrcEvent,
    SrcQuery,
    SrcUnlock,
    SrcUnlockStop,
    TransformStart,
    TransformStop,
    TransformSetCaps,
    TransformSize,
    Transform,
    TransformIp,
    TransformSinkEvent,
    PushSrcCreate,
    PushSrcAlloc,
    PushSrcFill,
}

impl Capability {
    pub const ALL: [Capability; 37] = [
        Capability::SetProperty,
        Capability::GetProperty,
        Capability::Constructed,
        Capability::ChangeState,
        Capability::SendEvent,
        Capability::ElementQuery,
        Capability::SinkStart,
        Capability::SinkStop,
        Capability::SinkSetCaps,
        Capability::SinkEvent,
        Capability::SinkQuery,
        Capability::SinkPreroll,
        Capability::SinkRender,
        Capability::SinkUnlock,
        Capability::SinkUnlockStop,
        Capability::SrcStart,
        Capability::SrcStop,
        Capability::SrcGetSize,
        Capability::SrcIsSeekable,
        Capability::SrcCreate,
        Capability::SrcAlloc,
        Capability::SrcFill,
        Capability::SrcDoSeek,
        Capability::SrcEvent,
        Capability::SrcQuery,
        Capability::SrcUnlock,
        Capability::SrcUnlockStop,
        Capability::TransformStart,
        Capability::TransformStop,
        Capability::TransformSetCaps,
        Capability::TransformSize,
        Capability::Transform,
        Capability::TransformIp,
        Capability::TransformSinkEvent,
        Capability::PushSrcCreate,
        Capability::PushSrcAlloc,
        Capability::PushSrcFill,
    ];

    fn bit(self) -> u64 {
        1 << self as u32
    }
}

/// Set of detected capabilities.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CapabilitySet(u64);

impl CapabilitySet {
    pub const EMPTY: CapabilitySet = CapabilitySet(0);

    pub fn insert(&mut self, capability: Capability) {
        self.0 |= capability.bit();
    }

    pub fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |capability| self.contains(*capability))
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut set = CapabilitySet::EMPTY;
        for capability in iter {
            set.insert(capability);
        }
        set
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Function pointer types of the patchable class slots.
pub mod slot {
    use super::sys;

    pub type SetPropertyFn = sys::el_set_property_func;
    pub type GetPropertyFn = sys::el_get_property_func;
    pub type ConstructedFn = unsafe extern "C" fn(*mut sys::el_object);

    pub type ChangeStateFn =
        unsafe extern "C" fn(*mut sys::el_element, sys::el_state_change) -> sys::el_state_change_return;
    pub type SendEventFn = unsafe extern "C" fn(*mut sys::el_element, *mut sys::el_event) -> sys::el_boolean;
    pub type ElementQueryFn = unsafe extern "C" fn(*mut sys::el_element, *mut sys::el_query) -> sys::el_boolean;

    pub type SinkBoolFn = unsafe extern "C" fn(*mut sys::el_base_sink) -> sys::el_boolean;
    pub type SinkCapsFn = unsafe extern "C" fn(*mut sys::el_base_sink, *mut sys::el_caps) -> sys::el_boolean;
    pub type SinkEventFn = unsafe extern "C" fn(*mut sys::el_base_sink, *mut sys::el_event) -> sys::el_boolean;
    pub type SinkQueryFn = unsafe extern "C" fn(*mut sys::el_base_sink, *mut sys::el_query) -> sys::el_boolean;
    pub type SinkBufferFn = unsafe extern "C" fn(*mut sys::el_base_sink, *mut sys::el_buffer) -> sys::el_flow_return;

    pub type SrcBoolFn = unsafe extern "C" fn(*mut sys::el_base_src) -> sys::el_boolean;
    pub type SrcGetSizeFn = unsafe extern "C" fn(*mut sys::el_base_src, *mut u64) -> sys::el_boolean;
    pub type SrcCreateFn = sys::el_base_src_create_func;
    pub type SrcFillFn = unsafe extern "C" fn(*mut sys::el_base_src, u64, u32, *mut sys::el_buffer) -> sys::el_flow_return;
    pub type SrcDoSeekFn = unsafe extern "C" fn(*mut sys::el_base_src, u64) -> sys::el_boolean;
    pub type SrcEventFn = unsafe extern "C" fn(*mut sys::el_base_src, *mut sys::el_event) -> sys::el_boolean;
    pub type SrcQueryFn = unsafe extern "C" fn(*mut sys::el_base_src, *mut sys::el_query) -> sys::el_boolean;

    pub type TransformBoolFn = unsafe extern "C" fn(*mut sys::el_base_transform) -> sys::el_boolean;
    pub type TransformCapsFn =
        unsafe extern "C" fn(*mut sys::el_base_transform, *mut sys::el_caps, *mut sys::el_caps) -> sys::el_boolean;
    pub type TransformSizeFn =
        unsafe extern "C" fn(*mut sys::el_base_transform, sys::el_pad_direction, usize, *mut usize) -> sys::el_boolean;
    pub type TransformFn =
        unsafe extern "C" fn(*mut sys::el_base_transform, *mut sys::el_buffer, *mut sys::el_buffer) -> sys::el_flow_return;
    pub type TransformIpFn = unsafe extern "C" fn(*mut sys::el_base_transform, *mut sys::el_buffer) -> sys::el_flow_return;
    pub type TransformEventFn =
        unsafe extern "C" fn(*mut sys::el_base_transform, *mut sys::el_event) -> sys::el_boolean;

    pub type PushSrcCreateFn = sys::el_push_src_create_func;
    pub type PushSrcFillFn = unsafe extern "C" fn(*mut sys::el_push_src, *mut sys::el_buffer) -> sys::el_flow_return;
}

macro_rules! level_overrides {
    ($(#[$attr:meta])* $name:ident { $($field:ident: $slot:ty => $capability:ident,)* }) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Default)]
        pub struct $name {
            $(pub $field: Option<$slot>,)*
        }

        impl $name {
            fn collect(&self, set: &mut CapabilitySet) {
                $(if self.$field.is_some() {
                    set.insert(Capability::$capability);
                })*
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let mut list = f.debug_list();
                $(if self.$field.is_some() {
                    list.entry(&stringify!($field));
                })*
                list.finish()
            }
        }
    };
}

level_overrides!(ObjectOverrides {
    set_property: slot::SetPropertyFn => SetProperty,
    get_property: slot::GetPropertyFn => GetProperty,
    constructed: slot::ConstructedFn => Constructed,
});

level_overrides!(ElementOverrides {
    change_state: slot::ChangeStateFn => ChangeState,
    send_event: slot::SendEventFn => SendEvent,
    query: slot::ElementQueryFn => ElementQuery,
});

level_overrides!(BaseSinkOverrides {
    start: slot::SinkBoolFn => SinkStart,
    stop: slot::SinkBoolFn => SinkStop,
    set_caps: slot::SinkCapsFn => SinkSetCaps,
    event: slot::SinkEventFn => SinkEvent,
    query: slot::SinkQueryFn => SinkQuery,
    preroll: slot::SinkBufferFn => SinkPreroll,
    render: slot::SinkBufferFn => SinkRender,
    unlock: slot::SinkBoolFn => SinkUnlock,
    unlock_stop: slot::SinkBoolFn => SinkUnlockStop,
});

level_overrides!(BaseSrcOverrides {
    start: slot::SrcBoolFn => SrcStart,
    stop: slot::SrcBoolFn => SrcStop,
    get_size: slot::SrcGetSizeFn => SrcGetSize,
    is_seekable: slot::SrcBoolFn => SrcIsSeekable,
    create: slot::SrcCreateFn => SrcCreate,
    alloc: slot::SrcCreateFn => SrcAlloc,
    fill: slot::SrcFillFn => SrcFill,
    do_seek: slot::SrcDoSeekFn => SrcDoSeek,
    event: slot::SrcEventFn => SrcEvent,
    query: slot::SrcQueryFn => SrcQuery,
    unlock: slot::SrcBoolFn => SrcUnlock,
    unlock_stop: slot::SrcBoolFn => SrcUnlockStop,
});

level_overrides!(BaseTransformOverrides {
    start: slot::TransformBoolFn => TransformStart,
    stop: slot::TransformBoolFn => TransformStop,
    set_caps: slot::TransformCapsFn => TransformSetCaps,
    transform_size: slot::TransformSizeFn => TransformSize,
    transform: slot::TransformFn => Transform,
    transform_ip: slot::TransformIpFn => TransformIp,
    sink_event: slot::TransformEventFn => TransformSinkEvent,
});

level_overrides!(PushSrcOverrides {
    create: slot::PushSrcCreateFn => PushSrcCreate,
    alloc: slot::PushSrcCreateFn => PushSrcAlloc,
    fill: slot::PushSrcFillFn => PushSrcFill,
});

/// Trampolines detected for a host type, grouped by base level.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub object: ObjectOverrides,
    pub element: ElementOverrides,
    pub base_sink: BaseSinkOverrides,
    pub base_src: BaseSrcOverrides,
    pub base_transform: BaseTransformOverrides,
    pub push_src: PushSrcOverrides,
}

impl Overrides {
    pub fn capabilities(&self) -> CapabilitySet {
        let mut set = CapabilitySet::EMPTY;
        self.object.collect(&mut set);
        self.element.collect(&mut set);
        self.base_sink.collect(&mut set);
        self.base_src.collect(&mut set);
        self.base_transform.collect(&mut set);
        self.push_src.collect(&mut set);
        set
    }
}

/// Copies the detected slots of one level into a class table.
macro_rules! patch_slots {
    ($class:expr, $overrides:expr; $($field:ident),+ $(,)?) => {
        $(if let Some(slot) = $overrides.$field {
            $class.$field = Some(slot);
        })+
    };
}

pub(crate) use patch_slots;

/// Autoref probes behind [`overrides!`](crate::overrides!).
///
/// `Has*` traits are implemented on `Probe<T>` when `T` implements the
/// capability, `No*` traits on `&Probe<T>` unconditionally. Method lookup on a
/// `&Probe<T>` tries the by-value receiver first, so the `Has*` impl wins
/// whenever it applies.
#[doc(hidden)]
pub mod probe {
    use std::marker::PhantomData;

    use super::slot;
    use crate::base_sink::{
        self as sink, BaseSink, SinkEvent, SinkPreroll, SinkQuery, SinkRender, SinkSetCaps, SinkStart, SinkStop,
        SinkUnlock, SinkUnlockStop,
    };
    use crate::base_src::{
        self as src, BaseSrc, SrcAlloc, SrcCreate, SrcDoSeek, SrcEvent, SrcFill, SrcGetSize, SrcIsSeekable, SrcQuery,
        SrcStart, SrcStop, SrcUnlock, SrcUnlockStop,
    };
    use crate::base_transform::{
        self as transform, BaseTransform, Transform, TransformIp, TransformSetCaps, TransformSinkEvent, TransformSize,
        TransformStart, TransformStop,
    };
    use crate::element::{self, ChangeState, Element, ElementQuery, SendEvent};
    use crate::object::{self, Constructed, GetProperty, SetProperty};
    use crate::push_src::{self as push, PushSrc, PushSrcAlloc, PushSrcCreate, PushSrcFill};
    use crate::subclass::ObjectSubclass;
    use crate::types::IsA;

    pub struct Probe<T>(PhantomData<T>);

    impl<T> Probe<T> {
        #[allow(clippy::new_without_default)]
        pub const fn new() -> Self {
            Probe(PhantomData)
        }
    }

    macro_rules! probes {
        ($($capability:ident => $has:ident, $no:ident, $method:ident: $slot:ty = $module:ident::$tramp:ident $(where $base:ident)?;)*) => {
            $(
                pub trait $has {
                    fn $method(&self) -> Option<$slot>;
                }

                impl<T: $capability> $has for Probe<T>
                $(where <T as ObjectSubclass>::ParentType: IsA<$base>)?
                {
                    fn $method(&self) -> Option<$slot> {
                        Some($module::$tramp::<T>)
                    }
                }

                pub trait $no {
                    fn $method(&self) -> Option<$slot>;
                }

                impl<T> $no for &Probe<T> {
                    fn $method(&self) -> Option<$slot> {
                        None
                    }
                }
            )*
        };
    }

    probes! {
        SetProperty => HasSetProperty, NoSetProperty, probe_set_property: slot::SetPropertyFn = object::set_property;
        GetProperty => HasGetProperty, NoGetProperty, probe_get_property: slot::GetPropertyFn = object::get_property;
        Constructed => HasConstructed, NoConstructed, probe_constructed: slot::ConstructedFn = object::constructed;

        ChangeState => HasChangeState, NoChangeState, probe_change_state: slot::ChangeStateFn = element::change_state where Element;
        SendEvent => HasSendEvent, NoSendEvent, probe_send_event: slot::SendEventFn = element::send_event where Element;
        ElementQuery => HasElementQuery, NoElementQuery, probe_element_query: slot::ElementQueryFn = element::query where Element;

        SinkStart => HasSinkStart, NoSinkStart, probe_sink_start: slot::SinkBoolFn = sink::start where BaseSink;
        SinkStop => HasSinkStop, NoSinkStop, probe_sink_stop: slot::SinkBoolFn = sink::stop where BaseSink;
        SinkSetCaps => HasSinkSetCaps, NoSinkSetCaps, probe_sink_set_caps: slot::SinkCapsFn = sink::set_caps where BaseSink;
        SinkEvent => HasSinkEvent, NoSinkEvent, probe_sink_event: slot::SinkEventFn = sink::event where BaseSink;
        SinkQuery => HasSinkQuery, NoSinkQuery, probe_sink_query: slot::SinkQueryFn = sink::query where BaseSink;
        SinkPreroll => HasSinkPreroll, NoSinkPreroll, probe_sink_preroll: slot::SinkBufferFn = sink::preroll where BaseSink;
        SinkRender => HasSinkRender, NoSinkRender, probe_sink_render: slot::SinkBufferFn = sink::render where BaseSink;
        SinkUnlock => HasSinkUnlock, NoSinkUnlock, probe_sink_unlock: slot::SinkBoolFn = sink::unlock where BaseSink;
        SinkUnlockStop => HasSinkUnlockStop, NoSinkUnlockStop, probe_sink_unlock_stop: slot::SinkBoolFn = sink::unlock_stop where BaseSink;

        SrcStart => HasSrcStart, NoSrcStart, probe_src_start: slot::SrcBoolFn = src::start where BaseSrc;
        SrcStop => HasSrcStop, NoSrcStop, probe_src_stop: slot::SrcBoolFn = src::stop where BaseSrc;
        SrcGetSize => HasSrcGetSize, NoSrcGetSize, probe_src_get_size: slot::SrcGetSizeFn = src::get_size where BaseSrc;
        SrcIsSeekable => HasSrcIsSeekable, NoSrcIsSeekable, probe_src_is_seekable: slot::SrcBoolFn = src::is_seekable where BaseSrc;
        SrcCreate => HasSrcCreate, NoSrcCreate, probe_src_create: slot::SrcCreateFn = src::create where BaseSrc;
        SrcAlloc => HasSrcAlloc, NoSrcAlloc, probe_src_alloc: slot::SrcCreateFn = src::alloc where BaseSrc;
        SrcFill => HasSrcFill, NoSrcFill, probe_src_fill: slot::SrcFillFn = src::fill where BaseSrc;
        SrcDoSeek => HasSrcDoSeek, NoSrcDoSeek, probe_src_do_seek: slot::SrcDoSeekFn = src::do_seek where BaseSrc;
        SrcEvent => HasSrcEvent, NoSrcEvent, probe_src_event: slot::SrcEventFn = src::event where BaseSrc;
        SrcQuery => HasSrcQuery, NoSrcQuery, probe_src_query: slot::SrcQueryFn = src::query where BaseSrc;
        SrcUnlock => HasSrcUnlock, NoSrcUnlock, probe_src_unlock: slot::SrcBoolFn = src::unlock where BaseSrc;
        SrcUnlockStop => HasSrcUnlockStop, NoSrcUnlockStop, probe_src_unlock_stop: slot::SrcBoolFn = src::unlock_stop where BaseSrc;

        TransformStart => HasTransformStart, NoTransformStart, probe_transform_start: slot::TransformBoolFn = transform::start where BaseTransform;
        TransformStop => HasTransformStop, NoTransformStop, probe_transform_stop: slot::TransformBoolFn = transform::stop where BaseTransform;
        TransformSetCaps => HasTransformSetCaps, NoTransformSetCaps, probe_transform_set_caps: slot::TransformCapsFn = transform::set_caps where BaseTransform;
        TransformSize => HasTransformSize, NoTransformSize, probe_transform_size: slot::TransformSizeFn = transform::transform_size where BaseTransform;
        Transform => HasTransform, NoTransform, probe_transform: slot::TransformFn = transform::transform where BaseTransform;
        TransformIp => HasTransformIp, NoTransformIp, probe_transform_ip: slot::TransformIpFn = transform::transform_ip where BaseTransform;
        TransformSinkEvent => HasTransformSinkEvent, NoTransformSinkEvent, probe_transform_sink_event: slot::TransformEventFn = transform::sink_event where BaseTransform;

        PushSrcCreate => HasPushSrcCreate, NoPushSrcCreate, probe_push_src_create: slot::PushSrcCreateFn = push::create where PushSrc;
        PushSrcAlloc => HasPushSrcAlloc, NoPushSrcAlloc, probe_push_src_alloc: slot::PushSrcCreateFn = push::alloc where PushSrc;
        PushSrcFill => HasPushSrcFill, NoPushSrcFill, probe_push_src_fill: slot::PushSrcFillFn = push::fill where PushSrc;
    }
}

/// Detects the [`Overrides`] of a concrete host type.
#[macro_export]
macro_rules! overrides {
    ($ty:ty) => {{
        #[allow(unused_imports)]
        use $crate::capability::probe::*;
        let probe = &$crate::capability::probe::Probe::<$ty>::new();
        $crate::capability::Overrides {
            object: $crate::capability::ObjectOverrides {
                set_property: probe.probe_set_property(),
                get_property: probe.probe_get_property(),
                constructed: probe.probe_constructed(),
            },
            element: $crate::capability::ElementOverrides {
                change_state: probe.probe_change_state(),
                send_event: probe.probe_send_event(),
                query: probe.probe_element_query(),
            },
            base_sink: $crate::capability::BaseSinkOverrides {
                start: probe.probe_sink_start(),
                stop: probe.probe_sink_stop(),
                set_caps: probe.probe_sink_set_caps(),
                event: probe.probe_sink_event(),
                query: probe.probe_sink_query(),
                preroll: probe.probe_sink_preroll(),
                render: probe.probe_sink_render(),
                unlock: probe.probe_sink_unlock(),
                unlock_stop: probe.probe_sink_unlock_stop(),
            },
            base_src: $crate::capability::BaseSrcOverrides {
                start: probe.probe_src_start(),
                stop: probe.probe_src_stop(),
                get_size: probe.probe_src_get_size(),
                is_seekable: probe.probe_src_is_seekable(),
                create: probe.probe_src_create(),
                alloc: probe.probe_src_alloc(),
                fill: probe.probe_src_fill(),
                do_seek: probe.probe_src_do_seek(),
                event: probe.probe_src_event(),
                query: probe.probe_src_query(),
                unlock: probe.probe_src_unlock(),
                unlock_stop: probe.probe_src_unlock_stop(),
            },
            base_transform: $crate::capability::BaseTransformOverrides {
                start: probe.probe_transform_start(),
                stop: probe.probe_transform_stop(),
                set_caps: probe.probe_transform_set_caps(),
                transform_size: probe.probe_transform_size(),
                transform: probe.probe_transform(),
                transform_ip: probe.probe_transform_ip(),
                sink_event: probe.probe_transform_sink_event(),
            },
            push_src: $crate::capability::PushSrcOverrides {
                create: probe.probe_push_src_create(),
                alloc: probe.probe_push_src_alloc(),
                fill: probe.probe_push_src_fill(),
            },
        }
    }};
}
