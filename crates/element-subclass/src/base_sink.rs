//! Sink base class: consumes buffers pushed with [`BaseSinkExt::chain`].

use std::ffi::c_void;

use element_sys as sys;

use crate::buffer::{Buffer, BufferRef};
use crate::caps::CapsRef;
use crate::capability::{patch_slots, Overrides};
use crate::element::Element;
use crate::event::Event;
use crate::flow::{flow_from_raw, flow_into_raw, FlowError, FlowSuccess};
use crate::object::Object;
use crate::query::QueryRef;
use crate::subclass::{parent_class, Extendable, ObjectSubclass};
use crate::trampoline::{check_parent, guard, report};
use crate::types::{IsA, ObjectType, Type};

crate::object_wrapper!(
    pub struct BaseSink(sys::el_base_sink) @type sys::el_base_sink_get_type(),
    @extends Element, Object
);

macro_rules! sink_capability {
    ($(#[$attr:meta])* $name:ident { $($method:tt)* }) => {
        $(#[$attr])*
        pub trait $name: ObjectSubclass
        where
            <Self as ObjectSubclass>::ParentType: IsA<BaseSink>,
        {
            $($method)*
        }
    };
}

sink_capability!(
    /// Acquires resources on the READY to PAUSED transition.
    SinkStart { fn start(&self, sink: &BaseSink) -> anyhow::Result<()>; }
);
sink_capability!(SinkStop { fn stop(&self, sink: &BaseSink) -> anyhow::Result<()>; });
sink_capability!(SinkSetCaps { fn set_caps(&self, sink: &BaseSink, caps: &CapsRef) -> anyhow::Result<()>; });
sink_capability!(
    /// Receives every event sent to the sink. Chain to
    /// [`BaseSinkParent::parent_event`] to keep the default EOS and flush
    /// handling.
    SinkEvent { fn event(&self, sink: &BaseSink, event: Event) -> bool; }
);
sink_capability!(SinkQuery { fn query(&self, sink: &BaseSink, query: &mut QueryRef) -> bool; });
sink_capability!(
    /// Sees the first buffer after start or flush before it is rendered.
    SinkPreroll {
        fn preroll(&self, sink: &BaseSink, buffer: &BufferRef) -> Result<FlowSuccess, FlowError>;
    }
);
sink_capability!(SinkRender {
    fn render(&self, sink: &BaseSink, buffer: &BufferRef) -> Result<FlowSuccess, FlowError>;
});
sink_capability!(
    /// Interrupts a blocking `render` when flushing starts.
    SinkUnlock { fn unlock(&self, sink: &BaseSink) -> anyhow::Result<()>; }
);
sink_capability!(SinkUnlockStop { fn unlock_stop(&self, sink: &BaseSink) -> anyhow::Result<()>; });

pub(crate) unsafe extern "C" fn start<T: SinkStart>(sink: *mut sys::el_base_sink) -> sys::el_boolean
where
    T::ParentType: IsA<BaseSink>,
{
    let wrapper = BaseSink::from_raw_borrow(sink);
    guard::<T, _>(sink.cast(), "start", sys::EL_FALSE, |imp| report::<T>("start", SinkStart::start(imp, &wrapper)))
}

pub(crate) unsafe extern "C" fn stop<T: SinkStop>(sink: *mut sys::el_base_sink) -> sys::el_boolean
where
    T::ParentType: IsA<BaseSink>,
{
    let wrapper = BaseSink::from_raw_borrow(sink);
    guard::<T, _>(sink.cast(), "stop", sys::EL_FALSE, |imp| report::<T>("stop", SinkStop::stop(imp, &wrapper)))
}

pub(crate) unsafe extern "C" fn set_caps<T: SinkSetCaps>(
    sink: *mut sys::el_base_sink,
    caps: *mut sys::el_caps,
) -> sys::el_boolean
where
    T::ParentType: IsA<BaseSink>,
{
    if caps.is_null() {
        return sys::EL_FALSE;
    }
    let wrapper = BaseSink::from_raw_borrow(sink);
    let caps = CapsRef::from_ptr(caps);
    guard::<T, _>(sink.cast(), "set_caps", sys::EL_FALSE, |imp| {
        report::<T>("set_caps", SinkSetCaps::set_caps(imp, &wrapper, caps))
    })
}

pub(crate) unsafe extern "C" fn event<T: SinkEvent>(
    sink: *mut sys::el_base_sink,
    event: *mut sys::el_event,
) -> sys::el_boolean
where
    T::ParentType: IsA<BaseSink>,
{
    let Some(event) = Event::from_raw_full(event) else {
        return sys::EL_FALSE;
    };
    let wrapper = BaseSink::from_raw_borrow(sink);
    sys::el_boolean_from(guard::<T, _>(sink.cast(), "event", false, |imp| {
        SinkEvent::event(imp, &wrapper, event)
    }))
}

pub(crate) unsafe extern "C" fn query<T: SinkQuery>(
    sink: *mut sys::el_base_sink,
    query: *mut sys::el_query,
) -> sys::el_boolean
where
    T::ParentType: IsA<BaseSink>,
{
    if query.is_null() {
        return sys::EL_FALSE;
    }
    let wrapper = BaseSink::from_raw_borrow(sink);
    let query = QueryRef::from_mut_ptr(query);
    sys::el_boolean_from(guard::<T, _>(sink.cast(), "query", false, |imp| {
        SinkQuery::query(imp, &wrapper, query)
    }))
}

pub(crate) unsafe extern "C" fn preroll<T: SinkPreroll>(
    sink: *mut sys::el_base_sink,
    buffer: *mut sys::el_buffer,
) -> sys::el_flow_return
where
    T::ParentType: IsA<BaseSink>,
{
    if buffer.is_null() {
        return sys::EL_FLOW_ERROR;
    }
    let wrapper = BaseSink::from_raw_borrow(sink);
    let buffer = BufferRef::from_ptr(buffer);
    flow_into_raw(guard::<T, _>(sink.cast(), "preroll", Err(FlowError::Error), |imp| {
        SinkPreroll::preroll(imp, &wrapper, buffer)
    }))
}

pub(crate) unsafe extern "C" fn render<T: SinkRender>(
    sink: *mut sys::el_base_sink,
    buffer: *mut sys::el_buffer,
) -> sys::el_flow_return
where
    T::ParentType: IsA<BaseSink>,
{
    if buffer.is_null() {
        return sys::EL_FLOW_ERROR;
    }
    let wrapper = BaseSink::from_raw_borrow(sink);
    let buffer = BufferRef::from_ptr(buffer);
    flow_into_raw(guard::<T, _>(sink.cast(), "render", Err(FlowError::Error), |imp| {
        SinkRender::render(imp, &wrapper, buffer)
    }))
}

pub(crate) unsafe extern "C" fn unlock<T: SinkUnlock>(sink: *mut sys::el_base_sink) -> sys::el_boolean
where
    T::ParentType: IsA<BaseSink>,
{
    let wrapper = BaseSink::from_raw_borrow(sink);
    guard::<T, _>(sink.cast(), "unlock", sys::EL_FALSE, |imp| {
        report::<T>("unlock", SinkUnlock::unlock(imp, &wrapper))
    })
}

pub(crate) unsafe extern "C" fn unlock_stop<T: SinkUnlockStop>(sink: *mut sys::el_base_sink) -> sys::el_boolean
where
    T::ParentType: IsA<BaseSink>,
{
    let wrapper = BaseSink::from_raw_borrow(sink);
    guard::<T, _>(sink.cast(), "unlock_stop", sys::EL_FALSE, |imp| {
        report::<T>("unlock_stop", SinkUnlockStop::unlock_stop(imp, &wrapper))
    })
}

unsafe fn sink_parent<T: ObjectSubclass>() -> &'static sys::el_base_sink_class {
    &*parent_class::<T, sys::el_base_sink_class>()
}

/// Calls the parent class's sink slots. Empty slots behave like the base
/// class defaults: start, stop and caps succeed, preroll and render return
/// `Ok`.
pub trait BaseSinkParent: ObjectSubclass
where
    <Self as ObjectSubclass>::ParentType: IsA<BaseSink>,
{
    fn parent_start(&self, sink: &BaseSink) -> anyhow::Result<()> {
        unsafe {
            match sink_parent::<Self>().start {
                Some(start) => check_parent("start", start(sink.as_ptr())),
                None => Ok(()),
            }
        }
    }

    fn parent_stop(&self, sink: &BaseSink) -> anyhow::Result<()> {
        unsafe {
            match sink_parent::<Self>().stop {
                Some(stop) => check_parent("stop", stop(sink.as_ptr())),
                None => Ok(()),
            }
        }
    }

    fn parent_set_caps(&self, sink: &BaseSink, caps: &CapsRef) -> anyhow::Result<()> {
        unsafe {
            match sink_parent::<Self>().set_caps {
                Some(set_caps) => check_parent("set_caps", set_caps(sink.as_ptr(), caps.as_ptr() as *mut _)),
                None => Ok(()),
            }
        }
    }

    fn parent_event(&self, sink: &BaseSink, event: Event) -> bool {
        unsafe {
            match sink_parent::<Self>().event {
                Some(parent_event) => parent_event(sink.as_ptr(), event.into_raw()) != sys::EL_FALSE,
                None => false,
            }
        }
    }

    fn parent_query(&self, sink: &BaseSink, query: &mut QueryRef) -> bool {
        unsafe {
            match sink_parent::<Self>().query {
                Some(parent_query) => parent_query(sink.as_ptr(), query.as_mut_ptr()) != sys::EL_FALSE,
                None => false,
            }
        }
    }

    fn parent_preroll(&self, sink: &BaseSink, buffer: &BufferRef) -> Result<FlowSuccess, FlowError> {
        unsafe {
            match sink_parent::<Self>().preroll {
                Some(preroll) => flow_from_raw(preroll(sink.as_ptr(), buffer.as_ptr() as *mut _)),
                None => Ok(FlowSuccess::Ok),
            }
        }
    }

    fn parent_render(&self, sink: &BaseSink, buffer: &BufferRef) -> Result<FlowSuccess, FlowError> {
        unsafe {
            match sink_parent::<Self>().render {
                Some(render) => flow_from_raw(render(sink.as_ptr(), buffer.as_ptr() as *mut _)),
                None => Ok(FlowSuccess::Ok),
            }
        }
    }

    fn parent_unlock(&self, sink: &BaseSink) -> anyhow::Result<()> {
        unsafe {
            match sink_parent::<Self>().unlock {
                Some(unlock) => check_parent("unlock", unlock(sink.as_ptr())),
                None => Ok(()),
            }
        }
    }

    fn parent_unlock_stop(&self, sink: &BaseSink) -> anyhow::Result<()> {
        unsafe {
            match sink_parent::<Self>().unlock_stop {
                Some(unlock_stop) => check_parent("unlock_stop", unlock_stop(sink.as_ptr())),
                None => Ok(()),
            }
        }
    }
}

impl<T: ObjectSubclass> BaseSinkParent for T where T::ParentType: IsA<BaseSink> {}

unsafe impl Extendable for BaseSink {
    type Class = sys::el_base_sink_class;

    fn parent_type() -> Option<Type> {
        Some(Element::static_type())
    }

    unsafe fn install(klass: *mut c_void, overrides: &Overrides) {
        Element::install(klass, overrides);
        let klass = klass as *mut sys::el_base_sink_class;
        patch_slots!(
            (*klass), overrides.base_sink;
            start, stop, set_caps, event, query, preroll, render, unlock, unlock_stop,
        );
    }
}

/// Holds the sink's preroll lock until dropped, including during unwinding.
#[must_use = "the preroll lock is released when the guard is dropped"]
pub struct PrerollGuard<'a> {
    sink: &'a BaseSink,
}

impl Drop for PrerollGuard<'_> {
    fn drop(&mut self) {
        unsafe { sys::el_base_sink_preroll_unlock(self.sink.as_ptr()) };
    }
}

pub trait BaseSinkExt: IsA<BaseSink> {
    /// Pushes a buffer through preroll and render.
    fn chain(&self, buffer: Buffer) -> Result<FlowSuccess, FlowError> {
        flow_from_raw(unsafe { sys::el_base_sink_chain(self.as_ptr().cast(), buffer.into_raw()) })
    }

    fn is_started(&self) -> bool {
        unsafe { sys::el_base_sink_is_started(self.as_ptr().cast()) != sys::EL_FALSE }
    }

    fn is_eos(&self) -> bool {
        unsafe { sys::el_base_sink_is_eos(self.as_ptr().cast()) != sys::EL_FALSE }
    }

    fn is_flushing(&self) -> bool {
        unsafe { sys::el_base_sink_is_flushing(self.as_ptr().cast()) != sys::EL_FALSE }
    }

    /// Buffers rendered successfully since creation.
    fn rendered(&self) -> u64 {
        unsafe { sys::el_base_sink_rendered(self.as_ptr().cast()) }
    }

    fn preroll_lock(&self) -> PrerollGuard<'_> {
        let sink = <Self as IsA<BaseSink>>::upcast_ref(self);
        unsafe { sys::el_base_sink_preroll_lock(sink.as_ptr()) };
        PrerollGuard { sink }
    }

    fn try_preroll_lock(&self) -> Option<PrerollGuard<'_>> {
        let sink = <Self as IsA<BaseSink>>::upcast_ref(self);
        let locked = unsafe { sys::el_base_sink_preroll_trylock(sink.as_ptr()) } != sys::EL_FALSE;
        locked.then_some(PrerollGuard { sink })
    }
}

impl<O: IsA<BaseSink>> BaseSinkExt for O {}
