//! Host types deriving from a class that is itself implemented natively.

use std::ffi::c_void;
use std::mem::size_of;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use element_subclass::prelude::*;
use element_subclass::{
    capabilities, extend, sys, BaseSink, Buffer, BufferRef, Capability, CapabilitySet, FlowError, FlowSuccess, Overrides, State,
    Type,
};
use pretty_assertions::assert_eq;

static NATIVE_RENDERS: AtomicUsize = AtomicUsize::new(0);

unsafe extern "C" fn native_render(_sink: *mut sys::el_base_sink, buffer: *mut sys::el_buffer) -> sys::el_flow_return {
    NATIVE_RENDERS.fetch_add(1, Ordering::SeqCst);
    if (*buffer).size == 0 {
        return sys::EL_FLOW_ERROR;
    }
    sys::EL_FLOW_OK
}

unsafe extern "C" fn native_class_init(klass: *mut c_void, _data: *mut c_void) {
    let klass = klass as *mut sys::el_base_sink_class;
    (*klass).render = Some(native_render);
}

unsafe extern "C" fn native_counting_sink_get_type() -> sys::el_type {
    static TYPE: OnceLock<sys::el_type> = OnceLock::new();
    *TYPE.get_or_init(|| {
        let info = sys::el_type_info {
            class_size: size_of::<sys::el_base_sink_class>(),
            class_init: Some(native_class_init),
            class_data: ptr::null_mut(),
            instance_size: size_of::<sys::el_base_sink>(),
            instance_init: None,
        };
        sys::el_type_register_static(sys::el_base_sink_get_type(), b"NativeCountingSink\0".as_ptr().cast(), &info)
    })
}

element_subclass::object_wrapper!(
    /// Sink whose render is implemented natively.
    pub struct NativeCountingSink(sys::el_base_sink) @type native_counting_sink_get_type(),
    @extends BaseSink, element_subclass::Element, element_subclass::Object
);

unsafe impl Extendable for NativeCountingSink {
    type Class = sys::el_base_sink_class;

    fn parent_type() -> Option<Type> {
        Some(BaseSink::static_type())
    }

    unsafe fn install(klass: *mut c_void, overrides: &Overrides) {
        BaseSink::install(klass, overrides);
    }
}

#[derive(Default)]
struct Wrapping {
    renders: AtomicUsize,
}

impl ObjectSubclass for Wrapping {
    const NAME: &'static str = "TestWrappingNativeSink";
    type ParentType = NativeCountingSink;

    fn new() -> Self {
        Self::default()
    }
}

impl SinkRender for Wrapping {
    fn render(&self, sink: &BaseSink, buffer: &BufferRef) -> Result<FlowSuccess, FlowError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        self.parent_render(sink, buffer)
    }
}

/// Extends the native sink without overriding anything.
struct Untouched;

impl ObjectSubclass for Untouched {
    const NAME: &'static str = "TestUntouchedNativeSink";
    type ParentType = NativeCountingSink;

    fn new() -> Self {
        Self
    }
}

fn playing(ty: Type) -> BaseSink {
    let sink = ty.create::<BaseSink>(None).unwrap();
    sink.set_state(State::Playing).unwrap();
    sink
}

// The native counter is shared, so everything touching it runs in one test.
#[test]
fn parent_render_reaches_the_native_slot_once() {
    let wrapping = extend!(Wrapping).unwrap();
    let untouched = extend!(Untouched).unwrap();
    assert_eq!(wrapping.parent(), Some(NativeCountingSink::static_type()));
    assert_eq!(
        capabilities!(Wrapping),
        [Capability::SinkRender].into_iter().collect::<CapabilitySet>()
    );
    assert!(capabilities!(Untouched).is_empty());

    let sink = playing(wrapping);
    let before = NATIVE_RENDERS.load(Ordering::SeqCst);
    assert_eq!(sink.chain(Buffer::with_size(8)), Ok(FlowSuccess::Ok));
    assert_eq!(NATIVE_RENDERS.load(Ordering::SeqCst), before + 1);
    assert_eq!(sink.imp::<Wrapping>().unwrap().renders.load(Ordering::SeqCst), 1);

    // a chaining override behaves exactly like no override at all
    let outcomes = |sink: &BaseSink| {
        let before = NATIVE_RENDERS.load(Ordering::SeqCst);
        let results = vec![sink.chain(Buffer::with_size(4)), sink.chain(Buffer::new())];
        (results, NATIVE_RENDERS.load(Ordering::SeqCst) - before, sink.rendered())
    };
    let via_host = outcomes(&playing(wrapping));
    let via_untouched = outcomes(&playing(untouched));
    let native_only = outcomes(&playing(NativeCountingSink::static_type()));
    assert_eq!(via_host, native_only);
    assert_eq!(via_untouched, native_only);
    assert_eq!(native_only.0, vec![Ok(FlowSuccess::Ok), Err(FlowError::Error)]);
    assert_eq!(native_only.1, 2);
}
