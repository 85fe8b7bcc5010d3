mod common;

use element_subclass::prelude::*;
use element_subclass::{
    capabilities, element_factory_make, element_metadata, extend, sys, BaseSink, Buffer, BufferRef, Capability,
    CapabilitySet, Event, EventType, FlowError, FlowSuccess, State, StateChangeError, StateChangeSuccess,
};
use log::Level;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

#[derive(Default)]
struct RenderOnlySink {
    rendered: Mutex<Vec<Vec<u8>>>,
}

impl ObjectSubclass for RenderOnlySink {
    const NAME: &'static str = "TestRenderOnlySink";
    type ParentType = BaseSink;

    fn new() -> Self {
        Self::default()
    }

    fn class_init(klass: &mut ClassBuilder) {
        klass.set_metadata("Render only", "Sink/Test", "Records rendered buffers", "element-subclass");
    }
}

impl SinkRender for RenderOnlySink {
    fn render(&self, _sink: &BaseSink, buffer: &BufferRef) -> Result<FlowSuccess, FlowError> {
        self.rendered.lock().push(buffer.as_slice().to_vec());
        Ok(FlowSuccess::Ok)
    }
}

#[test]
fn render_only_sink_renders_in_order() {
    let ty = extend!(RenderOnlySink).unwrap();
    let sink = ty.create::<BaseSink>(Some("render0")).unwrap();
    assert_eq!(sink.set_state(State::Paused), Ok(StateChangeSuccess::Success));
    assert!(sink.is_started());

    let payloads: [&[u8]; 3] = [b"one", b"two", b"three"];
    for payload in payloads {
        assert_eq!(sink.chain(Buffer::from_slice(payload)), Ok(FlowSuccess::Ok));
    }

    let imp = sink.imp::<RenderOnlySink>().unwrap();
    assert_eq!(*imp.rendered.lock(), vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]);
    assert_eq!(sink.rendered(), 3);
    assert_eq!(sink.set_state(State::Null), Ok(StateChangeSuccess::Success));
}

#[test]
fn only_the_render_slot_is_patched() {
    let ty = extend!(RenderOnlySink).unwrap();
    let expected: CapabilitySet = [Capability::SinkRender].into_iter().collect();
    assert_eq!(capabilities!(RenderOnlySink), expected);

    unsafe {
        let own = &*(sys::el_type_class_peek(ty.into_raw()) as *const sys::el_base_sink_class);
        let base = &*(sys::el_type_class_peek(BaseSink::static_type().into_raw()) as *const sys::el_base_sink_class);
        let addr = |slot: Option<unsafe extern "C" fn(*mut sys::el_base_sink) -> sys::el_boolean>| slot.map(|f| f as usize);

        assert_eq!(addr(own.start), addr(base.start));
        assert_eq!(addr(own.stop), addr(base.stop));
        assert_eq!(addr(own.unlock), addr(base.unlock));
        assert_eq!(addr(own.unlock_stop), addr(base.unlock_stop));
        assert_eq!(own.event.map(|f| f as usize), base.event.map(|f| f as usize));
        assert_eq!(own.query.map(|f| f as usize), base.query.map(|f| f as usize));
        assert_eq!(own.preroll.map(|f| f as usize), base.preroll.map(|f| f as usize));
        assert_eq!(
            own.element_class.change_state.map(|f| f as usize),
            base.element_class.change_state.map(|f| f as usize)
        );
        assert!(base.render.is_none());
        assert!(own.render.is_some());
    }
}

#[test]
fn metadata_is_set_during_class_init() {
    let ty = extend!(RenderOnlySink).unwrap();
    assert_eq!(element_metadata(ty, "long-name").as_deref(), Some("Render only"));
    assert_eq!(element_metadata(ty, "klass").as_deref(), Some("Sink/Test"));
    assert_eq!(element_metadata(ty, "unknown-key"), None);

    let made = element_factory_make("TestRenderOnlySink", Some("made")).unwrap();
    assert_eq!(made.name().as_deref(), Some("made"));
    assert!(made.is::<BaseSink>());
    assert_eq!(made.metadata("author").as_deref(), Some("element-subclass"));
    assert!(element_factory_make("NoSuchElement", None).is_none());
}

#[derive(Default)]
struct LockingPanicSink;

impl ObjectSubclass for LockingPanicSink {
    const NAME: &'static str = "TestLockingPanicSink";
    type ParentType = BaseSink;

    fn new() -> Self {
        Self
    }
}

impl SinkRender for LockingPanicSink {
    fn render(&self, sink: &BaseSink, _buffer: &BufferRef) -> Result<FlowSuccess, FlowError> {
        let _lock = sink.preroll_lock();
        panic!("render exploded while holding the preroll lock");
    }
}

#[test]
fn panic_in_render_releases_the_preroll_lock() {
    common::capture_logs();
    let ty = extend!(LockingPanicSink).unwrap();
    let sink = ty.create::<BaseSink>(None).unwrap();
    sink.set_state(State::Paused).unwrap();

    assert_eq!(sink.chain(Buffer::with_size(4)), Err(FlowError::Error));
    assert!(sink.try_preroll_lock().is_some());
    assert_eq!(sink.rendered(), 0);
    assert!(!common::logged(Level::Error, "render exploded").is_empty());

    // the instance keeps working after the panic
    assert_eq!(sink.chain(Buffer::with_size(4)), Err(FlowError::Error));
    assert!(sink.try_preroll_lock().is_some());
}

struct FailingStartSink;

impl ObjectSubclass for FailingStartSink {
    const NAME: &'static str = "TestFailingStartSink";
    type ParentType = BaseSink;

    fn new() -> Self {
        Self
    }
}

impl SinkStart for FailingStartSink {
    fn start(&self, _sink: &BaseSink) -> anyhow::Result<()> {
        anyhow::bail!("device busy")
    }
}

#[test]
fn start_error_fails_the_state_change() {
    common::capture_logs();
    let ty = extend!(FailingStartSink).unwrap();
    let sink = ty.create::<BaseSink>(None).unwrap();

    assert_eq!(sink.set_state(State::Paused), Err(StateChangeError));
    assert_eq!(sink.current_state(), State::Ready);
    assert!(!sink.is_started());
    assert!(!common::logged(Level::Error, "device busy").is_empty());
}

#[derive(Default)]
struct EventSink {
    seen: Mutex<Vec<EventType>>,
}

impl ObjectSubclass for EventSink {
    const NAME: &'static str = "TestEventSink";
    type ParentType = BaseSink;

    fn new() -> Self {
        Self::default()
    }
}

impl SinkEvent for EventSink {
    fn event(&self, sink: &BaseSink, event: Event) -> bool {
        self.seen.lock().push(event.event_type());
        self.parent_event(sink, event)
    }
}

#[test]
fn events_reach_the_host_and_chain_to_the_default() {
    let ty = extend!(EventSink).unwrap();
    let sink = ty.create::<BaseSink>(None).unwrap();
    sink.set_state(State::Paused).unwrap();

    assert!(sink.send_event(Event::eos()));
    assert!(sink.is_eos());
    assert_eq!(sink.chain(Buffer::new()), Err(FlowError::Eos));

    assert!(sink.send_event(Event::flush_start()));
    assert!(sink.is_flushing());
    assert!(sink.send_event(Event::flush_stop()));
    assert!(!sink.is_flushing());
    assert!(!sink.is_eos());

    let imp = sink.imp::<EventSink>().unwrap();
    assert_eq!(
        *imp.seen.lock(),
        vec![EventType::Eos, EventType::FlushStart, EventType::FlushStop]
    );
}

#[derive(Default)]
struct CodeSink;

impl ObjectSubclass for CodeSink {
    const NAME: &'static str = "TestCodeSink";
    type ParentType = BaseSink;

    fn new() -> Self {
        Self
    }
}

impl SinkRender for CodeSink {
    fn render(&self, _sink: &BaseSink, buffer: &BufferRef) -> Result<FlowSuccess, FlowError> {
        match buffer.as_slice().first() {
            Some(0) => Err(FlowError::Custom(7)),
            Some(1) => Err(FlowError::Custom(-150)),
            Some(2) => Ok(FlowSuccess::Custom(-5)),
            Some(3) => Ok(FlowSuccess::Custom(250)),
            _ => Ok(FlowSuccess::Ok),
        }
    }
}

#[test]
fn custom_flow_codes_keep_their_direction() {
    common::capture_logs();
    let ty = extend!(CodeSink).unwrap();
    let sink = ty.create::<BaseSink>(None).unwrap();
    sink.set_state(State::Paused).unwrap();

    assert_eq!(sink.chain(Buffer::from_slice(&[0])), Err(FlowError::Error));
    assert_eq!(sink.chain(Buffer::from_slice(&[1])), Err(FlowError::Custom(-150)));
    assert_eq!(sink.chain(Buffer::from_slice(&[2])), Ok(FlowSuccess::Ok));
    assert_eq!(sink.chain(Buffer::from_slice(&[3])), Ok(FlowSuccess::Custom(250)));

    assert!(!common::logged(Level::Warn, "custom flow error code 7 is outside its range").is_empty());
    assert!(!common::logged(Level::Warn, "custom flow success code -5 is outside its range").is_empty());
    sink.set_state(State::Null).unwrap();
}
