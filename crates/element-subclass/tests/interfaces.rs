use std::sync::atomic::{AtomicBool, Ordering};

use element_subclass::prelude::*;
use element_subclass::{
    extend, BaseSink, BufferRef, FlowError, FlowSuccess, Interface, Object, PushSrc, State, UriError, UriHandler,
    UriType,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

static SECOND_ADD_ACCEPTED: AtomicBool = AtomicBool::new(true);

/// Writes to `file:` and `memory:` locations.
#[derive(Default)]
struct LocationSink {
    location: Mutex<Option<String>>,
}

impl ObjectSubclass for LocationSink {
    const NAME: &'static str = "TestUriLocationSink";
    type ParentType = BaseSink;

    fn new() -> Self {
        Self::default()
    }

    fn type_init(type_: &mut TypeInit<Self>) {
        type_.add_interface::<UriHandler>();
        SECOND_ADD_ACCEPTED.store(type_.add_interface::<UriHandler>(), Ordering::SeqCst);
    }
}

impl UriHandlerImpl for LocationSink {
    const URI_TYPE: UriType = UriType::Sink;

    fn protocols() -> &'static [&'static str] {
        &["file", "memory"]
    }

    fn uri(&self, _handler: &Object) -> Option<String> {
        self.location.lock().clone()
    }

    fn set_uri(&self, _handler: &Object, uri: &str) -> anyhow::Result<()> {
        anyhow::ensure!(!uri.ends_with('/'), "directories are not writable");
        *self.location.lock() = Some(uri.to_owned());
        Ok(())
    }
}

impl SinkRender for LocationSink {
    fn render(&self, _sink: &BaseSink, _buffer: &BufferRef) -> Result<FlowSuccess, FlowError> {
        Ok(FlowSuccess::Ok)
    }
}

#[test]
fn handler_reports_its_direction_and_protocols() {
    let ty = extend!(LocationSink).unwrap();
    assert!(ty.implements(UriHandler::static_type()));
    assert!(UriHandler::static_type().is_interface());
    assert!(!ty.is_interface());

    let sink = ty.create::<BaseSink>(None).unwrap();
    assert!(sink.is_uri_handler());
    assert_eq!(sink.uri_type(), UriType::Sink);
    assert_eq!(sink.protocols(), vec!["file".to_owned(), "memory".to_owned()]);
    assert_eq!(sink.uri(), None);
}

#[test]
fn accepted_uris_reach_the_host() {
    let ty = extend!(LocationSink).unwrap();
    let sink = ty.create::<BaseSink>(None).unwrap();

    sink.set_uri("file:///tmp/out.raw").unwrap();
    assert_eq!(sink.uri().as_deref(), Some("file:///tmp/out.raw"));
    sink.set_uri("MEMORY:scratch").unwrap();
    assert_eq!(sink.uri().as_deref(), Some("MEMORY:scratch"));
    assert_eq!(sink.imp::<LocationSink>().unwrap().location.lock().as_deref(), Some("MEMORY:scratch"));
}

#[test]
fn rejected_uris_keep_the_old_location() {
    let ty = extend!(LocationSink).unwrap();
    let sink = ty.create::<BaseSink>(None).unwrap();
    sink.set_uri("file:///tmp/keep").unwrap();

    assert_eq!(
        sink.set_uri("http://example.com/stream"),
        Err(UriError::Rejected("unsupported URI protocol".to_owned()))
    );
    assert_eq!(sink.set_uri("no scheme here"), Err(UriError::Rejected("malformed URI".to_owned())));
    assert_eq!(
        sink.set_uri("file:///tmp/"),
        Err(UriError::Rejected("directories are not writable".to_owned()))
    );
    assert_eq!(sink.set_uri("file:///tmp/\0x"), Err(UriError::InteriorNul));
    assert_eq!(sink.uri().as_deref(), Some("file:///tmp/keep"));
}

#[test]
fn adding_an_interface_twice_is_refused() {
    extend!(LocationSink).unwrap();
    assert!(!SECOND_ADD_ACCEPTED.load(Ordering::SeqCst));
}

/// A sink without the interface.
struct PlainSink;

impl ObjectSubclass for PlainSink {
    const NAME: &'static str = "TestUriPlainSink";
    type ParentType = BaseSink;

    fn new() -> Self {
        Self
    }
}

#[test]
fn objects_without_the_interface_are_not_handlers() {
    let ty = extend!(PlainSink).unwrap();
    assert!(!ty.implements(UriHandler::static_type()));

    let sink = ty.create::<BaseSink>(None).unwrap();
    assert!(!sink.is_uri_handler());
    assert_eq!(sink.uri_type(), UriType::Unknown);
    assert!(sink.protocols().is_empty());
    assert_eq!(sink.uri(), None);
    assert_eq!(sink.set_uri("file:///tmp/x"), Err(UriError::NotAHandler));
}

/// Reads from `tone:` URIs whose path is the byte it repeats.
#[derive(Default)]
struct ToneSrc {
    tone: Mutex<u8>,
}

impl ObjectSubclass for ToneSrc {
    const NAME: &'static str = "TestUriToneSrc";
    type ParentType = PushSrc;

    fn new() -> Self {
        Self::default()
    }

    fn type_init(type_: &mut TypeInit<Self>) {
        type_.add_interface::<UriHandler>();
    }
}

impl UriHandlerImpl for ToneSrc {
    const URI_TYPE: UriType = UriType::Src;

    fn protocols() -> &'static [&'static str] {
        &["tone"]
    }

    fn uri(&self, _handler: &Object) -> Option<String> {
        Some(format!("tone:{}", *self.tone.lock()))
    }

    fn set_uri(&self, _handler: &Object, uri: &str) -> anyhow::Result<()> {
        let value = uri.trim_start_matches("tone:").parse::<u8>()?;
        *self.tone.lock() = value;
        Ok(())
    }
}

impl PushSrcFill for ToneSrc {
    fn fill(&self, _src: &PushSrc, buffer: &mut BufferRef) -> Result<FlowSuccess, FlowError> {
        buffer.as_mut_slice().fill(*self.tone.lock());
        Ok(FlowSuccess::Ok)
    }
}

#[test]
fn source_handlers_configure_what_they_produce() {
    let ty = extend!(ToneSrc).unwrap();
    let src = ty.create::<PushSrc>(None).unwrap();
    assert_eq!(src.uri_type(), UriType::Src);
    assert_eq!(src.uri().as_deref(), Some("tone:0"));

    src.set_uri("tone:9").unwrap();
    src.set_blocksize(2);
    src.set_state(State::Paused).unwrap();
    assert_eq!(src.pull().unwrap().as_slice(), &[9, 9]);

    match src.set_uri("tone:loud") {
        Err(UriError::Rejected(message)) => assert!(message.contains("invalid digit"), "{message}"),
        other => panic!("unexpected result {other:?}"),
    }
}
