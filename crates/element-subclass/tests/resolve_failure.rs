//! Runs in its own binary: it installs the fail-safe resolve policy.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use element_subclass::prelude::*;
use element_subclass::{
    config, configure, extend, sys, BaseSink, Buffer, BufferRef, FlowError, FlowSuccess, Handle, ResolveFailurePolicy,
    State, SubclassConfig,
};
use log::Level;
use pretty_assertions::assert_eq;

#[derive(Default)]
struct CountingSink {
    renders: AtomicUsize,
}

impl ObjectSubclass for CountingSink {
    const NAME: &'static str = "TestResolveCountingSink";
    type ParentType = BaseSink;

    fn new() -> Self {
        Self::default()
    }
}

impl SinkRender for CountingSink {
    fn render(&self, _sink: &BaseSink, _buffer: &BufferRef) -> Result<FlowSuccess, FlowError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        Ok(FlowSuccess::Ok)
    }
}

fn private_of(sink: &BaseSink) -> u64 {
    unsafe { sys::el_object_get_private(sink.as_ptr().cast()) }
}

fn set_private(sink: &BaseSink, raw: u64) {
    unsafe { sys::el_object_set_private(sink.as_ptr().cast(), raw) }
}

#[test]
fn unresolvable_instances_fail_safe() {
    configure(SubclassConfig::default().with_resolve_failure(ResolveFailurePolicy::FailSafe)).unwrap();
    assert_eq!(config().resolve_failure, ResolveFailurePolicy::FailSafe);
    common::capture_logs();

    let ty = extend!(CountingSink).unwrap();
    let sink = ty.create::<BaseSink>(None).unwrap();
    sink.set_state(State::Paused).unwrap();
    let saved = private_of(&sink);
    assert!(Handle::from_raw(saved).is_some());

    // no handle at all
    set_private(&sink, 0);
    assert!(sink.imp::<CountingSink>().is_none());
    assert_eq!(sink.chain(Buffer::with_size(1)), Err(FlowError::Error));
    assert!(!common::logged(Level::Error, "cannot resolve instance").is_empty());

    // a handle from a later generation of the same slot
    let handle = Handle::from_raw(saved).unwrap();
    let stale = saved + (1u64 << 32);
    assert_eq!(Handle::from_raw(stale).unwrap().index(), handle.index());
    set_private(&sink, stale);
    assert_eq!(sink.chain(Buffer::with_size(1)), Err(FlowError::Error));

    set_private(&sink, saved);
    assert_eq!(sink.chain(Buffer::with_size(1)), Ok(FlowSuccess::Ok));
    assert_eq!(sink.imp::<CountingSink>().unwrap().renders.load(Ordering::SeqCst), 1);

    // finalize goes through the same policy
    let doomed = ty.create::<BaseSink>(None).unwrap();
    let raw = private_of(&doomed);
    set_private(&doomed, raw + (1u64 << 32));
    drop(doomed);
    assert!(!common::logged(Level::Error, "TestResolveCountingSink::finalize: cannot resolve instance").is_empty());
}
