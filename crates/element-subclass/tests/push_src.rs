use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use element_subclass::prelude::*;
use element_subclass::{
    capabilities, extend, BaseSrc, Buffer, BufferRef, Capability, Element, FlowError, FlowSuccess, PushSrc, State,
};
use pretty_assertions::assert_eq;

/// Fills each block with a running counter and counts starts and allocs.
#[derive(Default)]
struct CounterSrc {
    next: AtomicU8,
    starts: AtomicU32,
    allocs: AtomicU32,
}

impl ObjectSubclass for CounterSrc {
    const NAME: &'static str = "TestPushCounterSrc";
    type ParentType = PushSrc;

    fn new() -> Self {
        Self::default()
    }
}

impl SrcStart for CounterSrc {
    fn start(&self, src: &BaseSrc) -> anyhow::Result<()> {
        self.starts.fetch_add(1, Ordering::Relaxed);
        self.parent_start(src)
    }
}

impl PushSrcAlloc for CounterSrc {
    fn alloc(&self, src: &PushSrc) -> Result<Buffer, FlowError> {
        self.allocs.fetch_add(1, Ordering::Relaxed);
        self.parent_push_alloc(src)
    }
}

impl PushSrcFill for CounterSrc {
    fn fill(&self, _src: &PushSrc, buffer: &mut BufferRef) -> Result<FlowSuccess, FlowError> {
        let value = self.next.fetch_add(1, Ordering::Relaxed);
        buffer.as_mut_slice().fill(value);
        Ok(FlowSuccess::Ok)
    }
}

#[test]
fn push_source_capabilities_span_three_levels() {
    let caps = capabilities!(CounterSrc);
    assert!(caps.contains(Capability::SrcStart));
    assert!(caps.contains(Capability::PushSrcAlloc));
    assert!(caps.contains(Capability::PushSrcFill));
    assert!(!caps.contains(Capability::PushSrcCreate));
    assert!(!caps.contains(Capability::SrcFill));
    assert_eq!(caps.len(), 3);
}

#[test]
fn pull_allocates_and_fills_through_the_push_slots() {
    let ty = extend!(CounterSrc).unwrap();
    assert!(ty.is_a(PushSrc::static_type()));
    assert!(ty.is_a(BaseSrc::static_type()));

    let src = ty.create::<PushSrc>(None).unwrap();
    src.set_blocksize(3);
    src.set_state(State::Paused).unwrap();

    let first = src.pull().unwrap();
    assert_eq!(first.as_slice(), &[0, 0, 0]);
    assert_eq!(first.offset(), Some(0));
    let second = src.pull().unwrap();
    assert_eq!(second.as_slice(), &[1, 1, 1]);
    assert_eq!(src.offset(), 6);

    let imp = src.imp::<CounterSrc>().unwrap();
    assert_eq!(imp.starts.load(Ordering::Relaxed), 1);
    assert_eq!(imp.allocs.load(Ordering::Relaxed), 2);
}

/// Produces whole buffers and stops after two.
#[derive(Default)]
struct TwoShotSrc {
    produced: AtomicU32,
}

impl ObjectSubclass for TwoShotSrc {
    const NAME: &'static str = "TestPushTwoShotSrc";
    type ParentType = PushSrc;

    fn new() -> Self {
        Self::default()
    }
}

impl PushSrcCreate for TwoShotSrc {
    fn create(&self, _src: &PushSrc) -> Result<Buffer, FlowError> {
        match self.produced.fetch_add(1, Ordering::Relaxed) {
            0 => Ok(Buffer::from_slice(b"ab")),
            1 => Ok(Buffer::from_slice(b"cde")),
            _ => Err(FlowError::Eos),
        }
    }
}

#[test]
fn create_replaces_alloc_and_fill() {
    let ty = extend!(TwoShotSrc).unwrap();
    let src = ty.create::<PushSrc>(None).unwrap();
    src.set_state(State::Paused).unwrap();

    assert_eq!(src.pull().unwrap().as_slice(), b"ab");
    let second = src.pull().unwrap();
    assert_eq!(second.as_slice(), b"cde");
    assert_eq!(second.offset(), Some(2));
    assert_eq!(src.pull().unwrap_err(), FlowError::Eos);
}

/// Implements nothing at the push level.
struct BarePushSrc;

impl ObjectSubclass for BarePushSrc {
    const NAME: &'static str = "TestBarePushSrc";
    type ParentType = PushSrc;

    fn new() -> Self {
        Self
    }
}

#[test]
fn push_source_without_fill_is_not_supported() {
    let ty = extend!(BarePushSrc).unwrap();
    assert!(capabilities!(BarePushSrc).is_empty());
    let src = ty.create::<Element>(None).unwrap();
    src.set_state(State::Paused).unwrap();
    let src = src.downcast_ref::<PushSrc>().unwrap();
    assert_eq!(src.pull().unwrap_err(), FlowError::NotSupported);
}
