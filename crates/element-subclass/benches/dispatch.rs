use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use element_subclass::prelude::*;
use element_subclass::{extend, BaseSink, Buffer, BufferRef, FlowError, FlowSuccess, Registry, State};
use rand::seq::SliceRandom;

struct NullSink;

impl ObjectSubclass for NullSink {
    const NAME: &'static str = "BenchNullSink";
    type ParentType = BaseSink;

    fn new() -> Self {
        Self
    }
}

impl SinkRender for NullSink {
    fn render(&self, _sink: &BaseSink, buffer: &BufferRef) -> Result<FlowSuccess, FlowError> {
        black_box(buffer.size());
        Ok(FlowSuccess::Ok)
    }
}

fn bench_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry");
    let registry = Registry::new(16);
    let mut handles: Vec<_> = (0..4096u32).map(|i| registry.register(Arc::new(i)).expect("register")).collect();
    handles.shuffle(&mut rand::thread_rng());

    group.bench_function("resolve_4096_live", |b| {
        let mut next = 0;
        b.iter(|| {
            next = (next + 1) % handles.len();
            black_box(registry.resolve(handles[next]).expect("resolve"));
        })
    });
    group.bench_function("register_release", |b| {
        b.iter(|| {
            let handle = registry.register(Arc::new(0u32)).expect("register");
            black_box(registry.release(handle).expect("release"));
        })
    });
    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let ty = extend!(NullSink).expect("extend");
    let sink = ty.create::<BaseSink>(None).expect("create");
    sink.set_state(State::Playing).expect("state");

    c.bench_function("sink chain 256 bytes", |b| {
        b.iter(|| {
            let _ = black_box(sink.chain(Buffer::with_size(256)));
        })
    });
}

criterion_group!(benches, bench_registry, bench_dispatch);
criterion_main!(benches);
