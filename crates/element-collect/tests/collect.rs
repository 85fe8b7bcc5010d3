use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use element_collect::{ChannelId, ChannelState, CollectError, CollectPads, Collected};
use element_subclass::{Buffer, ClockTime, FlowError, FlowSuccess};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

type Log = Arc<Mutex<Vec<Option<(ChannelId, Option<ClockTime>)>>>>;

fn recording_pads() -> (Arc<CollectPads>, Log) {
    let pads = Arc::new(CollectPads::new());
    let log: Log = Arc::default();
    let sink = Arc::clone(&log);
    pads.set_collect_callback(move |unit| {
        sink.lock().push(unit.map(|Collected { channel, buffer }| (channel, buffer.pts())));
        Ok(FlowSuccess::Ok)
    });
    (pads, log)
}

fn unit(ms: u64) -> Buffer {
    let mut buffer = Buffer::with_size(4);
    buffer.make_mut().set_pts(Some(ClockTime::from_mseconds(ms)));
    buffer
}

fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}

fn producer(pads: &Arc<CollectPads>, id: ChannelId, times: Vec<u64>) -> thread::JoinHandle<Vec<Result<FlowSuccess, FlowError>>> {
    let pads = Arc::clone(pads);
    thread::spawn(move || {
        let results = times.into_iter().map(|ms| pads.chain(id, unit(ms))).collect();
        pads.end_of_stream(id).unwrap();
        results
    })
}

#[test]
fn units_are_collected_oldest_first_then_eos_once() {
    let (pads, log) = recording_pads();
    let a = pads.add_channel("a", true).unwrap();
    let b = pads.add_channel("b", true).unwrap();
    pads.start().unwrap();

    let first = producer(&pads, a, vec![10, 30]);
    let second = producer(&pads, b, vec![20, 40]);
    assert_eq!(first.join().unwrap(), vec![Ok(FlowSuccess::Ok); 2]);
    assert_eq!(second.join().unwrap(), vec![Ok(FlowSuccess::Ok); 2]);

    let ms = |ms| Some(ClockTime::from_mseconds(ms));
    assert_eq!(
        *log.lock(),
        vec![Some((a, ms(10))), Some((b, ms(20))), Some((a, ms(30))), Some((b, ms(40))), None]
    );

    // further state changes never repeat the end of stream
    pads.set_waiting(a, false).unwrap();
    assert_eq!(log.lock().len(), 5);
    assert_eq!(pads.chain(a, unit(50)), Err(FlowError::Eos));
}

#[test]
fn missing_timestamps_go_first_and_ties_keep_channel_order() {
    let (pads, log) = recording_pads();
    let a = pads.add_channel("a", true).unwrap();
    let b = pads.add_channel("b", true).unwrap();
    let c = pads.add_channel("c", true).unwrap();
    pads.start().unwrap();

    let pushing_a = producer(&pads, a, vec![5]);
    let pushing_b = producer(&pads, b, vec![5]);
    wait_until("two queued units", || pads.queued(a) + pads.queued(b) == 2);
    assert!(log.lock().is_empty());
    assert_eq!(pads.channel_state(a), Some(ChannelState::DataQueued));

    let untimed = {
        let pads = Arc::clone(&pads);
        thread::spawn(move || {
            let result = pads.chain(c, Buffer::with_size(1));
            pads.end_of_stream(c).unwrap();
            result
        })
    };
    assert_eq!(untimed.join().unwrap(), Ok(FlowSuccess::Ok));
    pushing_a.join().unwrap();
    pushing_b.join().unwrap();

    let ms = Some(ClockTime::from_mseconds(5));
    assert_eq!(*log.lock(), vec![Some((c, None)), Some((a, ms)), Some((b, ms)), None]);
}

#[test]
fn custom_comparator_decides_the_order() {
    let (pads, log) = recording_pads();
    pads.set_compare_callback(|x, y| y.pts().cmp(&x.pts()));
    let a = pads.add_channel("a", true).unwrap();
    let b = pads.add_channel("b", true).unwrap();
    pads.start().unwrap();

    let pushing_a = producer(&pads, a, vec![1]);
    let pushing_b = producer(&pads, b, vec![2]);
    pushing_a.join().unwrap();
    pushing_b.join().unwrap();

    let order: Vec<_> = log.lock().iter().map(|entry| entry.map(|(channel, _)| channel)).collect();
    assert_eq!(order, vec![Some(b), Some(a), None]);
}

#[test]
fn flush_discards_without_collecting() {
    let (pads, log) = recording_pads();
    let flushed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&flushed);
    pads.set_flush_callback(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let a = pads.add_channel("a", true).unwrap();
    let _b = pads.add_channel("b", true).unwrap();
    pads.start().unwrap();

    let disposed = Arc::new(AtomicUsize::new(0));
    let mut buffer = unit(1);
    let notify = Arc::clone(&disposed);
    assert!(buffer.set_dispose_notify(move || {
        notify.fetch_add(1, Ordering::SeqCst);
    }));

    let blocked = {
        let pads = Arc::clone(&pads);
        thread::spawn(move || pads.chain(a, buffer))
    };
    wait_until("queued unit", || pads.queued(a) == 1);

    pads.flush_start();
    assert_eq!(blocked.join().unwrap(), Err(FlowError::Flushing));
    assert_eq!(disposed.load(Ordering::SeqCst), 1);
    assert_eq!(flushed.load(Ordering::SeqCst), 1);
    assert_eq!(pads.channel_state(a), Some(ChannelState::Flushing));
    assert_eq!(pads.chain(a, unit(2)), Err(FlowError::Flushing));

    pads.flush_stop();
    assert_eq!(pads.channel_state(a), Some(ChannelState::WaitingForData));
    assert_eq!(pads.queued(a), 0);
    assert!(log.lock().is_empty());
}

#[test]
fn clip_drops_and_trims_arriving_units() {
    let pads = Arc::new(CollectPads::new());
    let sizes = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&sizes);
    pads.set_collect_callback(move |unit| {
        if let Some(unit) = unit {
            seen.lock().push(unit.buffer.size());
        }
        Ok(FlowSuccess::Ok)
    });
    pads.set_clip_callback(|_channel, buffer| {
        let Some(pts) = buffer.pts() else {
            return Ok(None);
        };
        if pts > ClockTime::SECOND {
            return Err(FlowError::Eos);
        }
        Ok(Some(Buffer::from_slice(&buffer.as_slice()[..2])))
    });
    let a = pads.add_channel("a", true).unwrap();
    pads.start().unwrap();

    assert_eq!(pads.chain(a, Buffer::with_size(8)), Ok(FlowSuccess::Ok));
    assert_eq!(pads.chain(a, unit(10)), Ok(FlowSuccess::Ok));
    assert_eq!(pads.chain(a, unit(2_000)), Err(FlowError::Eos));
    assert_eq!(*sizes.lock(), vec![2]);
}

#[test]
fn callback_errors_halt_every_channel() {
    let pads = Arc::new(CollectPads::new());
    pads.set_collect_callback(|_| Err(FlowError::NotNegotiated));
    let a = pads.add_channel("a", true).unwrap();
    let b = pads.add_channel("b", false).unwrap();
    pads.start().unwrap();

    assert_eq!(pads.chain(a, unit(1)), Err(FlowError::NotNegotiated));
    assert_eq!(pads.chain(a, unit(2)), Err(FlowError::NotNegotiated));
    assert_eq!(pads.chain(b, unit(2)), Err(FlowError::NotNegotiated));

    pads.set_collect_callback(|_| Ok(FlowSuccess::Ok));
    pads.start().unwrap();
    assert_eq!(pads.chain(a, unit(3)), Ok(FlowSuccess::Ok));
}

#[test]
fn panicking_callback_becomes_an_error() {
    let pads = Arc::new(CollectPads::new());
    pads.set_collect_callback(|_| panic!("collect exploded"));
    let a = pads.add_channel("a", true).unwrap();
    pads.start().unwrap();
    assert_eq!(pads.chain(a, unit(1)), Err(FlowError::Error));
}

#[test]
fn channel_errors_surface_on_the_next_attempt() {
    let (pads, log) = recording_pads();
    let a = pads.add_channel("a", true).unwrap();
    let b = pads.add_channel("b", true).unwrap();
    pads.start().unwrap();

    pads.channel_error(b, FlowError::Error).unwrap();
    assert_eq!(pads.chain(a, unit(1)), Err(FlowError::Error));
    // b no longer holds back collection
    assert_eq!(pads.chain(a, unit(2)), Ok(FlowSuccess::Ok));
    assert_eq!(*log.lock(), vec![Some((a, Some(ClockTime::from_mseconds(2))))]);
}

#[test]
fn unlocked_channels_wait_once_negotiated() {
    let (pads, log) = recording_pads();
    let a = pads.add_channel("a", true).unwrap();
    let b = pads.add_channel("b", false).unwrap();
    pads.start().unwrap();

    assert_eq!(pads.chain(a, unit(1)), Ok(FlowSuccess::Ok));
    pads.set_negotiated(b).unwrap();

    let blocked = {
        let pads = Arc::clone(&pads);
        thread::spawn(move || pads.chain(a, unit(2)))
    };
    wait_until("queued unit", || pads.queued(a) == 1);
    assert_eq!(log.lock().len(), 1);

    pads.set_waiting(b, false).unwrap();
    assert_eq!(blocked.join().unwrap(), Ok(FlowSuccess::Ok));
    assert_eq!(log.lock().len(), 2);
}

#[test]
fn removing_channels_unblocks_collection() {
    let (pads, log) = recording_pads();
    let a = pads.add_channel("a", true).unwrap();
    let b = pads.add_channel("b", true).unwrap();
    pads.start().unwrap();

    let blocked = {
        let pads = Arc::clone(&pads);
        thread::spawn(move || pads.chain(a, unit(1)))
    };
    wait_until("queued unit", || pads.queued(a) == 1);
    pads.remove_channel(b).unwrap();
    assert_eq!(blocked.join().unwrap(), Ok(FlowSuccess::Ok));
    assert_eq!(log.lock().len(), 1);
    assert_eq!(pads.channels(), vec![a]);

    // a late channel joins a running collection
    let c = pads.add_channel("c", true).unwrap();
    let blocked = {
        let pads = Arc::clone(&pads);
        thread::spawn(move || pads.chain(a, unit(2)))
    };
    wait_until("queued unit", || pads.queued(a) == 1);
    pads.remove_channel(a).unwrap();
    assert_eq!(blocked.join().unwrap(), Err(FlowError::NotLinked));
    assert_eq!(pads.channel_name(c).as_deref(), Some("c"));
}

#[test]
fn misuse_is_reported() {
    let pads = CollectPads::new();
    let a = pads.add_channel("a", true).unwrap();
    assert_eq!(pads.add_channel("a", false), Err(CollectError::DuplicateName("a".to_owned())));
    assert_eq!(pads.start(), Err(CollectError::NoCollectCallback));
    assert_eq!(pads.chain(a, unit(1)), Err(FlowError::Flushing));

    pads.remove_channel(a).unwrap();
    assert_eq!(pads.remove_channel(a), Err(CollectError::UnknownChannel(a)));
    assert_eq!(pads.end_of_stream(a), Err(CollectError::UnknownChannel(a)));
    assert_eq!(pads.channel_state(a), None);
}

#[test]
fn stop_releases_blocked_producers() {
    let (pads, _log) = recording_pads();
    let a = pads.add_channel("a", true).unwrap();
    let _b = pads.add_channel("b", true).unwrap();
    pads.start().unwrap();

    let blocked = {
        let pads = Arc::clone(&pads);
        thread::spawn(move || pads.chain(a, unit(1)))
    };
    wait_until("queued unit", || pads.queued(a) == 1);
    pads.stop();
    assert_eq!(blocked.join().unwrap(), Err(FlowError::Flushing));
    assert!(!pads.is_started());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Sorted per-channel inputs come out as one sorted stream followed by a
    /// single end of stream.
    #[test]
    fn collection_merges_sorted_channels(
        inputs in prop::collection::vec(prop::collection::vec(0u64..1_000, 0..6), 1..4)
    ) {
        let (pads, log) = recording_pads();
        let producers: Vec<_> = inputs
            .iter()
            .enumerate()
            .map(|(index, times)| {
                let id = pads.add_channel(&format!("in{index}"), true).unwrap();
                let mut times = times.clone();
                times.sort_unstable();
                (id, times)
            })
            .collect();
        pads.start().unwrap();

        let handles: Vec<_> = producers.into_iter().map(|(id, times)| producer(&pads, id, times)).collect();
        for handle in handles {
            prop_assert!(handle.join().unwrap().iter().all(Result::is_ok));
        }

        let log = log.lock();
        let collected: Vec<u64> = log
            .iter()
            .flatten()
            .map(|(_, pts)| pts.map_or(0, |pts| pts.mseconds()))
            .collect();
        let mut expected: Vec<u64> = inputs.iter().flatten().copied().collect();
        expected.sort_unstable();
        prop_assert_eq!(collected, expected);
        prop_assert_eq!(log.iter().filter(|entry| entry.is_none()).count(), 1);
        prop_assert!(log.last().map_or(false, Option::is_none));
    }
}

#[test]
fn producers_sharing_a_channel_each_get_their_result() {
    let (pads, log) = recording_pads();
    let a = pads.add_channel("a", true).unwrap();
    pads.start().unwrap();

    let producers: Vec<_> = (0..4u64)
        .map(|n| {
            let pads = Arc::clone(&pads);
            thread::spawn(move || (0..50).map(|ms| pads.chain(a, unit(n * 1000 + ms))).collect::<Vec<_>>())
        })
        .collect();
    for producer in producers {
        assert_eq!(producer.join().unwrap(), vec![Ok(FlowSuccess::Ok); 50]);
    }
    assert_eq!(log.lock().len(), 200);
}
