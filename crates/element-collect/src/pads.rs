use std::cmp::Ordering;
use std::collections::VecDeque;

use element_subclass::{call_guarded, Buffer, BufferRef, FlowError, FlowSuccess};
use parking_lot::{Condvar, Mutex};

use crate::channel::{Channel, ChannelId, ChannelState, Unit};
use crate::error::CollectError;

const TARGET: &str = "element_collect";

/// A unit handed to the collect callback, together with the channel it
/// arrived on. The callback owns the buffer.
#[derive(Debug)]
pub struct Collected {
    pub channel: ChannelId,
    pub buffer: Buffer,
}

type CollectFn = Box<dyn FnMut(Option<Collected>) -> Result<FlowSuccess, FlowError> + Send>;
type CompareFn = Box<dyn Fn(&BufferRef, &BufferRef) -> Ordering + Send>;
type ClipFn = Box<dyn FnMut(ChannelId, Buffer) -> Result<Option<Buffer>, FlowError> + Send>;
type FlushFn = Box<dyn FnMut() + Send>;

/// Orders units by presentation timestamp; units without one come first.
pub fn default_compare(a: &BufferRef, b: &BufferRef) -> Ordering {
    a.pts().cmp(&b.pts())
}

enum Next {
    Idle,
    Unit { channel: ChannelId, ticket: u64, buffer: Buffer },
    Eos,
}

#[derive(Default)]
struct State {
    channels: Vec<Channel>,
    next_id: u32,
    next_ticket: u64,
    running: bool,
    flushing: bool,
    halted: Option<FlowError>,
    eos_delivered: bool,
    /// Channel errors not yet reported to a producer.
    errors: VecDeque<(ChannelId, FlowError)>,
}

impl State {
    fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.iter().find(|channel| channel.id == id)
    }

    fn channel_mut(&mut self, id: ChannelId) -> Result<&mut Channel, CollectError> {
        self.channels
            .iter_mut()
            .find(|channel| channel.id == id)
            .ok_or(CollectError::UnknownChannel(id))
    }

    fn accepting(&self, id: ChannelId) -> Result<&Channel, FlowError> {
        if let Some(err) = self.halted {
            return Err(err);
        }
        if !self.running || self.flushing {
            return Err(FlowError::Flushing);
        }
        let channel = self.channel(id).ok_or(FlowError::NotLinked)?;
        if channel.eos {
            return Err(FlowError::Eos);
        }
        Ok(channel)
    }

    fn discard_all(&mut self, result: Result<FlowSuccess, FlowError>) {
        for channel in &mut self.channels {
            channel.discard(result);
        }
    }

    fn halt(&mut self, err: FlowError) {
        self.halted = Some(err);
        self.discard_all(Err(err));
    }

    fn next(&mut self, compare: Option<&CompareFn>) -> Next {
        if !self.running || self.flushing || self.halted.is_some() {
            return Next::Idle;
        }
        if self.channels.iter().any(|channel| channel.waits() && channel.queued.is_none()) {
            return Next::Idle;
        }

        let order = |a: &BufferRef, b: &BufferRef| match compare {
            Some(compare) => call_guarded("compare callback", || compare(a, b)).unwrap_or(Ordering::Equal),
            None => default_compare(a, b),
        };
        // min_by keeps the first of equal elements, so ties go to the older channel
        let oldest = self
            .channels
            .iter()
            .enumerate()
            .filter_map(|(index, channel)| channel.queued.as_ref().map(|unit| (index, unit)))
            .min_by(|(_, a), (_, b)| order(&*a.buffer, &*b.buffer))
            .map(|(index, _)| index);

        if let Some(index) = oldest {
            let channel = &mut self.channels[index];
            if let Some(Unit { ticket, buffer }) = channel.queued.take() {
                return Next::Unit {
                    channel: channel.id,
                    ticket,
                    buffer,
                };
            }
        }

        let exhausted = self.channels.iter().all(|channel| channel.eos || channel.failed);
        if !self.channels.is_empty() && exhausted && !self.eos_delivered {
            self.eos_delivered = true;
            return Next::Eos;
        }
        Next::Idle
    }
}

/// Collects one unit per channel before invoking a single callback.
///
/// The callbacks run on whichever thread completed the set of units and must
/// not call back into the same `CollectPads`.
pub struct CollectPads {
    state: Mutex<State>,
    changed: Condvar,
    /// Serializes collection rounds.
    stream: Mutex<()>,
    collect: Mutex<Option<CollectFn>>,
    compare: Mutex<Option<CompareFn>>,
    clip: Mutex<Option<ClipFn>>,
    flush: Mutex<Option<FlushFn>>,
}

impl Default for CollectPads {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectPads {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            changed: Condvar::new(),
            stream: Mutex::new(()),
            collect: Mutex::new(None),
            compare: Mutex::new(None),
            clip: Mutex::new(None),
            flush: Mutex::new(None),
        }
    }

    /// Adds a channel. A `locked` channel holds back collection until it has
    /// data, even before it negotiated a format.
    pub fn add_channel(&self, name: &str, locked: bool) -> Result<ChannelId, CollectError> {
        let mut state = self.state.lock();
        if state.channels.iter().any(|channel| channel.name == name) {
            return Err(CollectError::DuplicateName(name.to_owned()));
        }
        let id = ChannelId(state.next_id);
        state.next_id += 1;
        state.channels.push(Channel::new(id, name.to_owned(), locked));
        log::debug!(target: TARGET, "added channel `{name}` as {id:?} (locked: {locked})");
        Ok(id)
    }

    /// Removes a channel, dropping its queued unit. A producer blocked on it
    /// returns `NotLinked`.
    pub fn remove_channel(&self, id: ChannelId) -> Result<(), CollectError> {
        {
            let mut state = self.state.lock();
            let index = state
                .channels
                .iter()
                .position(|channel| channel.id == id)
                .ok_or(CollectError::UnknownChannel(id))?;
            let channel = state.channels.remove(index);
            log::debug!(target: TARGET, "removed channel `{}`", channel.name);
            self.changed.notify_all();
        }
        self.collect_pending();
        Ok(())
    }

    pub fn set_collect_callback<F>(&self, callback: F)
    where
        F: FnMut(Option<Collected>) -> Result<FlowSuccess, FlowError> + Send + 'static,
    {
        *self.collect.lock() = Some(Box::new(callback));
    }

    pub fn set_compare_callback<F>(&self, compare: F)
    where
        F: Fn(&BufferRef, &BufferRef) -> Ordering + Send + 'static,
    {
        *self.compare.lock() = Some(Box::new(compare));
    }

    /// Runs on every arriving unit before it is queued. `Ok(None)` drops the
    /// unit; an error is returned to the producer.
    pub fn set_clip_callback<F>(&self, clip: F)
    where
        F: FnMut(ChannelId, Buffer) -> Result<Option<Buffer>, FlowError> + Send + 'static,
    {
        *self.clip.lock() = Some(Box::new(clip));
    }

    pub fn set_flush_callback<F>(&self, flush: F)
    where
        F: FnMut() + Send + 'static,
    {
        *self.flush.lock() = Some(Box::new(flush));
    }

    /// Starts accepting units. Clears a previous halt and end-of-stream.
    pub fn start(&self) -> Result<(), CollectError> {
        if self.collect.lock().is_none() {
            return Err(CollectError::NoCollectCallback);
        }
        {
            let mut state = self.state.lock();
            state.running = true;
            state.halted = None;
            state.eos_delivered = false;
            state.errors.clear();
            for channel in &mut state.channels {
                channel.eos = false;
                channel.failed = false;
                channel.completed.clear();
            }
        }
        log::debug!(target: TARGET, "started");
        self.collect_pending();
        Ok(())
    }

    /// Stops collecting. Queued units are dropped and their producers
    /// return `Flushing`.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.running = false;
        state.discard_all(Err(FlowError::Flushing));
        self.changed.notify_all();
        log::debug!(target: TARGET, "stopped");
    }

    pub fn is_started(&self) -> bool {
        self.state.lock().running
    }

    /// Queues `buffer` on channel `id` and blocks until it was collected,
    /// flushed, or the pads stopped or halted. Returns the collect
    /// callback's result for this unit. Producers sharing a channel queue
    /// one after another and each receives the result of its own unit.
    pub fn chain(&self, id: ChannelId, buffer: Buffer) -> Result<FlowSuccess, FlowError> {
        {
            let mut state = self.state.lock();
            state.accepting(id)?;
            if let Some((failed, err)) = state.errors.pop_front() {
                log::debug!(target: TARGET, "reporting error of {failed:?} to {id:?}: {err}");
                return Err(err);
            }
        }

        let buffer = match self.clip(id, buffer)? {
            Some(buffer) => buffer,
            None => return Ok(FlowSuccess::Ok),
        };

        let ticket = {
            let mut state = self.state.lock();
            while state.accepting(id)?.queued.is_some() {
                self.changed.wait(&mut state);
            }
            let ticket = state.next_ticket;
            state.next_ticket += 1;
            if let Ok(channel) = state.channel_mut(id) {
                channel.queued = Some(Unit { ticket, buffer });
            }
            ticket
        };

        self.collect_pending();
        self.wait_completed(id, ticket)
    }

    fn clip(&self, id: ChannelId, buffer: Buffer) -> Result<Option<Buffer>, FlowError> {
        let mut clip = self.clip.lock();
        match clip.as_mut() {
            Some(clip) => call_guarded("clip callback", || clip(id, buffer)).unwrap_or(Err(FlowError::Error)),
            None => Ok(Some(buffer)),
        }
    }

    fn wait_completed(&self, id: ChannelId, ticket: u64) -> Result<FlowSuccess, FlowError> {
        let mut state = self.state.lock();
        loop {
            let Ok(channel) = state.channel_mut(id) else {
                return Err(FlowError::NotLinked);
            };
            if let Some(result) = channel.completed.remove(&ticket) {
                return result;
            }
            if let Some(err) = state.halted {
                return Err(err);
            }
            self.changed.wait(&mut state);
        }
    }

    /// Marks channel `id` as finished. Its queued unit is still collected.
    pub fn end_of_stream(&self, id: ChannelId) -> Result<(), CollectError> {
        self.update(id, |channel| channel.eos = true)
    }

    /// Unlocked channels only hold back collection once negotiated.
    pub fn set_negotiated(&self, id: ChannelId) -> Result<(), CollectError> {
        self.update(id, |channel| channel.negotiated = true)
    }

    /// Lets an unlocked channel stop holding back collection. Has no effect
    /// on locked channels.
    pub fn set_waiting(&self, id: ChannelId, waiting: bool) -> Result<(), CollectError> {
        self.update(id, |channel| channel.waiting = waiting)
    }

    /// Records an I/O error of channel `id`. The channel stops holding back
    /// collection and the error is returned by the next `chain` call.
    pub fn channel_error(&self, id: ChannelId, err: FlowError) -> Result<(), CollectError> {
        {
            let mut state = self.state.lock();
            state.channel_mut(id)?.failed = true;
            state.errors.push_back((id, err));
            self.changed.notify_all();
        }
        log::warn!(target: TARGET, "channel {id:?} failed: {err}");
        self.collect_pending();
        Ok(())
    }

    fn update(&self, id: ChannelId, f: impl FnOnce(&mut Channel)) -> Result<(), CollectError> {
        {
            let mut state = self.state.lock();
            f(state.channel_mut(id)?);
            self.changed.notify_all();
        }
        self.collect_pending();
        Ok(())
    }

    /// Drops every queued unit without collecting it and runs the flush
    /// callback. Producers get `Flushing` until [`flush_stop`](Self::flush_stop).
    pub fn flush_start(&self) {
        {
            let mut state = self.state.lock();
            state.flushing = true;
            state.discard_all(Err(FlowError::Flushing));
            self.changed.notify_all();
        }
        log::debug!(target: TARGET, "flushing");
        let mut flush = self.flush.lock();
        if let Some(flush) = flush.as_mut() {
            call_guarded("flush callback", || flush());
        }
    }

    /// Ends a flush. End of stream is cleared on every channel.
    pub fn flush_stop(&self) {
        {
            let mut state = self.state.lock();
            state.flushing = false;
            state.eos_delivered = false;
            for channel in &mut state.channels {
                channel.eos = false;
            }
            self.changed.notify_all();
        }
        self.collect_pending();
    }

    pub fn channel_state(&self, id: ChannelId) -> Option<ChannelState> {
        let state = self.state.lock();
        let flushing = state.flushing;
        state.channel(id).map(|channel| channel.state(flushing))
    }

    pub fn is_eos(&self, id: ChannelId) -> Option<bool> {
        self.state.lock().channel(id).map(|channel| channel.eos)
    }

    /// Units currently queued on channel `id`.
    pub fn queued(&self, id: ChannelId) -> usize {
        let state = self.state.lock();
        state.channel(id).map_or(0, |channel| usize::from(channel.queued.is_some()))
    }

    pub fn channel_name(&self, id: ChannelId) -> Option<String> {
        self.state.lock().channel(id).map(|channel| channel.name.clone())
    }

    pub fn channels(&self) -> Vec<ChannelId> {
        self.state.lock().channels.iter().map(|channel| channel.id).collect()
    }

    /// Runs collection rounds until no channel set is complete.
    fn collect_pending(&self) {
        let _stream = self.stream.lock();
        loop {
            let mut collect = self.collect.lock();
            let next = {
                let compare = self.compare.lock();
                self.state.lock().next(compare.as_ref())
            };
            let (unit, origin) = match next {
                Next::Idle => return,
                Next::Unit { channel, ticket, buffer } => {
                    log::trace!(target: TARGET, "collecting unit {ticket} of {channel:?}");
                    (Some(Collected { channel, buffer }), Some((channel, ticket)))
                }
                Next::Eos => {
                    log::debug!(target: TARGET, "all channels finished");
                    (None, None)
                }
            };
            let result = match collect.as_mut() {
                Some(callback) => call_guarded("collect callback", || callback(unit)).unwrap_or(Err(FlowError::Error)),
                None => {
                    log::error!(target: TARGET, "no collect callback installed");
                    Err(FlowError::Error)
                }
            };
            drop(collect);

            let mut state = self.state.lock();
            if let Some((channel, ticket)) = origin {
                if let Ok(channel) = state.channel_mut(channel) {
                    channel.completed.insert(ticket, result);
                }
            }
            self.changed.notify_all();
            if let Err(err) = result {
                log::error!(target: TARGET, "collect callback failed, halting: {err}");
                state.halt(err);
                return;
            }
        }
    }
}
