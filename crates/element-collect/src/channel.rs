use std::collections::HashMap;
use std::fmt;

use element_subclass::{Buffer, FlowError, FlowSuccess};

/// Identifies a channel for the lifetime of its [`CollectPads`](crate::CollectPads).
/// Ids are never reused, so they also give the order channels were added in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub(crate) u32);

impl fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelId({})", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    WaitingForData,
    DataQueued,
    Flushing,
}

pub(crate) struct Unit {
    pub(crate) ticket: u64,
    pub(crate) buffer: Buffer,
}

pub(crate) struct Channel {
    pub(crate) id: ChannelId,
    pub(crate) name: String,
    pub(crate) locked: bool,
    pub(crate) negotiated: bool,
    pub(crate) waiting: bool,
    pub(crate) eos: bool,
    pub(crate) failed: bool,
    pub(crate) queued: Option<Unit>,
    /// Outcomes of units that left the queue, by ticket, until their
    /// producer picks them up.
    pub(crate) completed: HashMap<u64, Result<FlowSuccess, FlowError>>,
}

impl Channel {
    pub(crate) fn new(id: ChannelId, name: String, locked: bool) -> Self {
        Self {
            id,
            name,
            locked,
            negotiated: false,
            waiting: true,
            eos: false,
            failed: false,
            queued: None,
            completed: HashMap::new(),
        }
    }

    /// Whether collection has to wait for this channel.
    pub(crate) fn waits(&self) -> bool {
        if self.eos || self.failed {
            return false;
        }
        self.locked || (self.negotiated && self.waiting)
    }

    pub(crate) fn state(&self, flushing: bool) -> ChannelState {
        if flushing {
            ChannelState::Flushing
        } else if self.queued.is_some() {
            ChannelState::DataQueued
        } else {
            ChannelState::WaitingForData
        }
    }

    /// Drops the queued unit and completes its producer with `result`.
    pub(crate) fn discard(&mut self, result: Result<FlowSuccess, FlowError>) {
        if let Some(unit) = self.queued.take() {
            self.completed.insert(unit.ticket, result);
        }
    }
}
