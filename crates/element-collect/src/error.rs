use thiserror::Error;

use crate::channel::ChannelId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollectError {
    #[error("unknown channel {0:?}")]
    UnknownChannel(ChannelId),
    #[error("a channel named `{0}` already exists")]
    DuplicateName(String),
    #[error("no collect callback installed")]
    NoCollectCallback,
}
