//! Synchronizes several input channels in front of one consumer.
//!
//! Producers push units with [`CollectPads::chain`] and block until the unit
//! was handed to the collect callback, flushed, or the pads stopped. Once
//! every waiting channel has a unit queued, the oldest unit according to the
//! comparator is collected. When every channel reached end of stream and
//! nothing is left, the callback sees `None` exactly once.
//!
//! ```ignore
//! let pads = Arc::new(CollectPads::new());
//! let left = pads.add_channel("left", true)?;
//! let right = pads.add_channel("right", true)?;
//! pads.set_collect_callback(|unit| {
//!     match unit {
//!         Some(Collected { channel, buffer }) => mix(channel, buffer),
//!         None => finish(),
//!     }
//!     Ok(FlowSuccess::Ok)
//! });
//! pads.start()?;
//! ```

mod channel;
mod error;
mod pads;

pub use channel::{ChannelId, ChannelState};
pub use error::CollectError;
pub use pads::{default_compare, Collected, CollectPads};
