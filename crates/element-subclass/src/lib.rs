//! Extend the element base classes with Rust types.
//!
//! A host type implements [`ObjectSubclass`] plus any of the single-method
//! capability traits of its base level ([`SinkRender`](base_sink::SinkRender),
//! [`SrcGetSize`](base_src::SrcGetSize), ...). [`extend!`] detects those
//! traits at the call site and registers a runtime subclass whose class table
//! routes only the implemented slots into Rust; every other slot keeps the
//! parent's behavior.
//!
//! ```ignore
//! use element_subclass::prelude::*;
//! use element_subclass::{extend, BaseSink, BufferRef, FlowError, FlowSuccess};
//!
//! #[derive(Default)]
//! struct Counter(std::sync::atomic::AtomicU64);
//!
//! impl ObjectSubclass for Counter {
//!     const NAME: &'static str = "Counter";
//!     type ParentType = BaseSink;
//!     fn new() -> Self {
//!         Self::default()
//!     }
//! }
//!
//! impl SinkRender for Counter {
//!     fn render(&self, _sink: &BaseSink, buffer: &BufferRef) -> Result<FlowSuccess, FlowError> {
//!         self.0.fetch_add(buffer.size() as u64, std::sync::atomic::Ordering::Relaxed);
//!         Ok(FlowSuccess::Ok)
//!     }
//! }
//!
//! let ty = extend!(Counter)?;
//! ```

pub use element_sys as sys;

pub mod base_sink;
pub mod base_src;
pub mod base_transform;
pub mod buffer;
pub mod capability;
pub mod caps;
pub mod clock;
pub mod config;
pub mod element;
pub mod error;
pub mod event;
pub mod flow;
pub mod interface;
mod mini;
pub mod object;
pub mod pad_template;
pub mod prelude;
pub mod push_src;
pub mod query;
pub mod registry;
pub mod subclass;
mod trampoline;
pub mod types;
pub mod uri_handler;
pub mod value;

pub use base_sink::{BaseSink, PrerollGuard};
pub use base_src::BaseSrc;
pub use base_transform::{BaseTransform, PadDirection};
pub use buffer::{Buffer, BufferRef};
pub use capability::{Capability, CapabilitySet, Overrides};
pub use caps::{Caps, CapsRef};
pub use clock::ClockTime;
pub use config::{config, configure, ResolveFailurePolicy, SubclassConfig};
pub use element::{
    element_factory_make, element_metadata, Element, State, StateChange, StateChangeError, StateChangeSuccess,
};
pub use error::{ConfigError, MarshalError, RegistrationError, RegistryFull, ResolveError, UriError};
pub use event::{Event, EventRef, EventType};
pub use flow::{flow_from_raw, flow_into_raw, FlowError, FlowSuccess};
pub use interface::{Interface, IsImplementable, TypeInit};
pub use object::Object;
pub use pad_template::{element_pad_template, element_pad_templates, PadPresence, PadTemplate};
pub use push_src::PushSrc;
pub use query::{Query, QueryRef, QueryType};
pub use registry::{registry, Handle, HostValue, Registry};
pub use subclass::{
    extend, parent_class, type_data, ClassBuilder, Extendable, ExtensionDescriptor, ObjectSubclass, TypeData,
};
pub use trampoline::call_guarded;
pub use types::{Borrowed, IsA, ObjectType, Type, TypeQuery};
pub use uri_handler::{UriHandler, UriType};
pub use value::{FromValue, ParamFlags, ParamSpec, Value, ValueType};
