#![allow(non_camel_case_types)]
#![allow(clippy::missing_safety_doc)]

//! Raw C ABI of the element object framework.
//!
//! Every item in this crate follows the foreign calling convention: `#[repr(C)]`
//! class and instance structs, `unsafe extern "C"` entry points and virtual
//! method slots stored as `Option<unsafe extern "C" fn ..>`. The crate also
//! carries the reference runtime behind that ABI (type and interface
//! registration, instance lifecycle, refcounted mini objects and the element
//! base classes) so the extension framework can be driven without a system
//! library.

mod base_sink;
mod base_src;
mod base_transform;
mod element;
mod interface;
mod mini;
mod object;
mod push_src;
mod sync;
mod types;
mod uri_handler;
mod value;

pub use base_sink::*;
pub use base_src::*;
pub use base_transform::*;
pub use element::*;
pub use interface::*;
pub use mini::*;
pub use object::*;
pub use push_src::*;
pub use sync::*;
pub use types::*;
pub use uri_handler::*;
pub use value::*;

/// Nanosecond clock time; [`EL_CLOCK_TIME_NONE`] marks an unknown time.
pub type el_clock_time = u64;

pub const EL_CLOCK_TIME_NONE: el_clock_time = u64::MAX;
pub const EL_BUFFER_OFFSET_NONE: u64 = u64::MAX;

/// Result of a data-flow virtual method.
pub type el_flow_return = i32;

pub const EL_FLOW_CUSTOM_SUCCESS: el_flow_return = 100;
pub const EL_FLOW_OK: el_flow_return = 0;
pub const EL_FLOW_NOT_LINKED: el_flow_return = -1;
pub const EL_FLOW_FLUSHING: el_flow_return = -2;
pub const EL_FLOW_EOS: el_flow_return = -3;
pub const EL_FLOW_NOT_NEGOTIATED: el_flow_return = -4;
pub const EL_FLOW_ERROR: el_flow_return = -5;
pub const EL_FLOW_NOT_SUPPORTED: el_flow_return = -6;
pub const EL_FLOW_CUSTOM_ERROR: el_flow_return = -100;

/// C boolean as used by the base class tables.
pub type el_boolean = i32;

pub const EL_TRUE: el_boolean = 1;
pub const EL_FALSE: el_boolean = 0;

#[inline]
pub fn el_boolean_from(value: bool) -> el_boolean {
    if value {
        EL_TRUE
    } else {
        EL_FALSE
    }
}
