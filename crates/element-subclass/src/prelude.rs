//! Traits needed to write and drive a subclass.
//!
//! ```ignore
//! use element_subclass::prelude::*;
//! ```

pub use crate::base_sink::{
    BaseSinkExt, BaseSinkParent, SinkEvent, SinkPreroll, SinkQuery, SinkRender, SinkSetCaps, SinkStart, SinkStop,
    SinkUnlock, SinkUnlockStop,
};
pub use crate::base_src::{
    BaseSrcExt, BaseSrcParent, SrcAlloc, SrcCreate, SrcDoSeek, SrcEvent, SrcFill, SrcGetSize, SrcIsSeekable, SrcQuery,
    SrcStart, SrcStop, SrcUnlock, SrcUnlockStop,
};
pub use crate::base_transform::{
    BaseTransformExt, BaseTransformParent, Transform, TransformIp, TransformSetCaps, TransformSinkEvent, TransformSize,
    TransformStart, TransformStop,
};
pub use crate::element::{ChangeState, ElementExt, ElementParent, ElementQuery, SendEvent};
pub use crate::interface::TypeInit;
pub use crate::object::{Constructed, GetProperty, ObjectExt, ObjectParent, SetProperty};
pub use crate::pad_template::PadTemplateExt;
pub use crate::push_src::{PushSrcAlloc, PushSrcCreate, PushSrcFill, PushSrcParent};
pub use crate::subclass::{ClassBuilder, Extendable, ObjectSubclass};
pub use crate::types::{IsA, ObjectType};
pub use crate::uri_handler::{UriHandlerExt, UriHandlerImpl};
pub use crate::value::FromValue;
