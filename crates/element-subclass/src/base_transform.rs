//! Filter base class: one buffer in, one buffer out.

use std::ffi::c_void;
use std::ptr;

use element_sys as sys;

use crate::buffer::{Buffer, BufferRef};
use crate::caps::CapsRef;
use crate::capability::{patch_slots, Overrides};
use crate::element::Element;
use crate::event::Event;
use crate::flow::{flow_from_raw, flow_into_raw, FlowError, FlowSuccess};
use crate::object::Object;
use crate::subclass::{parent_class, Extendable, ObjectSubclass};
use crate::trampoline::{check_parent, guard, report};
use crate::types::{IsA, ObjectType, Type};

crate::object_wrapper!(
    pub struct BaseTransform(sys::el_base_transform) @type sys::el_base_transform_get_type(),
    @extends Element, Object
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PadDirection {
    Unknown,
    Src,
    Sink,
}

impl PadDirection {
    pub fn from_raw(raw: sys::el_pad_direction) -> Self {
        match raw {
            sys::EL_PAD_SRC => PadDirection::Src,
            sys::EL_PAD_SINK => PadDirection::Sink,
            _ => PadDirection::Unknown,
        }
    }

    pub fn into_raw(self) -> sys::el_pad_direction {
        match self {
            PadDirection::Unknown => sys::EL_PAD_UNKNOWN,
            PadDirection::Src => sys::EL_PAD_SRC,
            PadDirection::Sink => sys::EL_PAD_SINK,
        }
    }
}

macro_rules! transform_capability {
    ($(#[$attr:meta])* $name:ident { $($method:tt)* }) => {
        $(#[$attr])*
        pub trait $name: ObjectSubclass
        where
            <Self as ObjectSubclass>::ParentType: IsA<BaseTransform>,
        {
            $($method)*
        }
    };
}

transform_capability!(TransformStart { fn start(&self, trans: &BaseTransform) -> anyhow::Result<()>; });
transform_capability!(TransformStop { fn stop(&self, trans: &BaseTransform) -> anyhow::Result<()>; });
transform_capability!(TransformSetCaps {
    fn set_caps(&self, trans: &BaseTransform, incaps: &CapsRef, outcaps: &CapsRef) -> anyhow::Result<()>;
});
transform_capability!(
    /// Size on the other pad for `size` bytes on `direction`. `None` fails
    /// the buffer.
    TransformSize {
        fn transform_size(&self, trans: &BaseTransform, direction: PadDirection, size: usize) -> Option<usize>;
    }
);
transform_capability!(
    /// Copying transform into a freshly allocated output of the size
    /// reported by `transform_size`.
    Transform {
        fn transform(
            &self,
            trans: &BaseTransform,
            inbuf: &BufferRef,
            outbuf: &mut BufferRef,
        ) -> Result<FlowSuccess, FlowError>;
    }
);
transform_capability!(
    /// In-place transform on a writable buffer.
    TransformIp {
        fn transform_ip(&self, trans: &BaseTransform, buffer: &mut BufferRef) -> Result<FlowSuccess, FlowError>;
    }
);
transform_capability!(TransformSinkEvent { fn sink_event(&self, trans: &BaseTransform, event: Event) -> bool; });

pub(crate) unsafe extern "C" fn start<T: TransformStart>(trans: *mut sys::el_base_transform) -> sys::el_boolean
where
    T::ParentType: IsA<BaseTransform>,
{
    let wrapper = BaseTransform::from_raw_borrow(trans);
    guard::<T, _>(trans.cast(), "start", sys::EL_FALSE, |imp| {
        report::<T>("start", TransformStart::start(imp, &wrapper))
    })
}

pub(crate) unsafe extern "C" fn stop<T: TransformStop>(trans: *mut sys::el_base_transform) -> sys::el_boolean
where
    T::ParentType: IsA<BaseTransform>,
{
    let wrapper = BaseTransform::from_raw_borrow(trans);
    guard::<T, _>(trans.cast(), "stop", sys::EL_FALSE, |imp| report::<T>("stop", TransformStop::stop(imp, &wrapper)))
}

pub(crate) unsafe extern "C" fn set_caps<T: TransformSetCaps>(
    trans: *mut sys::el_base_transform,
    incaps: *mut sys::el_caps,
    outcaps: *mut sys::el_caps,
) -> sys::el_boolean
where
    T::ParentType: IsA<BaseTransform>,
{
    if incaps.is_null() || outcaps.is_null() {
        return sys::EL_FALSE;
    }
    let wrapper = BaseTransform::from_raw_borrow(trans);
    let (incaps, outcaps) = (CapsRef::from_ptr(incaps), CapsRef::from_ptr(outcaps));
    guard::<T, _>(trans.cast(), "set_caps", sys::EL_FALSE, |imp| {
        report::<T>("set_caps", TransformSetCaps::set_caps(imp, &wrapper, incaps, outcaps))
    })
}

pub(crate) unsafe extern "C" fn transform_size<T: TransformSize>(
    trans: *mut sys::el_base_transform,
    direction: sys::el_pad_direction,
    size: usize,
    othersize: *mut usize,
) -> sys::el_boolean
where
    T::ParentType: IsA<BaseTransform>,
{
    if othersize.is_null() {
        return sys::EL_FALSE;
    }
    let wrapper = BaseTransform::from_raw_borrow(trans);
    let direction = PadDirection::from_raw(direction);
    match guard::<T, _>(trans.cast(), "transform_size", None, |imp| {
        TransformSize::transform_size(imp, &wrapper, direction, size)
    }) {
        Some(other) => {
            *othersize = other;
            sys::EL_TRUE
        }
        None => sys::EL_FALSE,
    }
}

pub(crate) unsafe extern "C" fn transform<T: Transform>(
    trans: *mut sys::el_base_transform,
    inbuf: *mut sys::el_buffer,
    outbuf: *mut sys::el_buffer,
) -> sys::el_flow_return
where
    T::ParentType: IsA<BaseTransform>,
{
    if inbuf.is_null() || outbuf.is_null() {
        return sys::EL_FLOW_ERROR;
    }
    let wrapper = BaseTransform::from_raw_borrow(trans);
    let (inbuf, outbuf) = (BufferRef::from_ptr(inbuf), BufferRef::from_mut_ptr(outbuf));
    flow_into_raw(guard::<T, _>(trans.cast(), "transform", Err(FlowError::Error), |imp| {
        Transform::transform(imp, &wrapper, inbuf, outbuf)
    }))
}

pub(crate) unsafe extern "C" fn transform_ip<T: TransformIp>(
    trans: *mut sys::el_base_transform,
    buffer: *mut sys::el_buffer,
) -> sys::el_flow_return
where
    T::ParentType: IsA<BaseTransform>,
{
    if buffer.is_null() {
        return sys::EL_FLOW_ERROR;
    }
    let wrapper = BaseTransform::from_raw_borrow(trans);
    let buffer = BufferRef::from_mut_ptr(buffer);
    flow_into_raw(guard::<T, _>(trans.cast(), "transform_ip", Err(FlowError::Error), |imp| {
        TransformIp::transform_ip(imp, &wrapper, buffer)
    }))
}

pub(crate) unsafe extern "C" fn sink_event<T: TransformSinkEvent>(
    trans: *mut sys::el_base_transform,
    event: *mut sys::el_event,
) -> sys::el_boolean
where
    T::ParentType: IsA<BaseTransform>,
{
    let Some(event) = Event::from_raw_full(event) else {
        return sys::EL_FALSE;
    };
    let wrapper = BaseTransform::from_raw_borrow(trans);
    sys::el_boolean_from(guard::<T, _>(trans.cast(), "sink_event", false, |imp| {
        TransformSinkEvent::sink_event(imp, &wrapper, event)
    }))
}

unsafe fn transform_parent<T: ObjectSubclass>() -> &'static sys::el_base_transform_class {
    &*parent_class::<T, sys::el_base_transform_class>()
}

pub trait BaseTransformParent: ObjectSubclass
where
    <Self as ObjectSubclass>::ParentType: IsA<BaseTransform>,
{
    fn parent_start(&self, trans: &BaseTransform) -> anyhow::Result<()> {
        unsafe {
            match transform_parent::<Self>().start {
                Some(start) => check_parent("start", start(trans.as_ptr())),
                None => Ok(()),
            }
        }
    }

    fn parent_stop(&self, trans: &BaseTransform) -> anyhow::Result<()> {
        unsafe {
            match transform_parent::<Self>().stop {
                Some(stop) => check_parent("stop", stop(trans.as_ptr())),
                None => Ok(()),
            }
        }
    }

    fn parent_set_caps(&self, trans: &BaseTransform, incaps: &CapsRef, outcaps: &CapsRef) -> anyhow::Result<()> {
        unsafe {
            match transform_parent::<Self>().set_caps {
                Some(set_caps) => check_parent(
                    "set_caps",
                    set_caps(trans.as_ptr(), incaps.as_ptr() as *mut _, outcaps.as_ptr() as *mut _),
                ),
                None => Ok(()),
            }
        }
    }

    /// Same size when the parent does not resize.
    fn parent_transform_size(&self, trans: &BaseTransform, direction: PadDirection, size: usize) -> Option<usize> {
        unsafe {
            let Some(transform_size) = transform_parent::<Self>().transform_size else {
                return Some(size);
            };
            let mut other = size;
            (transform_size(trans.as_ptr(), direction.into_raw(), size, &mut other) != sys::EL_FALSE).then_some(other)
        }
    }

    fn parent_transform(
        &self,
        trans: &BaseTransform,
        inbuf: &BufferRef,
        outbuf: &mut BufferRef,
    ) -> Result<FlowSuccess, FlowError> {
        unsafe {
            match transform_parent::<Self>().transform {
                Some(transform) => flow_from_raw(transform(trans.as_ptr(), inbuf.as_ptr() as *mut _, outbuf.as_mut_ptr())),
                None => Err(FlowError::NotSupported),
            }
        }
    }

    fn parent_transform_ip(&self, trans: &BaseTransform, buffer: &mut BufferRef) -> Result<FlowSuccess, FlowError> {
        unsafe {
            match transform_parent::<Self>().transform_ip {
                Some(transform_ip) => flow_from_raw(transform_ip(trans.as_ptr(), buffer.as_mut_ptr())),
                None => Ok(FlowSuccess::Ok),
            }
        }
    }

    fn parent_sink_event(&self, trans: &BaseTransform, event: Event) -> bool {
        unsafe {
            match transform_parent::<Self>().sink_event {
                Some(sink_event) => sink_event(trans.as_ptr(), event.into_raw()) != sys::EL_FALSE,
                None => false,
            }
        }
    }
}

impl<T: ObjectSubclass> BaseTransformParent for T where T::ParentType: IsA<BaseTransform> {}

unsafe impl Extendable for BaseTransform {
    type Class = sys::el_base_transform_class;

    fn parent_type() -> Option<Type> {
        Some(Element::static_type())
    }

    unsafe fn install(klass: *mut c_void, overrides: &Overrides) {
        Element::install(klass, overrides);
        let klass = klass as *mut sys::el_base_transform_class;
        patch_slots!(
            (*klass), overrides.base_transform;
            start, stop, set_caps, transform_size, transform, transform_ip, sink_event,
        );
    }
}

pub trait BaseTransformExt: IsA<BaseTransform> {
    /// Runs one buffer through the filter.
    fn chain(&self, buffer: Buffer) -> Result<Buffer, FlowError> {
        unsafe {
            let mut output = ptr::null_mut();
            let ret = sys::el_base_transform_chain(self.as_ptr().cast(), buffer.into_raw(), &mut output);
            let output = Buffer::from_raw_full(output);
            flow_from_raw(ret)?;
            output.ok_or(FlowError::Error)
        }
    }

    fn set_passthrough(&self, passthrough: bool) {
        unsafe { sys::el_base_transform_set_passthrough(self.as_ptr().cast(), sys::el_boolean_from(passthrough)) }
    }

    fn is_passthrough(&self) -> bool {
        unsafe { sys::el_base_transform_is_passthrough(self.as_ptr().cast()) != sys::EL_FALSE }
    }

    fn set_in_place(&self, in_place: bool) {
        unsafe { sys::el_base_transform_set_in_place(self.as_ptr().cast(), sys::el_boolean_from(in_place)) }
    }

    fn is_in_place(&self) -> bool {
        unsafe { sys::el_base_transform_is_in_place(self.as_ptr().cast()) != sys::EL_FALSE }
    }

    /// Negotiates caps directly, as a caps event would.
    fn set_caps(&self, incaps: &CapsRef, outcaps: &CapsRef) -> bool {
        unsafe {
            sys::el_base_transform_set_caps(self.as_ptr().cast(), incaps.as_ptr() as *mut _, outcaps.as_ptr() as *mut _)
                != sys::EL_FALSE
        }
    }
}

impl<O: IsA<BaseTransform>> BaseTransformExt for O {}
