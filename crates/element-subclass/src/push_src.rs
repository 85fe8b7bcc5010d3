//! Push source: a [`BaseSrc`] that produces one buffer per pull and leaves
//! offsets and sizes to the base class.

use std::ffi::c_void;
use std::ptr;

use element_sys as sys;

use crate::base_src::{hand_over, take_created, BaseSrc};
use crate::buffer::{Buffer, BufferRef};
use crate::capability::{patch_slots, Overrides};
use crate::element::Element;
use crate::flow::{flow_from_raw, flow_into_raw, FlowError, FlowSuccess};
use crate::object::Object;
use crate::subclass::{parent_class, Extendable, ObjectSubclass};
use crate::trampoline::guard;
use crate::types::{IsA, ObjectType, Type};

crate::object_wrapper!(
    pub struct PushSrc(sys::el_push_src) @type sys::el_push_src_get_type(),
    @extends BaseSrc, Element, Object
);

macro_rules! push_src_capability {
    ($(#[$attr:meta])* $name:ident { $($method:tt)* }) => {
        $(#[$attr])*
        pub trait $name: ObjectSubclass
        where
            <Self as ObjectSubclass>::ParentType: IsA<PushSrc>,
        {
            $($method)*
        }
    };
}

push_src_capability!(
    /// Produces the next buffer. Replaces the default alloc-then-fill path.
    PushSrcCreate { fn create(&self, src: &PushSrc) -> Result<Buffer, FlowError>; }
);
push_src_capability!(
    /// Allocates the buffer handed to `fill`. Defaults to a buffer of the
    /// current blocksize.
    PushSrcAlloc { fn alloc(&self, src: &PushSrc) -> Result<Buffer, FlowError>; }
);
push_src_capability!(PushSrcFill {
    fn fill(&self, src: &PushSrc, buffer: &mut BufferRef) -> Result<FlowSuccess, FlowError>;
});

pub(crate) unsafe extern "C" fn create<T: PushSrcCreate>(
    src: *mut sys::el_push_src,
    buffer: *mut *mut sys::el_buffer,
) -> sys::el_flow_return
where
    T::ParentType: IsA<PushSrc>,
{
    if buffer.is_null() {
        return sys::EL_FLOW_ERROR;
    }
    let wrapper = PushSrc::from_raw_borrow(src);
    let result = guard::<T, _>(src.cast(), "create", Err(FlowError::Error), |imp| {
        PushSrcCreate::create(imp, &wrapper)
    });
    hand_over(result, buffer)
}

pub(crate) unsafe extern "C" fn alloc<T: PushSrcAlloc>(
    src: *mut sys::el_push_src,
    buffer: *mut *mut sys::el_buffer,
) -> sys::el_flow_return
where
    T::ParentType: IsA<PushSrc>,
{
    if buffer.is_null() {
        return sys::EL_FLOW_ERROR;
    }
    let wrapper = PushSrc::from_raw_borrow(src);
    let result = guard::<T, _>(src.cast(), "alloc", Err(FlowError::Error), |imp| PushSrcAlloc::alloc(imp, &wrapper));
    hand_over(result, buffer)
}

pub(crate) unsafe extern "C" fn fill<T: PushSrcFill>(
    src: *mut sys::el_push_src,
    buffer: *mut sys::el_buffer,
) -> sys::el_flow_return
where
    T::ParentType: IsA<PushSrc>,
{
    if buffer.is_null() {
        return sys::EL_FLOW_ERROR;
    }
    let wrapper = PushSrc::from_raw_borrow(src);
    let buffer = BufferRef::from_mut_ptr(buffer);
    flow_into_raw(guard::<T, _>(src.cast(), "fill", Err(FlowError::Error), |imp| {
        PushSrcFill::fill(imp, &wrapper, buffer)
    }))
}

unsafe fn push_src_parent<T: ObjectSubclass>() -> &'static sys::el_push_src_class {
    &*parent_class::<T, sys::el_push_src_class>()
}

/// Calls the parent class's push source slots.
pub trait PushSrcParent: ObjectSubclass
where
    <Self as ObjectSubclass>::ParentType: IsA<PushSrc>,
{
    fn parent_push_create(&self, src: &PushSrc) -> Result<Buffer, FlowError> {
        unsafe {
            let Some(create) = push_src_parent::<Self>().create else {
                return Err(FlowError::NotSupported);
            };
            let mut created = ptr::null_mut();
            let ret = create(src.as_ptr(), &mut created);
            take_created(ret, created)
        }
    }

    fn parent_push_alloc(&self, src: &PushSrc) -> Result<Buffer, FlowError> {
        unsafe {
            let Some(alloc) = push_src_parent::<Self>().alloc else {
                return Err(FlowError::NotSupported);
            };
            let mut allocated = ptr::null_mut();
            let ret = alloc(src.as_ptr(), &mut allocated);
            take_created(ret, allocated)
        }
    }

    fn parent_push_fill(&self, src: &PushSrc, buffer: &mut BufferRef) -> Result<FlowSuccess, FlowError> {
        unsafe {
            match push_src_parent::<Self>().fill {
                Some(fill) => flow_from_raw(fill(src.as_ptr(), buffer.as_mut_ptr())),
                None => Err(FlowError::NotSupported),
            }
        }
    }
}

impl<T: ObjectSubclass> PushSrcParent for T where T::ParentType: IsA<PushSrc> {}

unsafe impl Extendable for PushSrc {
    type Class = sys::el_push_src_class;

    fn parent_type() -> Option<Type> {
        Some(BaseSrc::static_type())
    }

    unsafe fn install(klass: *mut c_void, overrides: &Overrides) {
        BaseSrc::install(klass, overrides);
        let klass = klass as *mut sys::el_push_src_class;
        patch_slots!((*klass), overrides.push_src; create, alloc, fill);
    }
}
