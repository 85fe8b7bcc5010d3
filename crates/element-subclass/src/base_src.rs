//! Source base class: produces buffers on [`BaseSrcExt::pull`].

use std::ffi::c_void;
use std::ptr;

use element_sys as sys;

use crate::buffer::{Buffer, BufferRef};
use crate::capability::{patch_slots, Overrides};
use crate::element::Element;
use crate::event::EventRef;
use crate::flow::{flow_from_raw, flow_into_raw, FlowError, FlowSuccess};
use crate::object::Object;
use crate::query::QueryRef;
use crate::subclass::{parent_class, Extendable, ObjectSubclass};
use crate::trampoline::{check_parent, guard, report};
use crate::types::{IsA, ObjectType, Type};

crate::object_wrapper!(
    pub struct BaseSrc(sys::el_base_src) @type sys::el_base_src_get_type(),
    @extends Element, Object
);

macro_rules! src_capability {
    ($(#[$attr:meta])* $name:ident { $($method:tt)* }) => {
        $(#[$attr])*
        pub trait $name: ObjectSubclass
        where
            <Self as ObjectSubclass>::ParentType: IsA<BaseSrc>,
        {
            $($method)*
        }
    };
}

src_capability!(SrcStart { fn start(&self, src: &BaseSrc) -> anyhow::Result<()>; });
src_capability!(SrcStop { fn stop(&self, src: &BaseSrc) -> anyhow::Result<()>; });
src_capability!(
    /// Total size in bytes. Without this capability the size is unknown and
    /// the source never reports EOS on its own.
    SrcGetSize { fn size(&self, src: &BaseSrc) -> Option<u64>; }
);
src_capability!(SrcIsSeekable { fn is_seekable(&self, src: &BaseSrc) -> bool; });
src_capability!(
    /// Produces a whole buffer. Replaces the default alloc-then-fill path.
    SrcCreate { fn create(&self, src: &BaseSrc, offset: u64, size: u32) -> Result<Buffer, FlowError>; }
);
src_capability!(SrcAlloc { fn alloc(&self, src: &BaseSrc, offset: u64, size: u32) -> Result<Buffer, FlowError>; });
src_capability!(
    /// Writes data into a buffer allocated by `alloc`.
    SrcFill {
        fn fill(&self, src: &BaseSrc, offset: u64, size: u32, buffer: &mut BufferRef) -> Result<FlowSuccess, FlowError>;
    }
);
src_capability!(SrcDoSeek { fn do_seek(&self, src: &BaseSrc, position: u64) -> anyhow::Result<()>; });
src_capability!(SrcEvent { fn event(&self, src: &BaseSrc, event: &EventRef) -> bool; });
src_capability!(SrcQuery { fn query(&self, src: &BaseSrc, query: &mut QueryRef) -> bool; });
src_capability!(SrcUnlock { fn unlock(&self, src: &BaseSrc) -> anyhow::Result<()>; });
src_capability!(SrcUnlockStop { fn unlock_stop(&self, src: &BaseSrc) -> anyhow::Result<()>; });

pub(crate) unsafe extern "C" fn start<T: SrcStart>(src: *mut sys::el_base_src) -> sys::el_boolean
where
    T::ParentType: IsA<BaseSrc>,
{
    let wrapper = BaseSrc::from_raw_borrow(src);
    guard::<T, _>(src.cast(), "start", sys::EL_FALSE, |imp| report::<T>("start", SrcStart::start(imp, &wrapper)))
}

pub(crate) unsafe extern "C" fn stop<T: SrcStop>(src: *mut sys::el_base_src) -> sys::el_boolean
where
    T::ParentType: IsA<BaseSrc>,
{
    let wrapper = BaseSrc::from_raw_borrow(src);
    guard::<T, _>(src.cast(), "stop", sys::EL_FALSE, |imp| report::<T>("stop", SrcStop::stop(imp, &wrapper)))
}

pub(crate) unsafe extern "C" fn get_size<T: SrcGetSize>(src: *mut sys::el_base_src, size: *mut u64) -> sys::el_boolean
where
    T::ParentType: IsA<BaseSrc>,
{
    if size.is_null() {
        return sys::EL_FALSE;
    }
    let wrapper = BaseSrc::from_raw_borrow(src);
    match guard::<T, _>(src.cast(), "size", None, |imp| SrcGetSize::size(imp, &wrapper)) {
        Some(known) => {
            *size = known;
            sys::EL_TRUE
        }
        None => sys::EL_FALSE,
    }
}

pub(crate) unsafe extern "C" fn is_seekable<T: SrcIsSeekable>(src: *mut sys::el_base_src) -> sys::el_boolean
where
    T::ParentType: IsA<BaseSrc>,
{
    let wrapper = BaseSrc::from_raw_borrow(src);
    sys::el_boolean_from(guard::<T, _>(src.cast(), "is_seekable", false, |imp| {
        SrcIsSeekable::is_seekable(imp, &wrapper)
    }))
}

pub(crate) unsafe fn hand_over(result: Result<Buffer, FlowError>, out: *mut *mut sys::el_buffer) -> sys::el_flow_return {
    match result {
        Ok(buffer) => {
            *out = buffer.into_raw();
            sys::EL_FLOW_OK
        }
        Err(err) => err.into_raw(),
    }
}

pub(crate) unsafe extern "C" fn create<T: SrcCreate>(
    src: *mut sys::el_base_src,
    offset: u64,
    size: u32,
    buffer: *mut *mut sys::el_buffer,
) -> sys::el_flow_return
where
    T::ParentType: IsA<BaseSrc>,
{
    if buffer.is_null() {
        return sys::EL_FLOW_ERROR;
    }
    let wrapper = BaseSrc::from_raw_borrow(src);
    let result = guard::<T, _>(src.cast(), "create", Err(FlowError::Error), |imp| {
        SrcCreate::create(imp, &wrapper, offset, size)
    });
    hand_over(result, buffer)
}

pub(crate) unsafe extern "C" fn alloc<T: SrcAlloc>(
    src: *mut sys::el_base_src,
    offset: u64,
    size: u32,
    buffer: *mut *mut sys::el_buffer,
) -> sys::el_flow_return
where
    T::ParentType: IsA<BaseSrc>,
{
    if buffer.is_null() {
        return sys::EL_FLOW_ERROR;
    }
    let wrapper = BaseSrc::from_raw_borrow(src);
    let result = guard::<T, _>(src.cast(), "alloc", Err(FlowError::Error), |imp| {
        SrcAlloc::alloc(imp, &wrapper, offset, size)
    });
    hand_over(result, buffer)
}

pub(crate) unsafe extern "C" fn fill<T: SrcFill>(
    src: *mut sys::el_base_src,
    offset: u64,
    size: u32,
    buffer: *mut sys::el_buffer,
) -> sys::el_flow_return
where
    T::ParentType: IsA<BaseSrc>,
{
    if buffer.is_null() {
        return sys::EL_FLOW_ERROR;
    }
    let wrapper = BaseSrc::from_raw_borrow(src);
    let buffer = BufferRef::from_mut_ptr(buffer);
    flow_into_raw(guard::<T, _>(src.cast(), "fill", Err(FlowError::Error), |imp| {
        SrcFill::fill(imp, &wrapper, offset, size, buffer)
    }))
}

pub(crate) unsafe extern "C" fn do_seek<T: SrcDoSeek>(src: *mut sys::el_base_src, position: u64) -> sys::el_boolean
where
    T::ParentType: IsA<BaseSrc>,
{
    let wrapper = BaseSrc::from_raw_borrow(src);
    guard::<T, _>(src.cast(), "do_seek", sys::EL_FALSE, |imp| {
        report::<T>("do_seek", SrcDoSeek::do_seek(imp, &wrapper, position))
    })
}

pub(crate) unsafe extern "C" fn event<T: SrcEvent>(src: *mut sys::el_base_src, event: *mut sys::el_event) -> sys::el_boolean
where
    T::ParentType: IsA<BaseSrc>,
{
    if event.is_null() {
        return sys::EL_FALSE;
    }
    let wrapper = BaseSrc::from_raw_borrow(src);
    let event = EventRef::from_ptr(event);
    sys::el_boolean_from(guard::<T, _>(src.cast(), "event", false, |imp| SrcEvent::event(imp, &wrapper, event)))
}

pub(crate) unsafe extern "C" fn query<T: SrcQuery>(src: *mut sys::el_base_src, query: *mut sys::el_query) -> sys::el_boolean
where
    T::ParentType: IsA<BaseSrc>,
{
    if query.is_null() {
        return sys::EL_FALSE;
    }
    let wrapper = BaseSrc::from_raw_borrow(src);
    let query = QueryRef::from_mut_ptr(query);
    sys::el_boolean_from(guard::<T, _>(src.cast(), "query", false, |imp| SrcQuery::query(imp, &wrapper, query)))
}

pub(crate) unsafe extern "C" fn unlock<T: SrcUnlock>(src: *mut sys::el_base_src) -> sys::el_boolean
where
    T::ParentType: IsA<BaseSrc>,
{
    let wrapper = BaseSrc::from_raw_borrow(src);
    guard::<T, _>(src.cast(), "unlock", sys::EL_FALSE, |imp| report::<T>("unlock", SrcUnlock::unlock(imp, &wrapper)))
}

pub(crate) unsafe extern "C" fn unlock_stop<T: SrcUnlockStop>(src: *mut sys::el_base_src) -> sys::el_boolean
where
    T::ParentType: IsA<BaseSrc>,
{
    let wrapper = BaseSrc::from_raw_borrow(src);
    guard::<T, _>(src.cast(), "unlock_stop", sys::EL_FALSE, |imp| {
        report::<T>("unlock_stop", SrcUnlockStop::unlock_stop(imp, &wrapper))
    })
}

unsafe fn src_parent<T: ObjectSubclass>() -> &'static sys::el_base_src_class {
    &*parent_class::<T, sys::el_base_src_class>()
}

pub(crate) unsafe fn take_created(ret: sys::el_flow_return, created: *mut sys::el_buffer) -> Result<Buffer, FlowError> {
    let created = Buffer::from_raw_full(created);
    flow_from_raw(ret)?;
    created.ok_or(FlowError::Error)
}

/// Calls the parent class's source slots. An empty `get_size` means the size
/// is unknown and an empty `is_seekable` means not seekable.
pub trait BaseSrcParent: ObjectSubclass
where
    <Self as ObjectSubclass>::ParentType: IsA<BaseSrc>,
{
    fn parent_start(&self, src: &BaseSrc) -> anyhow::Result<()> {
        unsafe {
            match src_parent::<Self>().start {
                Some(start) => check_parent("start", start(src.as_ptr())),
                None => Ok(()),
            }
        }
    }

    fn parent_stop(&self, src: &BaseSrc) -> anyhow::Result<()> {
        unsafe {
            match src_parent::<Self>().stop {
                Some(stop) => check_parent("stop", stop(src.as_ptr())),
                None => Ok(()),
            }
        }
    }

    fn parent_size(&self, src: &BaseSrc) -> Option<u64> {
        unsafe {
            let get_size = src_parent::<Self>().get_size?;
            let mut size = 0;
            (get_size(src.as_ptr(), &mut size) != sys::EL_FALSE).then_some(size)
        }
    }

    fn parent_is_seekable(&self, src: &BaseSrc) -> bool {
        unsafe {
            match src_parent::<Self>().is_seekable {
                Some(is_seekable) => is_seekable(src.as_ptr()) != sys::EL_FALSE,
                None => false,
            }
        }
    }

    fn parent_create(&self, src: &BaseSrc, offset: u64, size: u32) -> Result<Buffer, FlowError> {
        unsafe {
            let Some(create) = src_parent::<Self>().create else {
                return Err(FlowError::NotSupported);
            };
            let mut created = ptr::null_mut();
            let ret = create(src.as_ptr(), offset, size, &mut created);
            take_created(ret, created)
        }
    }

    fn parent_alloc(&self, src: &BaseSrc, offset: u64, size: u32) -> Result<Buffer, FlowError> {
        unsafe {
            let Some(alloc) = src_parent::<Self>().alloc else {
                return Ok(Buffer::with_size(size as usize));
            };
            let mut allocated = ptr::null_mut();
            let ret = alloc(src.as_ptr(), offset, size, &mut allocated);
            take_created(ret, allocated)
        }
    }

    fn parent_fill(
        &self,
        src: &BaseSrc,
        offset: u64,
        size: u32,
        buffer: &mut BufferRef,
    ) -> Result<FlowSuccess, FlowError> {
        unsafe {
            match src_parent::<Self>().fill {
                Some(fill) => flow_from_raw(fill(src.as_ptr(), offset, size, buffer.as_mut_ptr())),
                None => Err(FlowError::NotSupported),
            }
        }
    }

    fn parent_do_seek(&self, src: &BaseSrc, position: u64) -> anyhow::Result<()> {
        unsafe {
            match src_parent::<Self>().do_seek {
                Some(do_seek) => check_parent("do_seek", do_seek(src.as_ptr(), position)),
                None => Ok(()),
            }
        }
    }

    fn parent_event(&self, src: &BaseSrc, event: &EventRef) -> bool {
        unsafe {
            match src_parent::<Self>().event {
                Some(parent_event) => parent_event(src.as_ptr(), event.as_ptr() as *mut _) != sys::EL_FALSE,
                None => false,
            }
        }
    }

    fn parent_query(&self, src: &BaseSrc, query: &mut QueryRef) -> bool {
        unsafe {
            match src_parent::<Self>().query {
                Some(parent_query) => parent_query(src.as_ptr(), query.as_mut_ptr()) != sys::EL_FALSE,
                None => false,
            }
        }
    }

    fn parent_unlock(&self, src: &BaseSrc) -> anyhow::Result<()> {
        unsafe {
            match src_parent::<Self>().unlock {
                Some(unlock) => check_parent("unlock", unlock(src.as_ptr())),
                None => Ok(()),
            }
        }
    }

    fn parent_unlock_stop(&self, src: &BaseSrc) -> anyhow::Result<()> {
        unsafe {
            match src_parent::<Self>().unlock_stop {
                Some(unlock_stop) => check_parent("unlock_stop", unlock_stop(src.as_ptr())),
                None => Ok(()),
            }
        }
    }
}

impl<T: ObjectSubclass> BaseSrcParent for T where T::ParentType: IsA<BaseSrc> {}

unsafe impl Extendable for BaseSrc {
    type Class = sys::el_base_src_class;

    fn parent_type() -> Option<Type> {
        Some(Element::static_type())
    }

    unsafe fn install(klass: *mut c_void, overrides: &Overrides) {
        Element::install(klass, overrides);
        let klass = klass as *mut sys::el_base_src_class;
        patch_slots!(
            (*klass), overrides.base_src;
            start, stop, get_size, is_seekable, create, alloc, fill, do_seek, event, query, unlock, unlock_stop,
        );
    }
}

pub trait BaseSrcExt: IsA<BaseSrc> {
    /// Produces the next block at the current offset.
    fn pull(&self) -> Result<Buffer, FlowError> {
        unsafe {
            let mut buffer = ptr::null_mut();
            let ret = sys::el_base_src_pull(self.as_ptr().cast(), &mut buffer);
            take_created(ret, buffer)
        }
    }

    fn size(&self) -> Option<u64> {
        let mut size = 0;
        let known = unsafe { sys::el_base_src_get_size(self.as_ptr().cast(), &mut size) };
        (known != sys::EL_FALSE).then_some(size)
    }

    fn is_seekable(&self) -> bool {
        unsafe { sys::el_base_src_is_seekable(self.as_ptr().cast()) != sys::EL_FALSE }
    }

    fn seek(&self, position: u64) -> bool {
        unsafe { sys::el_base_src_seek(self.as_ptr().cast(), position) != sys::EL_FALSE }
    }

    fn offset(&self) -> u64 {
        unsafe { sys::el_base_src_get_offset(self.as_ptr().cast()) }
    }

    fn set_blocksize(&self, blocksize: u32) {
        unsafe { sys::el_base_src_set_blocksize(self.as_ptr().cast(), blocksize) }
    }

    fn blocksize(&self) -> u32 {
        unsafe { sys::el_base_src_get_blocksize(self.as_ptr().cast()) }
    }

    fn is_started(&self) -> bool {
        unsafe { sys::el_base_src_is_started(self.as_ptr().cast()) != sys::EL_FALSE }
    }
}

impl<O: IsA<BaseSrc>> BaseSrcExt for O {}
