use std::fmt;

use element_sys as sys;

use crate::clock::ClockTime;
use crate::mini::mini_object_wrapper;

mini_object_wrapper!(
    /// Owned buffer reference; the runtime frees the buffer with the last one.
    Buffer,
    /// Buffer borrowed from the runtime for the duration of a call.
    BufferRef,
    sys::el_buffer
);

impl Buffer {
    pub fn new() -> Self {
        Self::with_size(0)
    }

    /// Zero-filled buffer with unset timestamps.
    pub fn with_size(size: usize) -> Self {
        Self::from_new(unsafe { sys::el_buffer_new_allocate(size) })
    }

    pub fn from_slice(data: &[u8]) -> Self {
        Self::from_new(unsafe { sys::el_buffer_new_copy(data.as_ptr(), data.len()) })
    }

    /// Mutable view, copying the buffer first if it is shared.
    pub fn make_mut(&mut self) -> &mut BufferRef {
        unsafe {
            let writable = sys::el_buffer_make_writable(self.0.as_ptr());
            self.0 = std::ptr::NonNull::new_unchecked(writable);
            BufferRef::from_mut_ptr(writable)
        }
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferRef {
    pub fn size(&self) -> usize {
        self.0.size
    }

    pub fn maxsize(&self) -> usize {
        self.0.maxsize
    }

    pub fn as_slice(&self) -> &[u8] {
        if self.0.size == 0 || self.0.data.is_null() {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.0.data, self.0.size) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        if self.0.size == 0 || self.0.data.is_null() {
            return &mut [];
        }
        unsafe { std::slice::from_raw_parts_mut(self.0.data, self.0.size) }
    }

    /// Copies as much of `data` as fits starting at `offset`.
    pub fn copy_from_slice(&mut self, offset: usize, data: &[u8]) -> usize {
        let target = self.as_mut_slice();
        if offset >= target.len() {
            return 0;
        }
        let count = data.len().min(target.len() - offset);
        target[offset..offset + count].copy_from_slice(&data[..count]);
        count
    }

    /// Changes the visible size within the allocation.
    pub fn set_size(&mut self, size: usize) -> bool {
        unsafe { sys::el_buffer_resize(&mut self.0, size) != sys::EL_FALSE }
    }

    pub fn pts(&self) -> Option<ClockTime> {
        ClockTime::from_raw(self.0.pts)
    }

    pub fn set_pts(&mut self, pts: Option<ClockTime>) {
        self.0.pts = ClockTime::option_into_raw(pts);
    }

    pub fn dts(&self) -> Option<ClockTime> {
        ClockTime::from_raw(self.0.dts)
    }

    pub fn set_dts(&mut self, dts: Option<ClockTime>) {
        self.0.dts = ClockTime::option_into_raw(dts);
    }

    pub fn duration(&self) -> Option<ClockTime> {
        ClockTime::from_raw(self.0.duration)
    }

    pub fn set_duration(&mut self, duration: Option<ClockTime>) {
        self.0.duration = ClockTime::option_into_raw(duration);
    }

    pub fn offset(&self) -> Option<u64> {
        (self.0.offset != sys::EL_BUFFER_OFFSET_NONE).then_some(self.0.offset)
    }

    pub fn set_offset(&mut self, offset: Option<u64>) {
        self.0.offset = offset.unwrap_or(sys::EL_BUFFER_OFFSET_NONE);
    }

    /// Deep copy with its own storage.
    pub fn copy(&self) -> Buffer {
        Buffer::from_new(unsafe { sys::el_buffer_copy(&self.0) })
    }
}

impl fmt::Debug for BufferRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("ptr", &self.as_ptr())
            .field("size", &self.size())
            .field("pts", &self.pts())
            .field("duration", &self.duration())
            .field("offset", &self.offset())
            .field("refcount", &self.refcount())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_mut_copies_shared_buffers() {
        let mut first = Buffer::from_slice(b"abcd");
        let second = first.clone();
        assert_eq!(first.refcount(), 2);
        first.make_mut().as_mut_slice()[0] = b'z';
        assert_eq!(first.as_slice(), b"zbcd");
        assert_eq!(second.as_slice(), b"abcd");
        assert_eq!(second.refcount(), 1);
    }

    #[test]
    fn get_mut_requires_unique_reference() {
        let mut buffer = Buffer::with_size(4);
        assert!(buffer.get_mut().is_some());
        let _other = buffer.clone();
        assert!(buffer.get_mut().is_none());
    }

    #[test]
    fn copy_from_slice_clamps_to_size() {
        let mut buffer = Buffer::with_size(4);
        let written = buffer.get_mut().unwrap().copy_from_slice(2, b"xyz");
        assert_eq!(written, 2);
        assert_eq!(buffer.as_slice(), b"\0\0xy");
    }

    #[test]
    fn timestamps_default_to_none() {
        let mut buffer = Buffer::with_size(1);
        assert_eq!(buffer.pts(), None);
        buffer.get_mut().unwrap().set_pts(Some(ClockTime::SECOND));
        assert_eq!(buffer.pts(), Some(ClockTime::SECOND));
        assert_eq!(buffer.offset(), None);
    }
}
