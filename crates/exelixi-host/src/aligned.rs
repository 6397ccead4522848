//! 64-byte aligned host buffers for DMA transfers.

use std::alloc::{self, Layout};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};
use std::slice;

use tracing::warn;

/// Alignment required by the DMA engine for host-side transfer buffers.
pub const DMA_ALIGNMENT: usize = 64;

/// Owned, 64-byte aligned byte buffer.
///
/// Released with the same layout it was allocated with, either explicitly via
/// [`AlignedBuffer::release`] or on drop. A zero-length buffer owns no memory
/// but still exposes a non-null, 64-aligned pointer.
pub struct AlignedBuffer {
    ptr: NonNull<u8>,
    len: usize,
}

impl AlignedBuffer {
    /// Allocate `size` zeroed bytes. Returns `None` when the allocator fails
    /// or `size` overflows the layout limits.
    pub fn allocate(size: usize) -> Option<Self> {
        if size == 0 {
            return Some(Self {
                ptr: NonNull::new(ptr::without_provenance_mut(DMA_ALIGNMENT))?,
                len: 0,
            });
        }
        let layout = match Layout::from_size_align(size, DMA_ALIGNMENT) {
            Ok(layout) => layout,
            Err(_) => {
                warn!(size, "aligned allocation exceeds layout limits");
                return None;
            }
        };
        // SAFETY: `layout` has a non-zero size.
        match NonNull::new(unsafe { alloc::alloc_zeroed(layout) }) {
            Some(ptr) => Some(Self { ptr, len: size }),
            None => {
                warn!(size, "aligned allocation failed");
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Return the memory to the allocator now.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        if self.len == 0 {
            return;
        }
        // SAFETY: non-empty buffers were allocated with exactly this layout.
        unsafe {
            let layout = Layout::from_size_align_unchecked(self.len, DMA_ALIGNMENT);
            alloc::dealloc(self.ptr.as_ptr(), layout);
        }
    }
}

impl Deref for AlignedBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: `ptr` is valid and initialised for `len` bytes, or dangling
        // and aligned when `len == 0`.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for AlignedBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: see `deref`; `&mut self` guarantees exclusive access.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl fmt::Debug for AlignedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignedBuffer")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

// SAFETY: the buffer exclusively owns its allocation.
unsafe impl Send for AlignedBuffer {}
unsafe impl Sync for AlignedBuffer {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_allocation_is_aligned() {
        for size in [1, 63, 64, 65, 4096, 1 << 20] {
            let buf = AlignedBuffer::allocate(size).unwrap();
            assert_eq!(buf.as_ptr() as usize % DMA_ALIGNMENT, 0, "size {size}");
            assert_eq!(buf.len(), size);
        }
    }

    #[test]
    fn test_zero_size_is_aligned_and_non_null() {
        let buf = AlignedBuffer::allocate(0).unwrap();
        assert!(!buf.as_ptr().is_null());
        assert_eq!(buf.as_ptr() as usize % DMA_ALIGNMENT, 0);
        assert!(buf.is_empty());
        assert!(buf.iter().next().is_none());
        buf.release();
    }

    #[test]
    fn test_allocation_is_cleared() {
        let buf = AlignedBuffer::allocate(257).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_write_and_read_back() {
        let mut buf = AlignedBuffer::allocate(128).unwrap();
        buf.fill(0xA5);
        buf[127] = 1;
        assert_eq!(buf[0], 0xA5);
        assert_eq!(buf[127], 1);
    }

    #[test]
    fn test_oversized_request_is_absent() {
        assert!(AlignedBuffer::allocate(usize::MAX).is_none());
        assert!(AlignedBuffer::allocate(isize::MAX as usize).is_none());
    }

    proptest! {
        #[test]
        fn prop_any_size_is_64_aligned(size in 0usize..(1 << 16)) {
            let buf = AlignedBuffer::allocate(size).unwrap();
            prop_assert_eq!(buf.as_ptr() as usize % DMA_ALIGNMENT, 0);
            prop_assert_eq!(buf.len(), size);
        }
    }
}
