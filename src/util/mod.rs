//! Aligned heap allocation for the network parameter tables.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ops::{Deref, DerefMut};

/// Cache-line alignment used for accumulators and weight tables.
pub const CACHE_LINE: usize = 64;

/// A heap-allocated slice with 64-byte alignment.
///
/// The feature transformer's weight columns are read in full on every
/// add/sub, so they are kept on cache-line boundaries regardless of what
/// the global allocator would hand out.
pub struct AlignedBox<T> {
    ptr: *mut T,
    len: usize,
}

unsafe impl<T: Send> Send for AlignedBox<T> {}
unsafe impl<T: Sync> Sync for AlignedBox<T> {}

impl<T: Copy + Default> AlignedBox<T> {
    pub fn new_zeroed(len: usize) -> Self {
        assert!(len > 0, "AlignedBox of zero length");
        let layout = Self::layout(len);
        // SAFETY: layout has non-zero size; zeroed memory is a valid value
        // for the i16/i32 element types this is instantiated with.
        let ptr = unsafe { alloc_zeroed(layout) as *mut T };
        if ptr.is_null() {
            std::alloc::handle_alloc_error(layout);
        }
        Self { ptr, len }
    }

    fn layout(len: usize) -> Layout {
        Layout::from_size_align(len * std::mem::size_of::<T>(), CACHE_LINE)
            .expect("invalid AlignedBox layout")
    }
}

impl<T> Deref for AlignedBox<T> {
    type Target = [T];
    fn deref(&self) -> &[T] {
        // SAFETY: ptr/len describe the live allocation made in new_zeroed.
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }
}

impl<T> DerefMut for AlignedBox<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        // SAFETY: as above, and we hold the unique owning pointer.
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
    }
}

impl<T> Drop for AlignedBox<T> {
    fn drop(&mut self) {
        let layout = Layout::from_size_align(
            self.len * std::mem::size_of::<T>(),
            CACHE_LINE,
        )
        .expect("invalid AlignedBox layout");
        // SAFETY: ptr was allocated with exactly this layout.
        unsafe { dealloc(self.ptr as *mut u8, layout) };
    }
}

impl<T: Copy + Default> Clone for AlignedBox<T> {
    fn clone(&self) -> Self {
        let mut out = Self::new_zeroed(self.len);
        out.copy_from_slice(self);
        out
    }
}
