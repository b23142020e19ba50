//! The raw heap underneath the allocator.
//!
//! [`RawHeap`] is the seam between block accounting and actual memory.
//! Production code uses [`SystemHeap`]; tests substitute heaps that fail on
//! demand to exercise the out-of-memory paths.

#![allow(unsafe_code)]

use std::alloc::{GlobalAlloc, Layout, System};

/// A source of raw memory, shaped like [`GlobalAlloc`].
///
/// Failure is signalled by returning null. Implementations must never
/// unwind out of these methods.
///
/// # Safety
///
/// Implementors must uphold the [`GlobalAlloc`] contract: returned pointers
/// are valid for `layout`, aligned to `layout.align()`, and stay valid until
/// passed back to `dealloc` or `realloc`. A failed `realloc` must leave the
/// original allocation untouched.
pub unsafe trait RawHeap: Send + Sync {
    /// Allocate memory for `layout`. Contents are uninitialised.
    ///
    /// # Safety
    ///
    /// `layout` must have a non-zero size.
    unsafe fn alloc(&self, layout: Layout) -> *mut u8;

    /// Allocate zeroed memory for `layout`.
    ///
    /// # Safety
    ///
    /// `layout` must have a non-zero size.
    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8;

    /// Grow or shrink an allocation to `new_size` bytes, keeping alignment.
    ///
    /// # Safety
    ///
    /// `ptr` must have been allocated by this heap with `layout`, and
    /// `new_size` must be non-zero and not overflow `isize` when rounded
    /// to `layout.align()`.
    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8;

    /// Return an allocation to the heap.
    ///
    /// # Safety
    ///
    /// `ptr` must have been allocated by this heap with `layout`.
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout);
}

/// The platform allocator ([`std::alloc::System`]).
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemHeap;

// SAFETY: every method forwards to `System`, which implements `GlobalAlloc`.
unsafe impl RawHeap for SystemHeap {
    #[inline]
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // SAFETY: forwarded caller contract.
        unsafe { System.alloc(layout) }
    }

    #[inline]
    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        // SAFETY: forwarded caller contract.
        unsafe { System.alloc_zeroed(layout) }
    }

    #[inline]
    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        // SAFETY: forwarded caller contract.
        unsafe { System.realloc(ptr, layout, new_size) }
    }

    #[inline]
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        // SAFETY: forwarded caller contract.
        unsafe { System.dealloc(ptr, layout) }
    }
}

// SAFETY: forwards to the referenced heap.
unsafe impl<H: RawHeap + ?Sized> RawHeap for &H {
    #[inline]
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // SAFETY: forwarded caller contract.
        unsafe { (**self).alloc(layout) }
    }

    #[inline]
    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        // SAFETY: forwarded caller contract.
        unsafe { (**self).alloc_zeroed(layout) }
    }

    #[inline]
    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        // SAFETY: forwarded caller contract.
        unsafe { (**self).realloc(ptr, layout, new_size) }
    }

    #[inline]
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        // SAFETY: forwarded caller contract.
        unsafe { (**self).dealloc(ptr, layout) }
    }
}
