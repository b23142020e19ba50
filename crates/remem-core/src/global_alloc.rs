//! [`GlobalAlloc`] adapter over an [`Allocator`].
//!
//! [`RcAlloc`] lets Rust collections draw from the same accounted heap as
//! the C side. Every allocation is a block with refcount 1 and no
//! destructor: `dealloc` is a release, `realloc` is a resize.
//!
//! Layouts aligned beyond [`BLOCK_ALIGN`] cannot carry a block header, so
//! they bypass block accounting and go straight to the allocator's heap.
//! `dealloc` and `realloc` receive the same layout and route the same way.
//!
//! ```
//! use remem_core::{Allocator, RcAlloc, SystemHeap};
//!
//! static BLOCKS: Allocator = Allocator::const_new(SystemHeap);
//!
//! // In a binary: #[global_allocator]
//! static ALLOC: RcAlloc<'static> = RcAlloc::new(&BLOCKS);
//! # let _ = &ALLOC;
//! ```
//!
//! Used as the global allocator, the underlying [`Allocator`] must not
//! allocate itself, which holds for counters-only tracking. Failures are
//! counted in [`MemStats::failures`](crate::MemStats::failures) and never
//! logged.

#![allow(unsafe_code)]

use std::alloc::{GlobalAlloc, Layout};
use std::ptr;

use crate::allocator::Allocator;
use crate::block::Block;
use crate::header::BLOCK_ALIGN;
use crate::heap::{RawHeap, SystemHeap};

/// Borrowing [`GlobalAlloc`] adapter over an [`Allocator`].
#[derive(Debug)]
pub struct RcAlloc<'a, H: RawHeap = SystemHeap> {
    allocator: &'a Allocator<H>,
}

impl<'a, H: RawHeap> RcAlloc<'a, H> {
    /// Wrap `allocator`.
    pub const fn new(allocator: &'a Allocator<H>) -> Self {
        Self { allocator }
    }

    /// The wrapped allocator.
    pub fn allocator(&self) -> &'a Allocator<H> {
        self.allocator
    }

    fn block_aligned(layout: Layout) -> bool {
        layout.align() <= BLOCK_ALIGN
    }
}

impl<H: RawHeap> Clone for RcAlloc<'_, H> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<H: RawHeap> Copy for RcAlloc<'_, H> {}

// SAFETY: block payloads are BLOCK_ALIGN-aligned and valid for their size
// until released; wider alignments are served by the heap, which upholds
// the same contract. A failed resize leaves the block untouched.
unsafe impl<H: RawHeap> GlobalAlloc for RcAlloc<'_, H> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if !Self::block_aligned(layout) {
            // SAFETY: forwarded caller contract.
            return unsafe { self.allocator.heap().alloc(layout) };
        }
        match self.allocator.alloc(layout.size(), None) {
            Ok(block) => block.as_ptr(),
            Err(_) => ptr::null_mut(),
        }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        if !Self::block_aligned(layout) {
            // SAFETY: forwarded caller contract.
            return unsafe { self.allocator.heap().alloc_zeroed(layout) };
        }
        match self.allocator.zalloc(layout.size(), None) {
            Ok(block) => block.as_ptr(),
            Err(_) => ptr::null_mut(),
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if !Self::block_aligned(layout) {
            // SAFETY: `ptr` came from the heap with this layout.
            return unsafe { self.allocator.heap().dealloc(ptr, layout) };
        }
        // SAFETY: `ptr` is the payload of a live block with one reference.
        if let Some(block) = unsafe { Block::from_raw(ptr) } {
            // SAFETY: as above; this drops the only reference.
            unsafe { self.allocator.release(block) };
        }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if !Self::block_aligned(layout) {
            // SAFETY: `ptr` came from the heap with this layout.
            return unsafe { self.allocator.heap().realloc(ptr, layout, new_size) };
        }
        // SAFETY: `ptr` is the payload of a live block with one reference.
        let Some(block) = (unsafe { Block::from_raw(ptr) }) else {
            return ptr::null_mut();
        };
        // SAFETY: the caller holds the sole reference.
        match unsafe { self.allocator.resize(block, new_size) } {
            Ok(block) => block.as_ptr(),
            Err(_) => ptr::null_mut(),
        }
    }
}
