//! Block handles.

#![allow(unsafe_code)]

use std::fmt;
use std::ptr::NonNull;

/// Handle to a reference-counted block: the payload address.
///
/// A `Block` is a token, not an owner. Copying it does not take a
/// reference and dropping it does not release one; ownership units are
/// accounted only through [`Allocator::retain`](crate::Allocator::retain)
/// and [`Allocator::release`](crate::Allocator::release). Every copy is
/// invalid once the block is destroyed, and every copy except the one
/// returned by a successful resize is invalid after that resize.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Block(NonNull<u8>);

// SAFETY: a Block is an address. Concurrent use is governed by the
// allocator contract (atomic refcount, single-owner resize), not by the
// handle itself.
unsafe impl Send for Block {}
// SAFETY: see above.
unsafe impl Sync for Block {}

impl Block {
    pub(crate) fn from_payload(payload: NonNull<u8>) -> Self {
        Self(payload)
    }

    /// Reconstruct a handle from a payload pointer, e.g. one that crossed
    /// an FFI boundary. Returns `None` for null.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must be the payload address of a live block
    /// returned by a remem allocator.
    pub unsafe fn from_raw(ptr: *mut u8) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    /// The payload address as a raw pointer.
    pub fn as_ptr(self) -> *mut u8 {
        self.0.as_ptr()
    }

    /// The payload address.
    pub fn as_non_null(self) -> NonNull<u8> {
        self.0
    }

    /// The payload address as an integer.
    pub fn addr(self) -> usize {
        self.0.as_ptr() as usize
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block({:p})", self.0)
    }
}

impl fmt::Pointer for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.0, f)
    }
}
