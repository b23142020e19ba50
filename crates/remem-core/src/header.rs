//! The hidden block header and the layout arithmetic around it.
//!
//! Every heap block is laid out as `[Header | padding | payload]`, with the
//! payload starting exactly [`HEADER_SIZE`] bytes after the block base.
//! Callers only ever see the payload address; the header is recovered by
//! subtracting the fixed offset.
//!
//! Headers are accessed through raw field projections rather than
//! `&Header`/`&mut Header`, so that concurrent readers of `refs` never alias
//! a mutable borrow of another field.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::mem;
use std::ptr::{addr_of, addr_of_mut, NonNull};
use std::sync::atomic::AtomicUsize;

use crate::destructor::Destructor;

/// Alignment of every block, and therefore of every payload.
pub const BLOCK_ALIGN: usize = 16;

/// Byte distance from the block base to the payload.
pub const HEADER_SIZE: usize = round_up(mem::size_of::<Header>(), BLOCK_ALIGN);

/// "rmem", checked in debug builds on every header access.
const MAGIC: u32 = 0x726d_656d;

const _: () = assert!(mem::align_of::<Header>() <= BLOCK_ALIGN);
const _: () = assert!(HEADER_SIZE % BLOCK_ALIGN == 0);

const fn round_up(n: usize, align: usize) -> usize {
    (n + align - 1) & !(align - 1)
}

#[repr(C)]
pub(crate) struct Header {
    size: usize,
    refs: AtomicUsize,
    destructor: Option<Destructor>,
    magic: u32,
}

/// Layout of a block with `size` payload bytes, or `None` if it overflows.
pub(crate) fn block_layout(size: usize) -> Option<Layout> {
    let total = HEADER_SIZE.checked_add(size)?;
    Layout::from_size_align(total, BLOCK_ALIGN).ok()
}

/// Raw pointer to a live block header.
#[derive(Clone, Copy)]
pub(crate) struct HeaderPtr(NonNull<Header>);

impl HeaderPtr {
    /// Initialise a header at the start of a fresh allocation.
    ///
    /// # Safety
    ///
    /// `base` must point to at least `block_layout(size)` writable bytes
    /// aligned to [`BLOCK_ALIGN`].
    pub(crate) unsafe fn init(
        base: NonNull<u8>,
        size: usize,
        destructor: Option<Destructor>,
    ) -> Self {
        let header = base.cast::<Header>();
        // SAFETY: caller guarantees space and alignment.
        unsafe {
            header.as_ptr().write(Header {
                size,
                refs: AtomicUsize::new(1),
                destructor,
                magic: MAGIC,
            });
        }
        Self(header)
    }

    /// Header of a block that was moved by the heap (resize).
    ///
    /// # Safety
    ///
    /// `base` must be the base of a block whose header was initialised by
    /// [`init`](Self::init) before being moved bitwise.
    pub(crate) unsafe fn from_base(base: NonNull<u8>) -> Self {
        let this = Self(base.cast());
        this.debug_check();
        this
    }

    /// Header in front of a payload address.
    ///
    /// # Safety
    ///
    /// `payload` must be the payload of a live block.
    pub(crate) unsafe fn from_payload(payload: NonNull<u8>) -> Self {
        // SAFETY: the header lives HEADER_SIZE bytes before every payload.
        let this = Self(unsafe { payload.sub(HEADER_SIZE) }.cast());
        this.debug_check();
        this
    }

    pub(crate) fn base(self) -> NonNull<u8> {
        self.0.cast()
    }

    pub(crate) fn payload(self) -> NonNull<u8> {
        // SAFETY: every block is at least HEADER_SIZE bytes long.
        unsafe { self.base().add(HEADER_SIZE) }
    }

    /// # Safety
    ///
    /// The block must be allocated for `'a`.
    pub(crate) unsafe fn refs<'a>(self) -> &'a AtomicUsize {
        // SAFETY: field projection of a live header; atomics allow shared access.
        unsafe { &*addr_of!((*self.0.as_ptr()).refs) }
    }

    /// # Safety
    ///
    /// The block must be live and not concurrently resized.
    pub(crate) unsafe fn size(self) -> usize {
        // SAFETY: caller contract; `size` is only written by the sole owner.
        unsafe { addr_of!((*self.0.as_ptr()).size).read() }
    }

    /// # Safety
    ///
    /// Caller must be the sole owner of the block.
    pub(crate) unsafe fn set_size(self, size: usize) {
        // SAFETY: sole owner, no concurrent readers of `size`.
        unsafe { addr_of_mut!((*self.0.as_ptr()).size).write(size) }
    }

    /// # Safety
    ///
    /// The block must be live.
    pub(crate) unsafe fn has_destructor(self) -> bool {
        // SAFETY: caller contract; only the destroying thread writes it.
        unsafe { (*addr_of!((*self.0.as_ptr()).destructor)).is_some() }
    }

    /// Take the destructor out, leaving `None`.
    ///
    /// # Safety
    ///
    /// The reference count must have reached zero, so no other thread can
    /// observe the field.
    pub(crate) unsafe fn take_destructor(self) -> Option<Destructor> {
        // SAFETY: exclusive access per caller contract.
        unsafe { (*addr_of_mut!((*self.0.as_ptr()).destructor)).take() }
    }

    /// Layout the block was allocated with.
    ///
    /// # Safety
    ///
    /// Same as [`size`](Self::size).
    pub(crate) unsafe fn layout(self) -> Layout {
        // SAFETY: this size produced a valid layout when the block was
        // allocated or last resized.
        unsafe {
            let size = self.size();
            Layout::from_size_align_unchecked(HEADER_SIZE + size, BLOCK_ALIGN)
        }
    }

    #[inline]
    fn debug_check(self) {
        #[cfg(debug_assertions)]
        {
            // SAFETY: callers of the constructors vouch for a live header.
            let magic = unsafe { addr_of!((*self.0.as_ptr()).magic).read() };
            debug_assert_eq!(magic, MAGIC, "not a remem block (bad header magic)");
        }
    }
}
