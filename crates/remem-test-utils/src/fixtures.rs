//! Reusable allocator test fixtures.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use remem_core::{Block, Destructor, RawHeap, SystemHeap};

/// Records destructor invocations.
///
/// Every destructor produced by [`destructor`](Self::destructor) bumps the
/// shared call count and logs the payload address it was given.
#[derive(Clone, Default)]
pub struct DestructorProbe {
    inner: Arc<ProbeInner>,
}

#[derive(Default)]
struct ProbeInner {
    calls: AtomicUsize,
    addresses: Mutex<Vec<usize>>,
}

impl DestructorProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// A destructor reporting to this probe.
    pub fn destructor(&self) -> Option<Destructor> {
        let inner = Arc::clone(&self.inner);
        Some(Destructor::new(move |payload| {
            inner
                .addresses
                .lock()
                .unwrap()
                .push(payload.as_ptr() as usize);
            inner.calls.fetch_add(1, Ordering::SeqCst);
        }))
    }

    /// Total destructor calls so far.
    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Payload addresses seen, in call order.
    pub fn addresses(&self) -> Vec<usize> {
        self.inner.addresses.lock().unwrap().clone()
    }
}

const UNLIMITED: usize = usize::MAX;

/// A system-backed heap that can be told to fail.
///
/// `alloc`, `alloc_zeroed` and `realloc` draw from a success budget; once it
/// is spent they return null. `dealloc` always succeeds. The heap also
/// counts allocations it has handed out and not yet taken back.
#[derive(Debug)]
pub struct FailingHeap {
    budget: AtomicUsize,
    outstanding: AtomicUsize,
    failures: AtomicUsize,
}

impl FailingHeap {
    /// A heap that never fails until told to.
    pub fn new() -> Self {
        Self {
            budget: AtomicUsize::new(UNLIMITED),
            outstanding: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        }
    }

    /// Allow `n` more successful requests, then fail.
    pub fn fail_after(&self, n: usize) {
        self.budget.store(n, Ordering::SeqCst);
    }

    /// Fail every request from now on.
    pub fn fail_all(&self) {
        self.fail_after(0);
    }

    /// Stop failing.
    pub fn heal(&self) {
        self.budget.store(UNLIMITED, Ordering::SeqCst);
    }

    /// Allocations handed out and not yet deallocated.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Requests refused so far.
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    fn admit(&self) -> bool {
        let admitted = self
            .budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |b| match b {
                UNLIMITED => Some(UNLIMITED),
                0 => None,
                n => Some(n - 1),
            })
            .is_ok();
        if !admitted {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
        admitted
    }
}

impl Default for FailingHeap {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: forwards to SystemHeap; refusing a request never touches memory.
unsafe impl RawHeap for FailingHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if !self.admit() {
            return std::ptr::null_mut();
        }
        // SAFETY: forwarded caller contract.
        let p = unsafe { SystemHeap.alloc(layout) };
        if !p.is_null() {
            self.outstanding.fetch_add(1, Ordering::SeqCst);
        }
        p
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        if !self.admit() {
            return std::ptr::null_mut();
        }
        // SAFETY: forwarded caller contract.
        let p = unsafe { SystemHeap.alloc_zeroed(layout) };
        if !p.is_null() {
            self.outstanding.fetch_add(1, Ordering::SeqCst);
        }
        p
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if !self.admit() {
            return std::ptr::null_mut();
        }
        // SAFETY: forwarded caller contract.
        unsafe { SystemHeap.realloc(ptr, layout, new_size) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        // SAFETY: forwarded caller contract.
        unsafe { SystemHeap.dealloc(ptr, layout) }
    }
}

/// Deterministic byte pattern of length `len`, varied by `seed`.
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

/// Write [`pattern`]`(len, seed)` into the first `len` payload bytes.
///
/// # Safety
///
/// `block` must be live with a payload of at least `len` bytes, and no
/// other access to those bytes may happen concurrently.
pub unsafe fn fill_pattern(block: Block, len: usize, seed: u8) {
    let bytes = pattern(len, seed);
    // SAFETY: caller guarantees `len` writable payload bytes.
    unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), block.as_ptr(), len) };
}
