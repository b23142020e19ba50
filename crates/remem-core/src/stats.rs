//! Allocation accounting and the optional live-block registry.
//!
//! [`Counters`] are lock-free and always on. Each counter is exact on its
//! own, but a [`MemStats`] read while other threads allocate is not a
//! single atomic cut: `blocks` and `bytes` may come from slightly different
//! moments. The [`Registry`] exists only under
//! [`Tracking::Blocks`](crate::Tracking::Blocks) and gives a consistent
//! per-block listing, at the cost of one mutex taken on allocate, resize
//! and destroy.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;

use crate::block::Block;

/// Point-in-time allocator statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemStats {
    /// Live blocks.
    pub blocks: usize,
    /// Live payload bytes (headers excluded).
    pub bytes: usize,
    /// Highest value `bytes` has reached.
    pub peak_bytes: usize,
    /// Successful allocations since creation.
    pub allocations: u64,
    /// Allocations and resizes that failed with `OutOfMemory`.
    pub failures: u64,
}

/// One entry of a per-block listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    /// Payload address.
    pub addr: usize,
    /// Payload size in bytes.
    pub size: usize,
    /// Reference count when the listing was taken.
    pub refs: usize,
    /// Whether a destructor is attached.
    pub has_destructor: bool,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    blocks: AtomicUsize,
    bytes: AtomicUsize,
    peak_bytes: AtomicUsize,
    allocations: AtomicU64,
    failures: AtomicU64,
}

impl Counters {
    pub(crate) const fn new() -> Self {
        Self {
            blocks: AtomicUsize::new(0),
            bytes: AtomicUsize::new(0),
            peak_bytes: AtomicUsize::new(0),
            allocations: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Account `n` more live bytes if that keeps the total within `limit`.
    ///
    /// Returns the new total. The peak is not raised until the caller
    /// commits the reservation with [`Counters::record_peak`].
    pub(crate) fn reserve(&self, n: usize, limit: usize) -> Option<usize> {
        self.bytes
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |cur| {
                cur.checked_add(n).filter(|&total| total <= limit)
            })
            .ok()
            .map(|prev| prev + n)
    }

    /// Raise the high-water mark to a committed reservation total.
    pub(crate) fn record_peak(&self, total: usize) {
        self.peak_bytes.fetch_max(total, Ordering::Relaxed);
    }

    pub(crate) fn unreserve(&self, n: usize) {
        self.bytes.fetch_sub(n, Ordering::Relaxed);
    }

    pub(crate) fn record_alloc(&self) {
        self.blocks.fetch_add(1, Ordering::Relaxed);
        self.allocations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_free(&self, size: usize) {
        self.blocks.fetch_sub(1, Ordering::Relaxed);
        self.unreserve(size);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> MemStats {
        MemStats {
            blocks: self.blocks.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            peak_bytes: self.peak_bytes.load(Ordering::Relaxed),
            allocations: self.allocations.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct BlockRecord {
    pub(crate) block: Block,
    pub(crate) size: usize,
    pub(crate) has_destructor: bool,
}

/// Live blocks keyed by payload address, in allocation order.
pub(crate) type BlockMap = IndexMap<usize, BlockRecord>;

#[derive(Debug, Default)]
pub(crate) struct Registry {
    map: Mutex<BlockMap>,
}

impl Registry {
    /// Lock the registry.
    ///
    /// A poisoned lock is recovered: no code path panics while the map is
    /// half-updated, so its contents stay consistent.
    pub(crate) fn lock(&self) -> MutexGuard<'_, BlockMap> {
        self.map.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn insert(&self, record: BlockRecord) {
        self.lock().insert(record.block.addr(), record);
    }

    pub(crate) fn remove(&self, addr: usize) {
        self.lock().shift_remove(&addr);
    }
}

/// Re-key a record after its block moved, keeping its position.
pub(crate) fn relocate(map: &mut BlockMap, old: usize, block: Block, size: usize) {
    if let Some((index, _, record)) = map.shift_remove_full(&old) {
        map.shift_insert(
            index,
            block.addr(),
            BlockRecord {
                block,
                size,
                ..record
            },
        );
    }
}
