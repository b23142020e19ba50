//! The reference-counted block allocator.
//!
//! [`Allocator`] hands out [`Block`]s whose lifetime is governed by an
//! explicit, atomic reference count stored in the block header:
//!
//! ```text
//! alloc/zalloc ──► Live(1) ──retain──► Live(n+1)
//!                     │  ◄──release── (n > 1)
//!                     └──release (1 → 0)──► destructor ► unregister ► free
//! ```
//!
//! Counting follows `Arc`: increments are `Relaxed`, decrements are
//! `Release`, and the thread that takes the count to zero issues an
//! `Acquire` fence before running the destructor, so every write made
//! through any reference happens-before destruction.

#![allow(unsafe_code)]

use std::io;
use std::ptr::{self, NonNull};
use std::sync::atomic::{self, AtomicUsize, Ordering};

use crate::block::Block;
use crate::config::{MemConfig, Tracking};
use crate::destructor::Destructor;
use crate::error::{ConfigError, MemError};
use crate::header::{block_layout, HeaderPtr};
use crate::heap::{RawHeap, SystemHeap};
use crate::stats::{self, BlockInfo, BlockRecord, Counters, MemStats, Registry};

/// Counts above this abort the process rather than risk wrapping.
const MAX_REFCOUNT: usize = isize::MAX as usize;

/// Threshold value meaning "no threshold".
const NO_THRESHOLD: usize = usize::MAX;

/// Reference-counted block allocator over a [`RawHeap`].
///
/// All methods take `&self`; the allocator is `Send + Sync` and can be
/// shared freely (see [`global`](crate::global) for the process-wide one).
/// Blocks must be returned to the allocator that created them.
#[derive(Debug)]
pub struct Allocator<H: RawHeap = SystemHeap> {
    heap: H,
    zero_on_grow: bool,
    threshold: AtomicUsize,
    counters: Counters,
    registry: Option<Registry>,
}

impl Allocator<SystemHeap> {
    /// Create an allocator over the system heap.
    pub fn new(config: MemConfig) -> Result<Self, ConfigError> {
        Self::with_heap(SystemHeap, config)
    }
}

impl Default for Allocator<SystemHeap> {
    fn default() -> Self {
        Self::from_valid(SystemHeap, MemConfig::default())
    }
}

impl<H: RawHeap> Allocator<H> {
    /// Create an allocator over a custom heap.
    pub fn with_heap(heap: H, config: MemConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_valid(heap, config))
    }

    /// Create an allocator with the default config in a `const` context,
    /// so it can live in a `static` (see [`RcAlloc`](crate::RcAlloc)).
    ///
    /// Counters only, no threshold, growth bytes left unspecified.
    pub const fn const_new(heap: H) -> Self {
        Self {
            heap,
            zero_on_grow: MemConfig::DEFAULT_ZERO_ON_GROW,
            threshold: AtomicUsize::new(NO_THRESHOLD),
            counters: Counters::new(),
            registry: None,
        }
    }

    pub(crate) fn from_valid(heap: H, config: MemConfig) -> Self {
        Self {
            heap,
            zero_on_grow: config.zero_on_grow,
            threshold: AtomicUsize::new(config.threshold.unwrap_or(NO_THRESHOLD)),
            counters: Counters::default(),
            registry: match config.tracking {
                Tracking::Counters => None,
                Tracking::Blocks => Some(Registry::default()),
            },
        }
    }

    /// The underlying heap.
    pub fn heap(&self) -> &H {
        &self.heap
    }

    /// Tracking level this allocator was built with.
    pub fn tracking(&self) -> Tracking {
        if self.registry.is_some() {
            Tracking::Blocks
        } else {
            Tracking::Counters
        }
    }

    /// Allocate a block of `size` uninitialised bytes with refcount 1.
    ///
    /// `size` may be zero; the result is then a live block with an empty
    /// payload. On failure the destructor is dropped without being called.
    pub fn alloc(&self, size: usize, destructor: Option<Destructor>) -> Result<Block, MemError> {
        self.allocate(size, destructor, false)
    }

    /// Allocate a block of `size` zero bytes with refcount 1.
    ///
    /// Uses the heap's zeroed allocation directly instead of clearing after
    /// the fact.
    pub fn zalloc(&self, size: usize, destructor: Option<Destructor>) -> Result<Block, MemError> {
        self.allocate(size, destructor, true)
    }

    fn allocate(
        &self,
        size: usize,
        destructor: Option<Destructor>,
        zeroed: bool,
    ) -> Result<Block, MemError> {
        let Some(layout) = block_layout(size) else {
            return Err(self.fail(size));
        };
        let Some(reserved) = self
            .counters
            .reserve(size, self.threshold.load(Ordering::Relaxed))
        else {
            return Err(self.fail(size));
        };

        // SAFETY: the layout always includes the header, so it is non-empty.
        let raw = unsafe {
            if zeroed {
                self.heap.alloc_zeroed(layout)
            } else {
                self.heap.alloc(layout)
            }
        };
        let Some(base) = NonNull::new(raw) else {
            self.counters.unreserve(size);
            return Err(self.fail(size));
        };

        let has_destructor = destructor.is_some();
        // SAFETY: `base` is a fresh allocation of `layout`, aligned to BLOCK_ALIGN.
        let header = unsafe { HeaderPtr::init(base, size, destructor) };
        let block = Block::from_payload(header.payload());

        self.counters.record_peak(reserved);
        self.counters.record_alloc();
        if let Some(registry) = &self.registry {
            registry.insert(BlockRecord {
                block,
                size,
                has_destructor,
            });
        }
        Ok(block)
    }

    /// Resize a block to `new_size` bytes, possibly moving it.
    ///
    /// The first `min(old, new)` bytes are preserved and the destructor is
    /// kept. Bytes added by growth are unspecified, unless the allocator
    /// was configured with `zero_on_grow`, in which case they are zero.
    ///
    /// On failure the original block is untouched: same address, size,
    /// contents and refcount.
    ///
    /// # Safety
    ///
    /// `block` must be live, come from this allocator, and the caller must
    /// hold its only reference. Any other copy of the handle is invalid
    /// after a successful resize.
    pub unsafe fn resize(&self, block: Block, new_size: usize) -> Result<Block, MemError> {
        // SAFETY: caller contract.
        let header = unsafe { HeaderPtr::from_payload(block.as_non_null()) };
        // SAFETY: live block, sole owner.
        let (old_size, old_layout) = unsafe { (header.size(), header.layout()) };
        debug_assert_eq!(
            // SAFETY: live block.
            unsafe { header.refs() }.load(Ordering::Relaxed),
            1,
            "resize requires the sole reference"
        );

        let Some(new_layout) = block_layout(new_size) else {
            return Err(self.fail(new_size));
        };
        let grow = new_size.saturating_sub(old_size);
        let mut reserved = None;
        if grow > 0 {
            reserved = self
                .counters
                .reserve(grow, self.threshold.load(Ordering::Relaxed));
            if reserved.is_none() {
                return Err(self.fail(new_size));
            }
        }

        // Held across the move so listings never read a header mid-flight.
        let mut registry = self.registry.as_ref().map(Registry::lock);

        // SAFETY: the block was allocated by this heap with `old_layout`;
        // `new_layout` validated the new size.
        let raw = unsafe {
            self.heap
                .realloc(header.base().as_ptr(), old_layout, new_layout.size())
        };
        let Some(base) = NonNull::new(raw) else {
            drop(registry);
            if grow > 0 {
                self.counters.unreserve(grow);
            }
            return Err(self.fail(new_size));
        };

        // SAFETY: the heap moved the block bitwise, header included.
        let moved = unsafe { HeaderPtr::from_base(base) };
        // SAFETY: sole owner.
        unsafe { moved.set_size(new_size) };
        if let Some(total) = reserved {
            self.counters.record_peak(total);
        }
        if new_size < old_size {
            self.counters.unreserve(old_size - new_size);
        }
        if self.zero_on_grow && grow > 0 {
            // SAFETY: bytes old_size..new_size lie inside the new payload.
            unsafe { ptr::write_bytes(moved.payload().as_ptr().add(old_size), 0, grow) };
        }

        let resized = Block::from_payload(moved.payload());
        if let Some(map) = registry.as_deref_mut() {
            stats::relocate(map, block.addr(), resized, new_size);
        }
        Ok(resized)
    }

    /// Take one more reference to `block` and return it.
    ///
    /// # Safety
    ///
    /// `block` must be live and come from this allocator.
    pub unsafe fn retain(&self, block: Block) -> Block {
        // SAFETY: caller contract.
        let header = unsafe { HeaderPtr::from_payload(block.as_non_null()) };
        // SAFETY: live block.
        let old = unsafe { header.refs() }.fetch_add(1, Ordering::Relaxed);
        if old > MAX_REFCOUNT {
            std::process::abort();
        }
        block
    }

    /// Drop one reference to `block`.
    ///
    /// If it was the last one, the destructor (if any) runs with the
    /// payload address, the block is unregistered, and its storage is
    /// freed, all before this call returns. Returns `true` in that case.
    ///
    /// If a closure destructor panics, the storage is still freed and the
    /// panic then propagates.
    ///
    /// # Safety
    ///
    /// `block` must be live and come from this allocator, and the caller
    /// must own the reference being dropped. Releasing more often than
    /// acquiring is undefined behaviour.
    pub unsafe fn release(&self, block: Block) -> bool {
        // SAFETY: caller contract.
        let header = unsafe { HeaderPtr::from_payload(block.as_non_null()) };
        // SAFETY: live block.
        if unsafe { header.refs() }.fetch_sub(1, Ordering::Release) != 1 {
            return false;
        }
        atomic::fence(Ordering::Acquire);

        // SAFETY: the count reached zero; this thread now owns the block.
        unsafe { self.destroy(header) };
        true
    }

    /// # Safety
    ///
    /// The block's count must have just reached zero on this thread.
    unsafe fn destroy(&self, header: HeaderPtr) {
        let reclaim = Reclaim {
            allocator: self,
            header,
        };
        // SAFETY: exclusive owner.
        if let Some(destructor) = unsafe { header.take_destructor() } {
            // SAFETY: the payload is still allocated and unreachable.
            unsafe { destructor.destroy(header.payload()) };
        }
        drop(reclaim);
    }

    /// Current reference count of `block`.
    ///
    /// # Safety
    ///
    /// `block` must be live and come from this allocator.
    pub unsafe fn refs(&self, block: Block) -> usize {
        // SAFETY: caller contract.
        unsafe { HeaderPtr::from_payload(block.as_non_null()).refs() }.load(Ordering::Acquire)
    }

    /// Payload size of `block` in bytes.
    ///
    /// # Safety
    ///
    /// `block` must be live, come from this allocator, and not be resized
    /// concurrently.
    pub unsafe fn size_of(&self, block: Block) -> usize {
        // SAFETY: caller contract.
        unsafe { HeaderPtr::from_payload(block.as_non_null()).size() }
    }

    /// Whether `block` carries a destructor.
    ///
    /// # Safety
    ///
    /// Same as [`size_of`](Self::size_of).
    pub unsafe fn has_destructor(&self, block: Block) -> bool {
        // SAFETY: caller contract.
        unsafe { HeaderPtr::from_payload(block.as_non_null()).has_destructor() }
    }

    /// Borrow the payload bytes.
    ///
    /// # Safety
    ///
    /// As [`size_of`](Self::size_of), plus: every payload byte must be
    /// initialised (always true after [`zalloc`](Self::zalloc); after
    /// [`alloc`](Self::alloc) only once the caller has written them), and
    /// nobody may write the payload while the slice is alive.
    pub unsafe fn payload(&self, block: Block) -> &[u8] {
        // SAFETY: caller contract.
        unsafe { std::slice::from_raw_parts(block.as_ptr(), self.size_of(block)) }
    }

    /// Mutably borrow the payload bytes.
    ///
    /// # Safety
    ///
    /// As [`payload`](Self::payload), and the returned slice must be the
    /// only access to the payload while it is alive.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn payload_mut(&self, block: Block) -> &mut [u8] {
        // SAFETY: caller contract.
        unsafe { std::slice::from_raw_parts_mut(block.as_ptr(), self.size_of(block)) }
    }

    /// Current live-byte threshold, if any.
    pub fn threshold(&self) -> Option<usize> {
        match self.threshold.load(Ordering::Relaxed) {
            NO_THRESHOLD => None,
            n => Some(n),
        }
    }

    /// Set or clear the live-byte threshold.
    ///
    /// Lowering the threshold below the current live bytes does not free
    /// anything; it only makes further allocations fail until enough
    /// blocks are released.
    ///
    /// `Some(0)` is rejected with [`ConfigError::InvalidThreshold`], as in
    /// [`MemConfig::validate`], and the current threshold is kept.
    pub fn set_threshold(&self, threshold: Option<usize>) -> Result<(), ConfigError> {
        if threshold == Some(0) {
            return Err(ConfigError::InvalidThreshold);
        }
        self.threshold
            .store(threshold.unwrap_or(NO_THRESHOLD), Ordering::Relaxed);
        Ok(())
    }

    /// Lock-free statistics snapshot.
    pub fn stats(&self) -> MemStats {
        self.counters.snapshot()
    }

    /// List live blocks in allocation order.
    ///
    /// Empty unless the allocator tracks blocks. The listing is consistent:
    /// it is taken under the registry lock, which allocate, resize and
    /// destroy also take.
    pub fn snapshot(&self) -> Vec<BlockInfo> {
        let Some(registry) = &self.registry else {
            return Vec::new();
        };
        let map = registry.lock();
        map.values()
            .filter_map(|record| {
                // SAFETY: registered blocks stay allocated until removed
                // under this lock, and cannot move while it is held.
                let refs = unsafe { HeaderPtr::from_payload(record.block.as_non_null()).refs() }
                    .load(Ordering::Acquire);
                // A block whose destructor is running is already dead.
                (refs > 0).then_some(BlockInfo {
                    addr: record.block.addr(),
                    size: record.size,
                    refs,
                    has_destructor: record.has_destructor,
                })
            })
            .collect()
    }

    /// Render the statistics and block listing as text.
    pub fn write_report<W: io::Write>(&self, mut out: W) -> io::Result<()> {
        let stats = self.stats();
        writeln!(
            out,
            "remem: {} live blocks, {} bytes (peak {}), {} allocations, {} failures",
            stats.blocks, stats.bytes, stats.peak_bytes, stats.allocations, stats.failures
        )?;
        if let Some(threshold) = self.threshold() {
            writeln!(out, "  threshold: {threshold} bytes")?;
        }
        if self.registry.is_none() {
            writeln!(out, "  (per-block tracking disabled)")?;
            return Ok(());
        }
        for info in self.snapshot() {
            writeln!(
                out,
                "  {:#x}: size={} refs={}{}",
                info.addr,
                info.size,
                info.refs,
                if info.has_destructor { " dtor" } else { "" }
            )?;
        }
        Ok(())
    }

    /// Emit the report as `tracing` events on target `remem::debug`.
    ///
    /// One `info` event carries the totals, followed by one `debug` event
    /// per live block when blocks are tracked.
    pub fn debug(&self) {
        let stats = self.stats();
        tracing::info!(
            target: "remem::debug",
            blocks = stats.blocks,
            bytes = stats.bytes,
            peak_bytes = stats.peak_bytes,
            allocations = stats.allocations,
            failures = stats.failures,
            threshold = ?self.threshold(),
            "live memory"
        );
        for info in self.snapshot() {
            tracing::debug!(
                target: "remem::debug",
                addr = format_args!("{:#x}", info.addr),
                size = info.size,
                refs = info.refs,
                destructor = info.has_destructor,
                "live block"
            );
        }
    }

    fn fail(&self, requested: usize) -> MemError {
        self.counters.record_failure();
        MemError::OutOfMemory { requested }
    }
}

/// Frees a dying block when dropped, so storage is returned even if the
/// destructor unwinds.
struct Reclaim<'a, H: RawHeap> {
    allocator: &'a Allocator<H>,
    header: HeaderPtr,
}

impl<H: RawHeap> Drop for Reclaim<'_, H> {
    fn drop(&mut self) {
        let allocator = self.allocator;
        // SAFETY: the block is dead and exclusively owned by this guard.
        unsafe {
            let size = self.header.size();
            let layout = self.header.layout();
            if let Some(registry) = &allocator.registry {
                registry.remove(self.header.payload().as_ptr() as usize);
            }
            allocator.counters.record_free(size);
            allocator
                .heap
                .dealloc(self.header.base().as_ptr(), layout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn counting(hits: &Arc<AtomicUsize>) -> Option<Destructor> {
        let hits = Arc::clone(hits);
        Some(Destructor::new(move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        }))
    }

    fn tracked() -> Allocator {
        Allocator::new(MemConfig {
            tracking: Tracking::Blocks,
            ..MemConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn alloc_starts_with_one_reference() {
        let a = Allocator::default();
        let b = a.alloc(32, None).unwrap();
        unsafe {
            assert_eq!(a.refs(b), 1);
            assert_eq!(a.size_of(b), 32);
            assert!(!a.has_destructor(b));
            assert!(a.release(b));
        }
    }

    #[test]
    fn payload_is_block_aligned() {
        let a = Allocator::default();
        for size in [0, 1, 7, 33, 4096] {
            let b = a.alloc(size, None).unwrap();
            assert_eq!(b.addr() % crate::BLOCK_ALIGN, 0);
            unsafe { a.release(b) };
        }
    }

    #[test]
    fn zero_size_block_is_live() {
        let a = Allocator::default();
        let b = a.zalloc(0, None).unwrap();
        unsafe {
            assert_eq!(a.size_of(b), 0);
            assert!(a.payload(b).is_empty());
            assert_eq!(a.refs(b), 1);
            a.release(b);
        }
        assert_eq!(a.stats().blocks, 0);
    }

    #[test]
    fn retain_release_destroys_on_last() {
        let a = Allocator::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let b = a.alloc(8, counting(&hits)).unwrap();
        unsafe {
            let alias = a.retain(b);
            assert_eq!(alias, b);
            assert_eq!(a.refs(b), 2);
            assert!(!a.release(alias));
            assert_eq!(hits.load(Ordering::SeqCst), 0);
            assert!(a.release(b));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn destructor_sees_payload_address_and_contents() {
        let a = Allocator::default();
        let seen = Arc::new(std::sync::Mutex::new(None));
        let probe = Arc::clone(&seen);
        let b = a
            .zalloc(
                4,
                Some(Destructor::new(move |p| {
                    let bytes = unsafe { std::slice::from_raw_parts(p.as_ptr(), 4) }.to_vec();
                    *probe.lock().unwrap() = Some((p.as_ptr() as usize, bytes));
                })),
            )
            .unwrap();
        unsafe {
            a.payload_mut(b).copy_from_slice(&[1, 2, 3, 4]);
            a.release(b);
        }
        let (addr, bytes) = seen.lock().unwrap().take().unwrap();
        assert_eq!(addr, b.addr());
        assert_eq!(bytes, vec![1, 2, 3, 4]);
    }

    #[test]
    fn zalloc_is_zeroed() {
        let a = Allocator::default();
        let b = a.zalloc(4096, None).unwrap();
        unsafe {
            assert!(a.payload(b).iter().all(|&x| x == 0));
            a.release(b);
        }
    }

    #[test]
    fn resize_keeps_destructor_and_prefix() {
        let a = Allocator::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let b = a.zalloc(16, counting(&hits)).unwrap();
        unsafe {
            for (i, byte) in a.payload_mut(b).iter_mut().enumerate() {
                *byte = i as u8;
            }
            let b = a.resize(b, 1 << 16).unwrap();
            assert_eq!(a.size_of(b), 1 << 16);
            assert!(a.has_destructor(b));
            let prefix: Vec<u8> = (0..16).collect();
            assert_eq!(std::slice::from_raw_parts(b.as_ptr(), 16), prefix.as_slice());
            let b = a.resize(b, 4).unwrap();
            assert_eq!(a.payload(b), &[0, 1, 2, 3]);
            a.release(b);
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_on_grow_clears_new_bytes() {
        let a = Allocator::new(MemConfig {
            zero_on_grow: true,
            ..MemConfig::default()
        })
        .unwrap();
        let b = a.alloc(4, None).unwrap();
        unsafe {
            ptr::write_bytes(b.as_ptr(), 0xFF, 4);
            let b = a.resize(b, 64).unwrap();
            let bytes = a.payload(b);
            assert_eq!(&bytes[..4], &[0xFF; 4]);
            assert!(bytes[4..].iter().all(|&x| x == 0));
            a.release(b);
        }
    }

    #[test]
    fn stats_follow_lifecycle() {
        let a = Allocator::default();
        let x = a.alloc(100, None).unwrap();
        let y = a.alloc(50, None).unwrap();
        let s = a.stats();
        assert_eq!((s.blocks, s.bytes, s.allocations), (2, 150, 2));
        unsafe {
            let x = a.resize(x, 10).unwrap();
            assert_eq!(a.stats().bytes, 60);
            a.release(x);
            a.release(y);
        }
        let s = a.stats();
        assert_eq!((s.blocks, s.bytes, s.peak_bytes), (0, 0, 150));
    }

    #[test]
    fn threshold_rejects_and_recovers() {
        let a = Allocator::new(MemConfig {
            threshold: Some(100),
            ..MemConfig::default()
        })
        .unwrap();
        let x = a.alloc(80, None).unwrap();
        assert_eq!(
            a.alloc(30, None).unwrap_err(),
            MemError::OutOfMemory { requested: 30 }
        );
        unsafe {
            assert!(a.resize(x, 101).is_err());
            assert_eq!(a.size_of(x), 80);
            a.release(x);
        }
        let y = a.alloc(100, None).unwrap();
        unsafe { a.release(y) };
        assert_eq!(a.stats().failures, 2);
    }

    #[test]
    fn set_threshold_round_trip() {
        let a = Allocator::default();
        assert_eq!(a.threshold(), None);
        a.set_threshold(Some(64)).unwrap();
        assert_eq!(a.threshold(), Some(64));
        assert!(a.alloc(65, None).is_err());
        a.set_threshold(None).unwrap();
        let b = a.alloc(65, None).unwrap();
        unsafe { a.release(b) };
    }

    #[test]
    fn zero_threshold_is_rejected_at_runtime() {
        let a = Allocator::default();
        a.set_threshold(Some(128)).unwrap();
        assert_eq!(
            a.set_threshold(Some(0)).unwrap_err(),
            ConfigError::InvalidThreshold
        );
        assert_eq!(a.threshold(), Some(128));
        let b = a.alloc(1, None).unwrap();
        unsafe { a.release(b) };
    }

    #[test]
    fn oversized_request_is_out_of_memory() {
        let a = Allocator::default();
        let err = a.alloc(usize::MAX, None).unwrap_err();
        assert_eq!(
            err,
            MemError::OutOfMemory {
                requested: usize::MAX
            }
        );
        assert_eq!(a.stats().bytes, 0);
        assert_eq!(a.stats().failures, 1);
    }

    #[test]
    fn failed_alloc_drops_destructor_without_running_it() {
        let a = Allocator::default();
        let hits = Arc::new(AtomicUsize::new(0));
        assert!(a.alloc(usize::MAX, counting(&hits)).is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn snapshot_lists_live_blocks_in_order() {
        let a = tracked();
        let hits = Arc::new(AtomicUsize::new(0));
        let x = a.alloc(10, None).unwrap();
        let y = a.alloc(20, counting(&hits)).unwrap();
        let z = a.alloc(30, None).unwrap();
        unsafe {
            a.retain(y);
            a.release(x);
        }
        let listing = a.snapshot();
        assert_eq!(
            listing,
            vec![
                BlockInfo {
                    addr: y.addr(),
                    size: 20,
                    refs: 2,
                    has_destructor: true,
                },
                BlockInfo {
                    addr: z.addr(),
                    size: 30,
                    refs: 1,
                    has_destructor: false,
                },
            ]
        );
        unsafe {
            a.release(y);
            a.release(y);
            a.release(z);
        }
        assert!(a.snapshot().is_empty());
    }

    #[test]
    fn snapshot_follows_resize() {
        let a = tracked();
        let x = a.alloc(8, None).unwrap();
        let y = a.alloc(8, None).unwrap();
        unsafe {
            let x = a.resize(x, 1 << 20).unwrap();
            let listing = a.snapshot();
            assert_eq!(listing.len(), 2);
            assert_eq!(listing[0].addr, x.addr());
            assert_eq!(listing[0].size, 1 << 20);
            assert_eq!(listing[1].addr, y.addr());
            a.release(x);
            a.release(y);
        }
    }

    #[test]
    fn untracked_snapshot_is_empty() {
        let a = Allocator::default();
        let x = a.alloc(8, None).unwrap();
        assert_eq!(a.tracking(), Tracking::Counters);
        assert!(a.snapshot().is_empty());
        unsafe { a.release(x) };
    }

    #[test]
    fn report_lists_blocks() {
        let a = tracked();
        let x = a.alloc(12, None).unwrap();
        let mut out = Vec::new();
        a.write_report(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("remem: 1 live blocks, 12 bytes"));
        assert!(text.contains(&format!("{:#x}: size=12 refs=1", x.addr())));
        unsafe { a.release(x) };
    }

    #[test]
    fn report_notes_disabled_tracking() {
        let a = Allocator::default();
        let mut out = Vec::new();
        a.write_report(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("per-block tracking disabled"));
    }

    #[test]
    fn panicking_destructor_still_frees() {
        let a = tracked();
        let b = a
            .alloc(
                8,
                Some(Destructor::new(|_| panic!("destructor failure"))),
            )
            .unwrap();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| unsafe {
            a.release(b)
        }));
        assert!(result.is_err());
        assert_eq!(a.stats().blocks, 0);
        assert!(a.snapshot().is_empty());
    }

    #[test]
    fn nested_release_from_destructor() {
        let a = Arc::new(tracked());
        let inner = a.alloc(8, None).unwrap();
        let outer_alloc = Arc::clone(&a);
        let outer = a
            .alloc(
                8,
                Some(Destructor::new(move |_| unsafe {
                    outer_alloc.release(inner);
                })),
            )
            .unwrap();
        assert_eq!(a.stats().blocks, 2);
        unsafe { a.release(outer) };
        assert_eq!(a.stats().blocks, 0);
    }

    /// Collects formatted `tracing` output in memory.
    #[derive(Clone, Default)]
    struct Capture(Arc<std::sync::Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn debug_emits_summary_and_one_event_per_live_block() {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .without_time()
            .with_writer(move || writer.clone())
            .finish();

        let a = tracked();
        let x = a.alloc(10, None).unwrap();
        let y = a.alloc(20, counting(&Arc::default())).unwrap();
        let z = a.alloc(30, None).unwrap();
        unsafe {
            a.retain(y);
            a.release(z);
        }

        tracing::subscriber::with_default(subscriber, || a.debug());
        let out = capture.text();

        let summary: Vec<&str> = out.lines().filter(|l| l.contains("live memory")).collect();
        assert_eq!(summary.len(), 1, "{out}");
        assert!(summary[0].contains("remem::debug"), "{out}");
        assert!(summary[0].contains("blocks=2"), "{out}");
        assert!(summary[0].contains("bytes=30"), "{out}");
        assert!(summary[0].contains("peak_bytes=60"), "{out}");

        let blocks: Vec<&str> = out.lines().filter(|l| l.contains("live block")).collect();
        assert_eq!(blocks.len(), 2, "{out}");
        assert!(blocks[0].contains(&format!("addr={:#x}", x.addr())));
        assert!(blocks[0].contains("size=10 refs=1 destructor=false"));
        assert!(blocks[1].contains(&format!("addr={:#x}", y.addr())));
        assert!(blocks[1].contains("size=20 refs=2 destructor=true"));

        unsafe {
            a.release(x);
            a.release(y);
            a.release(y);
        }
    }

    #[test]
    fn debug_without_block_tracking_emits_summary_only() {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let a = Allocator::default();
        let x = a.alloc(8, None).unwrap();
        tracing::subscriber::with_default(subscriber, || a.debug());
        let out = capture.text();

        assert_eq!(out.lines().filter(|l| l.contains("live memory")).count(), 1);
        assert!(out.contains("blocks=1 bytes=8"), "{out}");
        assert!(!out.contains("live block"), "{out}");
        unsafe { a.release(x) };
    }
}
