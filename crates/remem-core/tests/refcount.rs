//! Reference-count conservation, destructor-once and concurrency tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use proptest::prelude::*;
use remem_core::{Allocator, Block, Destructor, MemConfig, Tracking};
use remem_test_utils::{fill_pattern, pattern, DestructorProbe, FailingHeap};

fn tracked_on(heap: &FailingHeap) -> Allocator<&FailingHeap> {
    Allocator::with_heap(
        heap,
        MemConfig {
            tracking: Tracking::Blocks,
            ..MemConfig::default()
        },
    )
    .unwrap()
}

proptest! {
    /// The block dies iff releases == 1 + retains, and exactly once.
    #[test]
    fn count_is_conserved(ops in proptest::collection::vec(any::<bool>(), 0..200)) {
        let heap = FailingHeap::new();
        let alloc = tracked_on(&heap);
        let probe = DestructorProbe::new();
        let block = alloc.alloc(24, probe.destructor()).unwrap();

        let mut model = 1usize;
        for retain in ops {
            if retain {
                unsafe { alloc.retain(block) };
                model += 1;
            } else if model > 1 {
                let destroyed = unsafe { alloc.release(block) };
                model -= 1;
                prop_assert!(!destroyed);
            }
            prop_assert_eq!(unsafe { alloc.refs(block) }, model);
            prop_assert_eq!(probe.calls(), 0);
        }

        while model > 1 {
            let destroyed = unsafe { alloc.release(block) };
            prop_assert!(!destroyed);
            model -= 1;
        }
        prop_assert_eq!(probe.calls(), 0);
        let destroyed = unsafe { alloc.release(block) };
        prop_assert!(destroyed);
        prop_assert_eq!(probe.calls(), 1);
        prop_assert_eq!(alloc.stats().blocks, 0);
        prop_assert_eq!(heap.outstanding(), 0);
    }
}

#[test]
fn destructor_runs_once_with_original_address() {
    let alloc = Allocator::default();
    let probe = DestructorProbe::new();
    let block = alloc.alloc(64, probe.destructor()).unwrap();
    let addr = block.addr();
    unsafe {
        for _ in 0..5 {
            alloc.retain(block);
        }
        for _ in 0..5 {
            alloc.release(block);
        }
        assert_eq!(probe.calls(), 0);
        alloc.release(block);
    }
    assert_eq!(probe.calls(), 1);
    assert_eq!(probe.addresses(), vec![addr]);
}

#[test]
fn destructor_fires_before_address_reuse() {
    const SIZE: usize = 48;

    let alloc = Allocator::default();
    // (payload address, payload still intact when the destructor ran)
    let log: Arc<Mutex<Vec<(usize, bool)>>> = Arc::default();
    let mut seen: Vec<usize> = Vec::new();

    for i in 0..64u8 {
        let dtor = {
            let log = Arc::clone(&log);
            Destructor::new(move |p| {
                let bytes = unsafe { std::slice::from_raw_parts(p.as_ptr(), SIZE) };
                let intact = bytes == pattern(SIZE, i).as_slice();
                log.lock().unwrap().push((p.as_ptr() as usize, intact));
            })
        };
        let block = alloc.alloc(SIZE, Some(dtor)).unwrap();
        if let Some(prev) = seen.iter().rposition(|&a| a == block.addr()) {
            // The previous owner of this address was destroyed, with its
            // contents still in place, before the address came back.
            let log = log.lock().unwrap();
            assert_eq!(log.len(), usize::from(i));
            assert_eq!(log[prev], (block.addr(), true));
        }
        seen.push(block.addr());
        unsafe {
            fill_pattern(block, SIZE, i);
            alloc.release(block);
        }
        assert_eq!(log.lock().unwrap()[usize::from(i)], (block.addr(), true));
    }
    assert_eq!(log.lock().unwrap().len(), 64);
}

#[test]
fn concurrent_retain_release_destroys_once() {
    const THREADS: usize = 16;
    const ROUNDS: usize = 1_000;

    let heap = FailingHeap::new();
    let alloc = tracked_on(&heap);
    let probe = DestructorProbe::new();
    let block = alloc.alloc(128, probe.destructor()).unwrap();
    let barrier = Barrier::new(THREADS);

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                barrier.wait();
                for _ in 0..ROUNDS {
                    let alias = unsafe { alloc.retain(block) };
                    assert!(!unsafe { alloc.release(alias) });
                }
            });
        }
    });

    assert_eq!(probe.calls(), 0);
    assert_eq!(unsafe { alloc.refs(block) }, 1);
    assert!(unsafe { alloc.release(block) });
    assert_eq!(probe.calls(), 1);
    assert_eq!(heap.outstanding(), 0);
}

#[test]
fn last_release_on_any_thread_destroys_exactly_once() {
    const THREADS: usize = 8;

    let alloc = Allocator::default();
    let probe = DestructorProbe::new();
    let destroyed_by = AtomicUsize::new(0);
    let block = alloc.alloc(32, probe.destructor()).unwrap();
    for _ in 0..THREADS - 1 {
        unsafe { alloc.retain(block) };
    }
    let barrier = Barrier::new(THREADS);

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                barrier.wait();
                if unsafe { alloc.release(block) } {
                    destroyed_by.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
    });

    assert_eq!(destroyed_by.load(Ordering::SeqCst), 1);
    assert_eq!(probe.calls(), 1);
    assert_eq!(alloc.stats().blocks, 0);
}

#[test]
fn handles_released_on_other_threads() {
    const WORKERS: usize = 4;
    const BLOCKS: usize = 256;

    let alloc = Arc::new(Allocator::default());
    let probe = DestructorProbe::new();
    let (tx, rx) = crossbeam_channel::bounded::<Block>(32);

    let workers: Vec<_> = (0..WORKERS)
        .map(|_| {
            let rx = rx.clone();
            let alloc = Arc::clone(&alloc);
            thread::spawn(move || {
                for block in rx {
                    unsafe { alloc.release(block) };
                }
            })
        })
        .collect();

    for _ in 0..BLOCKS {
        let block = alloc.alloc(16, probe.destructor()).unwrap();
        // One reference travels to a worker, one stays here.
        tx.send(unsafe { alloc.retain(block) }).unwrap();
        unsafe { alloc.release(block) };
    }
    drop(tx);
    for w in workers {
        w.join().unwrap();
    }

    assert_eq!(probe.calls(), BLOCKS);
    assert_eq!(alloc.stats().blocks, 0);
    assert_eq!(alloc.stats().bytes, 0);
}

#[test]
fn concurrent_allocation_keeps_registry_consistent() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 200;

    let heap = FailingHeap::new();
    let alloc = tracked_on(&heap);

    thread::scope(|s| {
        for t in 0..THREADS {
            let alloc = &alloc;
            s.spawn(move || {
                let mut mine: Vec<(Block, usize)> = Vec::new();
                for i in 0..PER_THREAD {
                    let size = t * 8 + i % 7;
                    mine.push((alloc.alloc(size, None).unwrap(), size));
                    if i % 3 == 0 {
                        let (b, _) = mine.swap_remove(0);
                        unsafe { alloc.release(b) };
                    }
                    // Every block this thread holds is listed, with its size
                    // and sole reference, while others mutate the registry.
                    let listing = alloc.snapshot();
                    for &(b, size) in &mine {
                        let info = listing
                            .iter()
                            .find(|info| info.addr == b.addr())
                            .expect("live block missing from snapshot");
                        assert_eq!((info.size, info.refs), (size, 1));
                    }
                }
                for (b, _) in mine {
                    unsafe { alloc.release(b) };
                }
            });
        }
    });

    assert!(alloc.snapshot().is_empty());
    assert_eq!(alloc.stats().blocks, 0);
    assert_eq!(heap.outstanding(), 0);
}
