//! The whole test binary allocates through an `RcAlloc`.

use remem_core::{Allocator, Block, RcAlloc, SystemHeap};

static BLOCKS: Allocator = Allocator::const_new(SystemHeap);

#[global_allocator]
static GLOBAL: RcAlloc<'static> = RcAlloc::new(&BLOCKS);

#[repr(align(64))]
struct Wide([u8; 64]);

#[test]
fn collections_live_in_blocks() {
    let before = BLOCKS.stats().allocations;

    let mut v: Vec<u64> = Vec::new();
    for i in 0..10_000 {
        v.push(i);
    }
    assert_eq!(v.iter().sum::<u64>(), 10_000 * 9_999 / 2);
    assert!(BLOCKS.stats().allocations > before);
    assert!(BLOCKS.stats().bytes >= v.capacity() * 8);

    // The Vec buffer is a sole-owner block sized to its capacity.
    let block = unsafe { Block::from_raw(v.as_mut_ptr().cast()) }.unwrap();
    unsafe {
        assert_eq!(BLOCKS.refs(block), 1);
        assert!(!BLOCKS.has_destructor(block));
        assert_eq!(BLOCKS.size_of(block), v.capacity() * 8);
    }

    v.truncate(100);
    v.shrink_to_fit();
    let block = unsafe { Block::from_raw(v.as_mut_ptr().cast()) }.unwrap();
    assert_eq!(unsafe { BLOCKS.size_of(block) }, 800);
    assert_eq!(v.iter().sum::<u64>(), 100 * 99 / 2);

    let boxed = Box::new([7u8; 300]);
    let block = unsafe { Block::from_raw(boxed.as_ptr() as *mut u8) }.unwrap();
    assert_eq!(unsafe { BLOCKS.size_of(block) }, 300);

    let text: String = (0..1000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
    assert_eq!(text.len(), 1000);
    assert!(text.starts_with("abc"));

    let zeroed = vec![0u32; 4096];
    assert!(zeroed.iter().all(|&x| x == 0));

    let wide = Box::new(Wide([1; 64]));
    assert_eq!(&*wide as *const Wide as usize % 64, 0);
    assert!(wide.0.iter().all(|&b| b == 1));

    drop((v, boxed, text, zeroed, wide));
    assert_eq!(BLOCKS.stats().failures, 0);
}
