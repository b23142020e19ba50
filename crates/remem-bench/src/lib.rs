//! Benchmark profiles and utilities for the remem allocator.
//!
//! - [`counting_allocator`] and [`tracking_allocator`]: the two bookkeeping
//!   modes, uncapped
//! - [`size_mix`]: deterministic request sizes drawn from a small/medium/large mix

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use remem_core::{Allocator, MemConfig, Tracking};

/// Allocator that keeps aggregate counters only.
pub fn counting_allocator() -> Allocator {
    Allocator::default()
}

/// Allocator that also records every live block in its registry.
pub fn tracking_allocator() -> Allocator {
    Allocator::new(MemConfig {
        tracking: Tracking::Blocks,
        ..MemConfig::default()
    })
    .unwrap()
}

/// Generate `n` deterministic request sizes.
///
/// Roughly 70% small (≤ 64 B), 25% medium (≤ 4 KiB) and 5% large
/// (≤ 256 KiB), mixed with a simple hash of `seed`.
pub fn size_mix(n: usize, seed: u64) -> Vec<usize> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let r = (state >> 33) as usize;
            match r % 100 {
                0..=69 => 1 + r % 64,
                70..=94 => 65 + r % 4032,
                _ => 4097 + r % (256 << 10),
            }
        })
        .collect()
}
