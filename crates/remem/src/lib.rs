//! remem: reference-counted memory blocks with destructor hooks.
//!
//! This is the top-level facade crate that re-exports the Rust API from
//! `remem-core` and the C ABI from `remem-ffi`.
//!
//! # Quick start
//!
//! ```rust
//! use remem::prelude::*;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let alloc = Allocator::new(MemConfig {
//!     tracking: Tracking::Blocks,
//!     ..MemConfig::default()
//! })
//! .unwrap();
//!
//! let freed = Arc::new(AtomicUsize::new(0));
//! let hook = {
//!     let freed = Arc::clone(&freed);
//!     Destructor::new(move |_payload| {
//!         freed.fetch_add(1, Ordering::SeqCst);
//!     })
//! };
//!
//! let block = alloc.zalloc(64, Some(hook)).unwrap();
//! assert_eq!(alloc.stats().blocks, 1);
//!
//! // SAFETY: `block` is live and came from `alloc`.
//! unsafe {
//!     let shared = alloc.retain(block);
//!     assert_eq!(alloc.refs(block), 2);
//!     assert!(!alloc.release(shared));
//!     assert!(alloc.release(block));
//! }
//! assert_eq!(freed.load(Ordering::SeqCst), 1);
//! assert_eq!(alloc.stats().bytes, 0);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`mem`] | `remem-core` | `Allocator`, `Block`, `RcAlloc`, heaps, config, statistics |
//! | [`ffi`] | `remem-ffi` | `mem_*` C functions, `MemStatus`, `MemStat` |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Allocator, blocks, heaps, and statistics (`remem-core`).
///
/// Most users only need [`mem::Allocator`] and [`mem::Block`], also
/// available in the [`prelude`].
pub use remem_core as mem;

/// C ABI (`remem-ffi`).
///
/// The functions here operate on the process-wide
/// [`mem::global`] allocator.
pub use remem_ffi as ffi;

/// Common imports for typical remem usage.
///
/// ```rust
/// use remem::prelude::*;
/// ```
pub mod prelude {
    // Allocator and handles
    pub use remem_core::{Allocator, Block, Destructor};

    // Configuration
    pub use remem_core::{configure_global, global, MemConfig, Tracking};

    // Heaps and the Rust allocator adapter
    pub use remem_core::{RawHeap, RcAlloc, SystemHeap};

    // Errors
    pub use remem_core::{ConfigError, MemError};

    // Statistics
    pub use remem_core::{BlockInfo, MemStats};
}
