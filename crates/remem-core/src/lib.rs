//! Reference-counted block allocation for native libraries and their bindings.
//!
//! Every allocation is a [`Block`]: a payload address with a hidden header
//! at a fixed offset in front of it. The header carries the payload size,
//! an atomic reference count and an optional [`Destructor`]. Counting is
//! manual: callers [`retain`](Allocator::retain) and
//! [`release`](Allocator::release) explicitly, and the release that drives
//! the count to zero runs the destructor and frees the storage.
//!
//! # Architecture
//!
//! ```text
//! Allocator<H: RawHeap>
//! ├── H (SystemHeap by default; the seam for fault injection)
//! ├── Counters (lock-free live/peak/failure accounting + byte threshold)
//! └── Registry (optional, Mutex<IndexMap>) for per-block introspection
//!
//! heap block:  [ Header | payload ........ ]
//!                        ^ Block points here
//! ```
//!
//! [`RcAlloc`] adapts an allocator to [`GlobalAlloc`](std::alloc::GlobalAlloc)
//! so Rust collections can share its accounting.
//!
//! # Safety model
//!
//! `Block` is a `Copy` token, not an owner. Any operation that dereferences
//! a block is an `unsafe fn` whose contract is: the block is live and was
//! returned by the same allocator. Releasing more often than acquiring,
//! resizing while other references exist, and touching a payload after its
//! destructor ran are caller bugs with undefined behaviour. Reference cycles
//! are never collected.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod allocator;
pub mod block;
pub mod config;
pub mod destructor;
pub mod error;
pub mod global;
pub mod global_alloc;
mod header;
pub mod heap;
pub mod stats;

pub use allocator::Allocator;
pub use block::Block;
pub use config::{MemConfig, Tracking};
pub use destructor::{DestroyFn, Destructor};
pub use error::{ConfigError, MemError};
pub use global::{configure_global, global};
pub use global_alloc::RcAlloc;
pub use header::{BLOCK_ALIGN, HEADER_SIZE};
pub use heap::{RawHeap, SystemHeap};
pub use stats::{BlockInfo, MemStats};
