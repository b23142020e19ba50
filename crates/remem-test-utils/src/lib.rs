//! Test utilities for remem development.
//!
//! - [`DestructorProbe`]: hands out destructors that record every call.
//! - [`FailingHeap`]: a [`RawHeap`] that fails on demand and counts
//!   outstanding allocations, for out-of-memory and leak tests.
//! - [`fill_pattern`] / [`pattern`]: deterministic payload contents.

#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::{fill_pattern, pattern, DestructorProbe, FailingHeap};

pub use remem_core::RawHeap;
