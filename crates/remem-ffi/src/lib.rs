//! C ABI for the remem block allocator.
//!
//! Exposes the process-wide [`remem_core::global`] allocator through the
//! `mem_*` functions that binding generators consume. `build.rs` emits the
//! matching header to `include/remem.h` with cbindgen.
//!
//! Pointer-returning functions signal failure with null. Status-returning
//! functions return [`MemStatus`](status::MemStatus): `0` on success,
//! negative otherwise. No function lets a Rust panic cross the boundary.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]
#![allow(clippy::not_unsafe_ptr_arg_deref)]

/// Run `$body` (which evaluates to an `i32` status), converting a panic
/// into [`MemStatus::Panicked`](status::MemStatus::Panicked).
macro_rules! ffi_guard {
    ($body:block) => {
        match ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(|| $body)) {
            Ok(status) => status,
            Err(_) => $crate::status::MemStatus::Panicked as i32,
        }
    };
}

/// Run `$body`, returning `$fallback` if it panics.
macro_rules! ffi_guard_or {
    ($fallback:expr, $body:block) => {
        match ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(|| $body)) {
            Ok(value) => value,
            Err(_) => $fallback,
        }
    };
}

pub mod mem;
pub mod stat;
pub mod status;

pub use mem::{mem_alloc, mem_deref, mem_destroy_h, mem_nrefs, mem_realloc, mem_ref, mem_zalloc};
pub use stat::{mem_configure, mem_debug, mem_get_stat, mem_threshold_set, MemStat};
pub use status::MemStatus;
