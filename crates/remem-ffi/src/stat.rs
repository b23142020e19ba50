//! Introspection and configuration FFI.

use std::io::Write;

use remem_core::{configure_global, global, MemConfig, MemStats, Tracking};

use crate::status::MemStatus;

/// C-compatible allocator statistics.
///
/// Fixed-width `u64` fields for ABI portability (not `size_t`).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemStat {
    /// Live blocks.
    pub blocks: u64,
    /// Live payload bytes.
    pub bytes: u64,
    /// Highest live payload bytes seen.
    pub peak_bytes: u64,
    /// Successful allocations since start.
    pub allocations: u64,
    /// Failed allocations and resizes since start.
    pub failures: u64,
}

// 5×u64 = 40 bytes, align 8.
const _: () = assert!(std::mem::size_of::<MemStat>() == 40);
const _: () = assert!(std::mem::align_of::<MemStat>() == 8);

impl From<&MemStats> for MemStat {
    fn from(s: &MemStats) -> Self {
        Self {
            blocks: s.blocks as u64,
            bytes: s.bytes as u64,
            peak_bytes: s.peak_bytes as u64,
            allocations: s.allocations,
            failures: s.failures,
        }
    }
}

/// Print live-memory statistics, and every live block when block tracking
/// is enabled, to stderr.
///
/// The same report is also emitted as `tracing` events on target
/// `remem::debug`, for embedders that install a subscriber.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn mem_debug() {
    ffi_guard_or!((), {
        global().debug();
        let mut err = std::io::stderr().lock();
        // Diagnostics only: a closed stderr is not worth reporting.
        let _ = global().write_report(&mut err);
        let _ = err.flush();
    })
}

/// Copy the current statistics into `stat_out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn mem_get_stat(stat_out: *mut MemStat) -> i32 {
    ffi_guard!({
        if stat_out.is_null() {
            return MemStatus::InvalidArgument as i32;
        }
        let stat = MemStat::from(&global().stats());
        // SAFETY: stat_out is non-null and valid per caller contract.
        unsafe { *stat_out = stat };
        MemStatus::Ok as i32
    })
}

/// Cap live payload bytes at `threshold`; a negative value removes the cap.
///
/// Returns `MEM_STATUS_CONFIG_ERROR` for 0 and keeps the current cap.
/// Lowering the cap frees nothing, it only makes later allocations fail.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn mem_threshold_set(threshold: isize) -> i32 {
    ffi_guard!({
        match global().set_threshold(usize::try_from(threshold).ok()) {
            Ok(()) => MemStatus::Ok as i32,
            Err(e) => MemStatus::from(&e) as i32,
        }
    })
}

/// Configure the process-wide allocator before its first use.
///
/// `threshold` < 0 means no cap; 0 is rejected. Returns
/// `AlreadyInitialized` if any `mem_*` allocation function already ran.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn mem_configure(track_blocks: bool, zero_on_grow: bool, threshold: isize) -> i32 {
    ffi_guard!({
        let config = MemConfig {
            tracking: if track_blocks {
                Tracking::Blocks
            } else {
                Tracking::Counters
            },
            threshold: usize::try_from(threshold).ok(),
            zero_on_grow,
        };
        match configure_global(config) {
            Ok(_) => MemStatus::Ok as i32,
            Err(e) => MemStatus::from(&e) as i32,
        }
    })
}
