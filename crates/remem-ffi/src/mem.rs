//! Block lifecycle FFI: alloc, zalloc, realloc, ref, deref, nrefs.
//!
//! All functions operate on the process-wide allocator. Pointers passed in
//! must be null or payload pointers previously returned by these functions
//! and still live; anything else is undefined behaviour, exactly as for
//! the Rust API.

use std::ffi::c_void;
use std::ptr;

use remem_core::{global, Block, Destructor};

/// Destructor handler, called with the payload pointer when the last
/// reference to a block is released.
#[allow(non_camel_case_types)]
pub type mem_destroy_h = unsafe extern "C" fn(data: *mut c_void);

fn to_ptr(block: Block) -> *mut c_void {
    block.as_ptr().cast()
}

/// Rebuild a handle from a caller pointer.
#[allow(unsafe_code)]
fn from_ptr(data: *const c_void) -> Option<Block> {
    // SAFETY: non-null pointers are payloads of live blocks per caller contract.
    unsafe { Block::from_raw(data as *mut u8) }
}

/// Allocate `size` uninitialised bytes with reference count 1.
///
/// `dh` may be null. Returns null if memory is exhausted.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn mem_alloc(size: usize, dh: Option<mem_destroy_h>) -> *mut c_void {
    ffi_guard_or!(ptr::null_mut(), {
        match global().alloc(size, dh.map(Destructor::from_extern)) {
            Ok(block) => to_ptr(block),
            Err(_) => ptr::null_mut(),
        }
    })
}

/// Allocate `size` zeroed bytes with reference count 1.
///
/// `dh` may be null. Returns null if memory is exhausted.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn mem_zalloc(size: usize, dh: Option<mem_destroy_h>) -> *mut c_void {
    ffi_guard_or!(ptr::null_mut(), {
        match global().zalloc(size, dh.map(Destructor::from_extern)) {
            Ok(block) => to_ptr(block),
            Err(_) => ptr::null_mut(),
        }
    })
}

/// Resize a block to `size` bytes, possibly moving it.
///
/// The caller must hold the only reference. Contents up to the smaller of
/// the two sizes are kept, the destructor is kept, and bytes added by
/// growth are unspecified (zero if `REMEM_ZERO_ON_GROW` is set). Returns
/// the new pointer, or null on failure, in which case `data` is still valid
/// and unchanged. A null `data` returns null.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn mem_realloc(data: *mut c_void, size: usize) -> *mut c_void {
    ffi_guard_or!(ptr::null_mut(), {
        let Some(block) = from_ptr(data) else {
            return ptr::null_mut();
        };
        // SAFETY: live block with a sole owner per caller contract.
        match unsafe { global().resize(block, size) } {
            Ok(block) => to_ptr(block),
            Err(_) => ptr::null_mut(),
        }
    })
}

/// Take an additional reference. Returns `data`; null-safe.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn mem_ref(data: *mut c_void) -> *mut c_void {
    ffi_guard_or!(ptr::null_mut(), {
        match from_ptr(data) {
            // SAFETY: live block per caller contract.
            Some(block) => to_ptr(unsafe { global().retain(block) }),
            None => ptr::null_mut(),
        }
    })
}

/// Drop a reference, destroying the block if it was the last one.
///
/// Always returns null, so callers can write `p = mem_deref(p);`.
/// Null-safe.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn mem_deref(data: *mut c_void) -> *mut c_void {
    ffi_guard_or!(ptr::null_mut(), {
        if let Some(block) = from_ptr(data) {
            // SAFETY: live block and caller-owned reference per contract.
            unsafe { global().release(block) };
        }
        ptr::null_mut()
    })
}

/// Current reference count, or 0 for null. Saturates at `UINT32_MAX`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn mem_nrefs(data: *const c_void) -> u32 {
    ffi_guard_or!(0, {
        match from_ptr(data) {
            // SAFETY: live block per caller contract.
            Some(block) => u32::try_from(unsafe { global().refs(block) }).unwrap_or(u32::MAX),
            None => 0,
        }
    })
}
