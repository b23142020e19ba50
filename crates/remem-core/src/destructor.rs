//! Destructor hooks attached to blocks.
//!
//! A [`Destructor`] is stored in the block header and consumed exactly once,
//! by the release that drives the reference count to zero, immediately
//! before the storage is freed.

#![allow(unsafe_code)]

use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;

/// C-ABI destructor callback: `void (mem_destroy_h)(void *data)`.
pub type DestroyFn = unsafe extern "C" fn(data: *mut c_void);

/// Cleanup hook invoked with the payload address when a block dies.
///
/// Either a plain C function pointer (no extra allocation) or a boxed
/// Rust closure. Dropping a `Destructor` without invoking it (e.g. when the
/// allocation it was meant for fails) does nothing beyond freeing the box.
pub struct Destructor(Hook);

enum Hook {
    Extern(DestroyFn),
    Closure(Box<dyn FnOnce(NonNull<u8>) + Send>),
}

impl Destructor {
    /// Wrap a Rust closure.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(NonNull<u8>) + Send + 'static,
    {
        Self(Hook::Closure(Box::new(f)))
    }

    /// Wrap a C callback.
    pub fn from_extern(f: DestroyFn) -> Self {
        Self(Hook::Extern(f))
    }

    /// Whether this hook is a C callback.
    pub fn is_extern(&self) -> bool {
        matches!(self.0, Hook::Extern(_))
    }

    /// Run the hook.
    ///
    /// # Safety
    ///
    /// `payload` must be the payload of the block this destructor belongs
    /// to, still allocated, and not reachable through any live reference.
    pub(crate) unsafe fn destroy(self, payload: NonNull<u8>) {
        match self.0 {
            // SAFETY: the C callback receives the same address it was
            // registered for; its own contract is the caller's concern.
            Hook::Extern(f) => unsafe { f(payload.as_ptr().cast()) },
            Hook::Closure(f) => f(payload),
        }
    }
}

impl fmt::Debug for Destructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Hook::Extern(func) => write!(f, "Destructor::Extern({:p})", *func as *const ()),
            Hook::Closure(_) => f.write_str("Destructor::Closure"),
        }
    }
}
