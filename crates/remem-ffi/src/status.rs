//! C-compatible status codes.
//!
//! [`MemStatus`] is a `repr(i32)` enum. Conversions from the Rust error
//! types (`MemError`, `ConfigError`) are provided.

use remem_core::{ConfigError, MemError};

/// C-compatible status code returned by status-returning FFI functions.
///
/// `Ok` = 0, all errors are negative. Values are ABI-stable.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemStatus {
    /// Success.
    Ok = 0,
    /// An argument is null, out of range, or otherwise invalid.
    InvalidArgument = -1,
    /// The heap or the live-byte threshold refused the request.
    OutOfMemory = -2,
    /// Configuration was invalid.
    ConfigError = -3,
    /// The global allocator was already initialised.
    AlreadyInitialized = -4,
    /// A Rust panic was caught at the FFI boundary.
    Panicked = -128,
}

impl From<&MemError> for MemStatus {
    fn from(e: &MemError) -> Self {
        match e {
            MemError::OutOfMemory { .. } => MemStatus::OutOfMemory,
        }
    }
}

impl From<&ConfigError> for MemStatus {
    fn from(e: &ConfigError) -> Self {
        match e {
            ConfigError::InvalidThreshold | ConfigError::InvalidEnv { .. } => {
                MemStatus::ConfigError
            }
            ConfigError::AlreadyInitialized => MemStatus::AlreadyInitialized,
        }
    }
}
