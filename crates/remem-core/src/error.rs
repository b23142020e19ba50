//! Error types for block allocation and allocator configuration.

use std::error::Error;
use std::fmt;

/// Errors returned by the allocating operations.
///
/// Misuse (double release, resizing an aliased block, foreign pointers) is
/// not represented here: it is a caller-contract violation the allocator
/// cannot detect without bookkeeping it does not keep.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MemError {
    /// The request could not be satisfied: the heap returned null, the
    /// size overflowed the layout limits, or the live-byte threshold would
    /// have been exceeded.
    OutOfMemory {
        /// Payload bytes requested.
        requested: usize,
    },
}

impl fmt::Display for MemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory { requested } => {
                write!(f, "out of memory: requested {requested} bytes")
            }
        }
    }
}

impl Error for MemError {}

/// Errors from validating or installing a [`MemConfig`](crate::MemConfig).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A threshold of zero bytes would reject every allocation.
    InvalidThreshold,
    /// An environment variable held a value that could not be parsed.
    InvalidEnv {
        /// Name of the offending variable.
        var: &'static str,
        /// The raw value found.
        value: String,
    },
    /// The global allocator was already initialised when
    /// [`configure_global`](crate::configure_global) ran.
    AlreadyInitialized,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidThreshold => write!(f, "threshold must be greater than zero"),
            Self::InvalidEnv { var, value } => {
                write!(f, "invalid value for {var}: '{value}'")
            }
            Self::AlreadyInitialized => {
                write!(f, "global allocator already initialised")
            }
        }
    }
}

impl Error for ConfigError {}
