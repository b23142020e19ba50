//! The process-wide allocator.
//!
//! Initialised on first use, from [`MemConfig::from_env`] unless
//! [`configure_global`] installed a config first. It lives until process
//! exit; blocks still live at exit are reported by
//! [`Allocator::debug`] but never freed.

use std::sync::OnceLock;

use crate::allocator::Allocator;
use crate::config::MemConfig;
use crate::error::ConfigError;
use crate::heap::SystemHeap;

static GLOBAL: OnceLock<Allocator<SystemHeap>> = OnceLock::new();

/// The process-wide allocator, initialising it if needed.
///
/// An invalid `REMEM_*` environment falls back to the default config with
/// a warning.
pub fn global() -> &'static Allocator<SystemHeap> {
    GLOBAL.get_or_init(|| {
        let config = MemConfig::from_env().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring invalid remem environment config");
            MemConfig::default()
        });
        tracing::debug!(?config, "initialising global allocator");
        Allocator::from_valid(SystemHeap, config)
    })
}

/// Install `config` for the process-wide allocator.
///
/// Must run before the first call to [`global`]; afterwards it returns
/// [`ConfigError::AlreadyInitialized`] and leaves the existing allocator
/// alone.
pub fn configure_global(config: MemConfig) -> Result<&'static Allocator<SystemHeap>, ConfigError> {
    config.validate()?;
    let mut installed = false;
    let allocator = GLOBAL.get_or_init(|| {
        installed = true;
        tracing::debug!(?config, "initialising global allocator");
        Allocator::from_valid(SystemHeap, config)
    });
    if installed {
        Ok(allocator)
    } else {
        Err(ConfigError::AlreadyInitialized)
    }
}
