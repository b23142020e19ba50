//! Allocator configuration parameters.

use std::str::FromStr;

use crate::error::ConfigError;

/// How much bookkeeping the allocator keeps for introspection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Tracking {
    /// Lock-free counters only (live blocks, live bytes, peak, failures).
    /// Introspection cannot list individual blocks.
    #[default]
    Counters,
    /// Counters plus a registry of every live block, guarded by a single
    /// allocator-wide mutex taken on allocate, resize and destroy.
    Blocks,
}

impl FromStr for Tracking {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "counters" => Ok(Self::Counters),
            "blocks" => Ok(Self::Blocks),
            _ => Err(()),
        }
    }
}

/// Configuration for an [`Allocator`](crate::Allocator).
///
/// Validated at construction. The threshold can later be changed at runtime
/// with [`Allocator::set_threshold`](crate::Allocator::set_threshold); the
/// other fields are fixed for the allocator's lifetime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemConfig {
    /// Introspection bookkeeping level.
    ///
    /// Default: [`Tracking::Counters`].
    pub tracking: Tracking,

    /// Upper bound on live payload bytes, or `None` for no bound.
    ///
    /// An allocate or resize that would push live bytes past the bound
    /// fails with `OutOfMemory`. `Some(0)` is rejected.
    pub threshold: Option<usize>,

    /// Whether bytes added by a growing resize are zeroed.
    ///
    /// Default: `false`, leaving them unspecified.
    pub zero_on_grow: bool,
}

impl MemConfig {
    /// Default tracking level.
    pub const DEFAULT_TRACKING: Tracking = Tracking::Counters;

    /// Default growth behaviour for resize.
    pub const DEFAULT_ZERO_ON_GROW: bool = false;

    /// Environment variable selecting [`Tracking`] (`counters` or `blocks`).
    pub const ENV_TRACKING: &'static str = "REMEM_TRACKING";

    /// Environment variable holding the live-byte threshold.
    pub const ENV_THRESHOLD: &'static str = "REMEM_THRESHOLD";

    /// Environment variable toggling zero-on-grow (`0`, `1`, `true`, `false`).
    pub const ENV_ZERO_ON_GROW: &'static str = "REMEM_ZERO_ON_GROW";

    /// Create a config with default values.
    pub fn new() -> Self {
        Self {
            tracking: Self::DEFAULT_TRACKING,
            threshold: None,
            zero_on_grow: Self::DEFAULT_ZERO_ON_GROW,
        }
    }

    /// Check the config for values the allocator cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threshold == Some(0) {
            return Err(ConfigError::InvalidThreshold);
        }
        Ok(())
    }

    /// Build a config from `REMEM_*` environment variables.
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    ///
    /// Same rules as [`from_env`](Self::from_env), without touching the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::new();

        if let Some(value) = lookup(Self::ENV_TRACKING) {
            config.tracking = value.parse().map_err(|()| ConfigError::InvalidEnv {
                var: Self::ENV_TRACKING,
                value: value.clone(),
            })?;
        }

        if let Some(value) = lookup(Self::ENV_THRESHOLD) {
            let bytes = value
                .trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidEnv {
                    var: Self::ENV_THRESHOLD,
                    value: value.clone(),
                })?;
            config.threshold = Some(bytes);
        }

        if let Some(value) = lookup(Self::ENV_ZERO_ON_GROW) {
            config.zero_on_grow = parse_flag(&value).ok_or_else(|| ConfigError::InvalidEnv {
                var: Self::ENV_ZERO_ON_GROW,
                value: value.clone(),
            })?;
        }

        config.validate()?;
        Ok(config)
    }
}

impl Default for MemConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
