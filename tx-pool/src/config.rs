//! Pool configuration

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Tunables for the staged pool and its recurring manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Interval between manager ticks in milliseconds
    pub tick_interval_ms: u64,

    /// Base pool lifetime of a transaction in seconds, before the
    /// expiry extension point is consulted
    pub expiry_secs: u64,

    /// Newest-first batch size for the queued-admission phase
    pub bundle_limit: usize,

    /// Account-resolution batch size for the pending-promotion phase
    pub release_limit: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 5_000,
            expiry_secs: 10_800,
            bundle_limit: 25,
            release_limit: 25,
        }
    }
}

impl PoolConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("invalid pool config: {}", e)))
    }

    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(v) = std::env::var("POOL_TICK_INTERVAL_MS") {
            config.tick_interval_ms = v
                .parse()
                .map_err(|e| Error::Config(format!("POOL_TICK_INTERVAL_MS: {}", e)))?;
        }
        if let Ok(v) = std::env::var("POOL_EXPIRY_SECS") {
            config.expiry_secs = v
                .parse()
                .map_err(|e| Error::Config(format!("POOL_EXPIRY_SECS: {}", e)))?;
        }
        if let Ok(v) = std::env::var("POOL_BUNDLE_LIMIT") {
            config.bundle_limit = v
                .parse()
                .map_err(|e| Error::Config(format!("POOL_BUNDLE_LIMIT: {}", e)))?;
        }
        if let Ok(v) = std::env::var("POOL_RELEASE_LIMIT") {
            config.release_limit = v
                .parse()
                .map_err(|e| Error::Config(format!("POOL_RELEASE_LIMIT: {}", e)))?;
        }
        Ok(config)
    }
}
