//! Transport configuration

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Tunables for propagation and peer fetch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Ceiling on how many times a transaction is re-broadcast
    pub max_relays: u32,

    /// Maximum transactions returned to a fetching peer
    pub max_shared_txs: usize,

    /// Chunk size for outgoing publish requests
    pub max_txs_per_request: usize,

    /// Deadline for a single peer call in milliseconds
    pub fetch_timeout_ms: u64,

    /// Max retry attempts for a peer call
    pub max_retry_attempts: u32,

    /// Initial retry delay in milliseconds
    pub initial_retry_delay_ms: u64,

    /// Max retry delay in milliseconds
    pub max_retry_delay_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_relays: 3,
            max_shared_txs: 100,
            max_txs_per_request: 25,
            fetch_timeout_ms: 5_000,
            max_retry_attempts: 3,
            initial_retry_delay_ms: 100,
            max_retry_delay_ms: 2_000,
        }
    }
}

impl TransportConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("invalid transport config: {}", e)))
    }

    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(v) = std::env::var("TRANSPORT_MAX_RELAYS") {
            config.max_relays = v
                .parse()
                .map_err(|e| Error::Config(format!("TRANSPORT_MAX_RELAYS: {}", e)))?;
        }
        if let Ok(v) = std::env::var("TRANSPORT_MAX_SHARED_TXS") {
            config.max_shared_txs = v
                .parse()
                .map_err(|e| Error::Config(format!("TRANSPORT_MAX_SHARED_TXS: {}", e)))?;
        }
        if let Ok(v) = std::env::var("TRANSPORT_FETCH_TIMEOUT_MS") {
            config.fetch_timeout_ms = v
                .parse()
                .map_err(|e| Error::Config(format!("TRANSPORT_FETCH_TIMEOUT_MS: {}", e)))?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TransportConfig::default();
        assert_eq!(config.max_relays, 3);
        assert_eq!(config.max_shared_txs, 100);
        assert_eq!(config.max_txs_per_request, 25);
        assert_eq!(config.max_retry_attempts, 3);
    }
}
