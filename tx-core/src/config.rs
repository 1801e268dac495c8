//! Chain constants and configuration

use crate::types::PublicKey;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Consensus-critical chain constants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Network epoch; transaction timestamps count seconds from here
    pub epoch: DateTime<Utc>,

    /// Total token supply in atomic units, upper bound for any amount
    pub total_supply: u64,

    /// Maximum transactions per block, bounds the unconfirmed stage
    pub max_txs_per_block: usize,

    /// Public key of the genesis account
    pub genesis_public_key: PublicKey,

    /// Identifier of the genesis block
    pub genesis_block_id: String,

    /// Per-type fee schedule
    pub fees: FeeSchedule,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            epoch: Utc
                .with_ymd_and_hms(2024, 3, 18, 12, 0, 0)
                .single()
                .unwrap_or_default(),
            total_supply: 10_000_000_000_000_000, // 10^16 atomic units
            max_txs_per_block: 25,
            genesis_public_key: PublicKey::from_bytes([0u8; 32]),
            genesis_block_id: "11191352800473813794".to_string(),
            fees: FeeSchedule::default(),
        }
    }
}

impl ChainConfig {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ChainConfig = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = ChainConfig::default();

        if let Ok(supply) = std::env::var("CHAIN_TOTAL_SUPPLY") {
            config.total_supply = supply
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid CHAIN_TOTAL_SUPPLY: {}", e)))?;
        }

        if let Ok(id) = std::env::var("CHAIN_GENESIS_BLOCK_ID") {
            config.genesis_block_id = id;
        }

        if let Ok(key) = std::env::var("CHAIN_GENESIS_PUBLIC_KEY") {
            config.genesis_public_key = PublicKey::from_hex(&key)
                .map_err(|e| crate::Error::Config(format!("Invalid CHAIN_GENESIS_PUBLIC_KEY: {}", e)))?;
        }

        Ok(config)
    }

    /// Seconds elapsed between the network epoch and `at`
    ///
    /// Saturates at zero for instants before the epoch.
    pub fn epoch_seconds(&self, at: DateTime<Utc>) -> u32 {
        let secs = (at - self.epoch).num_seconds();
        secs.clamp(0, u32::MAX as i64) as u32
    }

    /// Current network timestamp
    pub fn now_timestamp(&self) -> u32 {
        self.epoch_seconds(Utc::now())
    }
}

/// Per-type transaction fees in atomic units
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Value transfer
    pub transfer: u64,

    /// Second-signature registration
    pub second_signature: u64,

    /// Delegate registration
    pub delegate: u64,

    /// Vote
    pub vote: u64,

    /// Multisignature registration, charged per key plus one
    pub multisignature: u64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            transfer: 10_000_000,           // 0.1
            second_signature: 500_000_000,  // 5
            delegate: 2_500_000_000,        // 25
            vote: 100_000_000,              // 1
            multisignature: 500_000_000,    // 5 per key
        }
    }
}
