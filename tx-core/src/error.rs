//! Error types for the transaction core

use thiserror::Error;

/// Result type for transaction core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Transaction core errors
///
/// Every verification failure carries a human-readable reason suitable for
/// API clients and peer penalization decisions.
#[derive(Error, Debug)]
pub enum Error {
    /// Type tag has no registered handler
    #[error("Unknown transaction type: {0}")]
    UnknownType(u8),

    /// Recomputed id disagrees with the claimed id
    #[error("Invalid transaction id: expected {expected}, got {actual}")]
    InvalidId {
        /// Id recomputed from the signed bytes
        expected: String,
        /// Id claimed by the transaction
        actual: String,
    },

    /// Sender's known public key disagrees with the transaction
    #[error("Invalid sender public key: {0}")]
    InvalidSenderKey(String),

    /// Genesis account used outside the genesis block
    #[error("Genesis account is not allowed to send transactions")]
    GenesisViolation,

    /// Derived sender address disagrees with the claimed senderId
    #[error("Invalid sender address: {0}")]
    InvalidAddress(String),

    /// Primary signature verification failed
    #[error("Failed to verify signature")]
    InvalidSignature,

    /// Second-factor signature verification failed
    #[error("Failed to verify second signature")]
    InvalidSecondSignature,

    /// Claimed fee disagrees with the handler-computed fee
    #[error("Invalid transaction fee: expected {expected}, got {actual}")]
    InvalidFee {
        /// Fee computed by the type handler
        expected: u64,
        /// Fee claimed by the transaction
        actual: u64,
    },

    /// Amount out of bounds or arithmetic overflow
    #[error("Invalid transaction amount: {0}")]
    InvalidAmount(String),

    /// Timestamp ahead of network time
    #[error("Invalid transaction timestamp: {0}")]
    InvalidTimestamp(String),

    /// Sender balance cannot cover amount plus fee
    #[error("Account {address} does not have enough funds: balance {balance}, required {required}")]
    InsufficientBalance {
        /// Sender address
        address: String,
        /// Available balance
        balance: u64,
        /// Required amount plus fee
        required: u64,
    },

    /// Transaction does not satisfy its readiness preconditions
    #[error("Transaction is not ready: {0}")]
    NotReady(String),

    /// Asset payload failed type-specific validation
    #[error("Invalid transaction asset: {0}")]
    InvalidAsset(String),

    /// Structural schema validation failed (aggregated messages)
    #[error("Schema validation failed: {0}")]
    SchemaViolation(String),

    /// Wire bytes could not be decoded
    #[error("Failed to decode transaction bytes: {0}")]
    Decode(String),

    /// Account ledger collaborator failure
    #[error("Account error: {0}")]
    Account(String),

    /// Extension-point failure, propagated unchanged
    #[error("Extension hook error: {0}")]
    Hook(#[from] anyhow::Error),

    /// Sequence or lock failure
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
