//! Error types for the transport adapter

use thiserror::Error;

/// Transport error type
#[derive(Error, Debug)]
pub enum Error {
    /// Failure raised by the verification/application engine
    #[error("core: {0}")]
    Core(#[from] tx_core::Error),

    /// Failure raised by the pool
    #[error("pool: {0}")]
    Pool(#[from] tx_pool::Error),

    /// Envelope framing failure
    #[error("serialization error: {0}")]
    Serialize(String),

    /// Network failure talking to a peer
    #[error("peer error: {0}")]
    Peer(String),

    /// Peer call exceeded its deadline
    #[error("timed out after {0}ms")]
    Timeout(u64),

    /// Inbound batch rejected at the ingress boundary
    #[error("batch rejected: {0}")]
    Rejected(String),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all
    #[error("{0}")]
    Other(String),
}

/// Transport result type
pub type Result<T> = std::result::Result<T, Error>;

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}
