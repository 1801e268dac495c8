//! Error types for the transaction pool

use thiserror::Error;

/// Pool error type
#[derive(Error, Debug)]
pub enum Error {
    /// Failure raised by the verification/application engine
    #[error("core: {0}")]
    Core(#[from] tx_core::Error),

    /// Transaction id already present in some stage
    #[error("duplicate transaction in pool: {0}")]
    Duplicate(String),

    /// Transaction id not found where expected
    #[error("transaction not in pool: {0}")]
    Missing(String),

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

/// Pool result type
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
