//! Meridian Transaction Pool
//!
//! Staged pool (queued, pending, ready, unconfirmed) and the recurring
//! manager that moves transactions between stages.
//!
//! # Architecture
//!
//! - **Policy-free pool**: stage stores enforce only the one-stage-per-id rule
//! - **Four-phase tick**: expire, admit queued, promote pending, apply ready
//! - **Serialized mutation**: balance-affecting phases share one sequence
//!
//! # Invariants
//!
//! - A transaction id occupies at most one stage at any time
//! - Ticks never overlap; an overrunning tick delays the next
//! - Consensus failures remove a transaction; only the apply step requeues

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod broadcast;
pub mod config;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod pool;

// Re-exports
pub use broadcast::{Broadcast, NoopBroadcast};
pub use config::PoolConfig;
pub use error::{Error, Result};
pub use manager::PoolManager;
pub use pool::{PoolEntry, PoolPayload, Stage, TransactionPool};
