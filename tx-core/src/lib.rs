//! Meridian Transaction Core
//!
//! Type registry, wire codec, and verification/application engine for
//! Meridian transactions.
//!
//! # Architecture
//!
//! - **Type Registry**: Per-kind behavior behind one handler trait
//! - **Deterministic Encoding**: Ids and signatures derive from one byte layout
//! - **Single Writer**: Balance-affecting work funnels through one sequence
//! - **Persistence Ops**: State effects are described, never executed here
//!
//! # Invariants
//!
//! - Id integrity: a transaction's id always matches its signed bytes
//! - Apply/undo symmetry: undo(apply(tx)) restores the prior account state
//! - No trusted wire fields: sender id and tx id are always re-derived

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod backend;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod dbops;
pub mod error;
pub mod handlers;
pub mod hooks;
pub mod logic;
pub mod registry;
pub mod sequence;
pub mod types;

// Re-exports
pub use backend::ChainBackend;
pub use config::{ChainConfig, FeeSchedule};
pub use dbops::DbOp;
pub use error::{Error, Result};
pub use hooks::{Hooks, NoopHooks};
pub use logic::TransactionLogic;
pub use registry::{Registry, TransactionHandler};
pub use sequence::Sequence;
pub use types::{
    Account, Address, Asset, BlockRef, PublicKey, Signature, Transaction, TransactionId,
    TransactionType,
};
