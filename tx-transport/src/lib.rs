//! Meridian Transaction Transport
//!
//! Network-facing adapter for transaction propagation: framed publish and
//! fetch messages, the inbound ingress boundary, and the outgoing broadcast
//! queue with relay accounting.
//!
//! # Invariants
//!
//! - Inbound data is untrusted: ids and addresses are always re-derived
//! - One malformed transaction rejects its whole batch
//! - A transaction is re-broadcast at most `max_relays` times

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod broadcaster;
pub mod client;
pub mod config;
pub mod error;
pub mod ingress;
pub mod messages;
pub mod peers;

// Re-exports
pub use broadcaster::Broadcaster;
pub use client::{fetch_transactions, post_with_retry, PeerClient};
pub use config::TransportConfig;
pub use error::{Error, Result};
pub use ingress::Ingress;
pub use messages::{Envelope, GetTransactions, PostTransactions, TransactionsResponse};
pub use peers::{NoopPeerRegistry, PeerId, PeerRegistry};
