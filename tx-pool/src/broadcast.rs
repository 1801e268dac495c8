//! Outgoing-propagation collaborator
//!
//! The pool manager hands newly unconfirmed transactions to whatever
//! broadcast queue the node wires in. Relay accounting lives on the
//! consuming side, not here.

use async_trait::async_trait;
use tx_core::Transaction;

/// Consumer of transactions that should propagate to peers
#[async_trait]
pub trait Broadcast: Send + Sync {
    /// Queue transactions for outgoing propagation
    async fn enqueue(&self, txs: Vec<Transaction>);
}

/// Discards everything, for nodes that do not propagate
#[derive(Debug, Default)]
pub struct NoopBroadcast;

#[async_trait]
impl Broadcast for NoopBroadcast {
    async fn enqueue(&self, _txs: Vec<Transaction>) {}
}
