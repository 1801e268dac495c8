//! Module ingress: the boundary where peer data enters the pool
//!
//! Everything arriving here is untrusted. Each raw transaction is
//! normalized (hex decoded, schema checked, id re-derived); one bad
//! transaction rejects the whole batch and penalizes the originating peer.
//! Survivors are deduplicated, capped per message, filtered against
//! confirmed ids, and admitted to the queued stage through the balances
//! sequence.

use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::messages::{Envelope, TransactionsResponse};
use crate::peers::{PeerId, PeerRegistry};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};
use tx_core::{ChainBackend, Transaction, TransactionId};
use tx_pool::{PoolManager, Stage};

/// Inbound request handler
pub struct Ingress {
    manager: PoolManager,
    backend: Arc<dyn ChainBackend>,
    peers: Arc<dyn PeerRegistry>,
    config: TransportConfig,
}

impl Ingress {
    /// Wire up the ingress over the pool manager and collaborators
    pub fn new(
        manager: PoolManager,
        backend: Arc<dyn ChainBackend>,
        peers: Arc<dyn PeerRegistry>,
        config: TransportConfig,
    ) -> Self {
        Self {
            manager,
            backend,
            peers,
            config,
        }
    }

    /// Accept a batch of raw transactions from a peer
    ///
    /// Returns how many entered the queued stage. A single normalization
    /// failure rejects the entire batch; batches larger than
    /// `max_txs_per_request` are truncated after deduplication.
    pub async fn receive_transactions(
        &self,
        raw: Vec<Value>,
        peer: Option<&PeerId>,
    ) -> Result<usize> {
        let logic = self.manager.logic();

        let mut txs: Vec<Transaction> = Vec::with_capacity(raw.len());
        for value in raw {
            match logic.object_normalize(value) {
                Ok(tx) => txs.push(tx),
                Err(e) => {
                    if let Some(peer) = peer {
                        warn!(peer = %peer, error = %e, "penalizing peer for malformed transaction");
                        self.peers.penalize(peer, &e.to_string()).await;
                    }
                    return Err(Error::Rejected(format!(
                        "malformed transaction in batch: {}",
                        e
                    )));
                }
            }
        }

        let mut seen = HashSet::new();
        txs.retain(|tx| seen.insert(tx.id.clone()));

        if txs.len() > self.config.max_txs_per_request {
            debug!(
                dropped = txs.len() - self.config.max_txs_per_request,
                cap = self.config.max_txs_per_request,
                "truncating oversized transaction batch"
            );
            txs.truncate(self.config.max_txs_per_request);
        }

        let ids: Vec<TransactionId> = txs.iter().map(|tx| tx.id.clone()).collect();
        let confirmed = self.backend.filter_confirmed_ids(&ids).await?;
        if !confirmed.is_empty() {
            debug!(count = confirmed.len(), "skipping already confirmed transactions");
            txs.retain(|tx| !confirmed.contains(&tx.id));
        }

        Ok(self.manager.enqueue(txs).await?)
    }

    /// Transactions this node is willing to share with a fetching peer
    ///
    /// Unconfirmed first, then pending, then queued; capped at
    /// `max_shared_txs`.
    pub fn shared_transactions(&self) -> TransactionsResponse {
        let pool = self.manager.pool();
        let pool = pool.read();

        let mut seen = HashSet::new();
        let mut transactions = Vec::new();
        for stage in [Stage::Unconfirmed, Stage::Pending, Stage::Queued] {
            if transactions.len() >= self.config.max_shared_txs {
                break;
            }
            for entry in pool.list(stage, self.config.max_shared_txs, false) {
                if transactions.len() >= self.config.max_shared_txs {
                    break;
                }
                if seen.insert(entry.tx.id.clone()) {
                    transactions.push(entry.tx);
                }
            }
        }
        TransactionsResponse { transactions }
    }

    /// Dispatch one framed peer message
    ///
    /// Publishes produce no reply; fetches produce a framed response.
    pub async fn handle(&self, raw: &[u8], peer: Option<&PeerId>) -> Result<Option<Vec<u8>>> {
        match Envelope::from_bytes(raw)? {
            Envelope::Post(request) => {
                let values = request
                    .transactions
                    .iter()
                    .map(serde_json::to_value)
                    .collect::<std::result::Result<Vec<Value>, _>>()
                    .map_err(|e| Error::Serialize(e.to_string()))?;
                self.receive_transactions(values, peer).await?;
                Ok(None)
            }
            Envelope::Get(_) => {
                let response = Envelope::Transactions(self.shared_transactions());
                Ok(Some(response.to_bytes()?))
            }
            Envelope::Transactions(_) => Err(Error::Peer(
                "unsolicited transaction response".to_string(),
            )),
        }
    }
}

impl std::fmt::Debug for Ingress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingress")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
