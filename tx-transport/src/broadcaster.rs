//! Outgoing broadcast queue with relay accounting
//!
//! Newly unconfirmed transactions enter here from the pool manager. Relay
//! counts are incremented at enqueue and capped at `max_relays`; pending
//! requests merge and re-chunk so a flush never sends oversized or
//! duplicate-carrying batches.

use crate::client::{post_with_retry, PeerClient};
use crate::config::TransportConfig;
use crate::error::Result;
use crate::messages::{Envelope, PostTransactions};
use crate::peers::PeerId;
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};
use tx_core::{ChainBackend, Transaction, TransactionId};

/// Queue of outgoing publish requests
pub struct Broadcaster {
    queue: Mutex<Vec<PostTransactions>>,
    config: TransportConfig,
}

impl Broadcaster {
    /// Empty queue
    pub fn new(config: TransportConfig) -> Self {
        Self {
            queue: Mutex::new(Vec::new()),
            config,
        }
    }

    /// Add transactions to the outgoing queue
    ///
    /// Increments each relay count and drops transactions past the relay
    /// ceiling. Returns how many were queued.
    pub fn enqueue_transactions(&self, txs: Vec<Transaction>) -> usize {
        let eligible: Vec<Transaction> = txs
            .into_iter()
            .filter_map(|mut tx| {
                tx.relays += 1;
                if tx.relays > self.config.max_relays {
                    debug!(
                        id = %tx.id,
                        relays = tx.relays,
                        "relay ceiling reached, not re-broadcasting"
                    );
                    None
                } else {
                    Some(tx)
                }
            })
            .collect();
        if eligible.is_empty() {
            return 0;
        }
        let queued = eligible.len();

        let mut queue = self.queue.lock();
        let mut pending: Vec<PostTransactions> = queue.drain(..).collect();
        pending.push(PostTransactions::new(eligible, usize::MAX));
        *queue = PostTransactions::merge(pending, self.config.max_txs_per_request);
        queued
    }

    /// Drop requests whose every id is already confirmed on-chain
    pub async fn drop_expired(&self, backend: &dyn ChainBackend) -> Result<usize> {
        let ids: Vec<TransactionId> = {
            let queue = self.queue.lock();
            queue.iter().flat_map(|request| request.ids()).collect()
        };
        if ids.is_empty() {
            return Ok(0);
        }

        let confirmed = backend.filter_confirmed_ids(&ids).await?;
        let mut queue = self.queue.lock();
        let before = queue.len();
        queue.retain(|request| !request.is_expired(&confirmed));
        Ok(before - queue.len())
    }

    /// Take every pending request off the queue
    pub fn drain(&self) -> Vec<PostTransactions> {
        self.queue.lock().drain(..).collect()
    }

    /// Number of pending requests
    pub fn queued_requests(&self) -> usize {
        self.queue.lock().len()
    }

    /// Send every pending request to every given peer
    ///
    /// Spent requests are dropped first. A peer that keeps failing is
    /// abandoned for this flush; the request is not re-queued for it.
    pub async fn flush(
        &self,
        client: &dyn PeerClient,
        peers: &[PeerId],
        backend: &dyn ChainBackend,
    ) -> Result<usize> {
        self.drop_expired(backend).await?;
        let requests = self.drain();
        if requests.is_empty() || peers.is_empty() {
            return Ok(0);
        }

        let mut delivered = 0;
        for request in requests {
            let payload = Envelope::Post(request).to_bytes()?;
            for peer in peers {
                match post_with_retry(client, peer, payload.clone(), &self.config).await {
                    Ok(()) => delivered += 1,
                    Err(e) => {
                        warn!(peer = %peer, error = %e, "abandoning publish to peer for this flush");
                    }
                }
            }
        }
        Ok(delivered)
    }
}

#[async_trait]
impl tx_pool::Broadcast for Broadcaster {
    async fn enqueue(&self, txs: Vec<Transaction>) {
        let queued = self.enqueue_transactions(txs);
        if queued > 0 {
            debug!(count = queued, "queued transactions for propagation");
        }
    }
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("queued_requests", &self.queued_requests())
            .finish_non_exhaustive()
    }
}
