//! Network-facing request and response types
//!
//! Messages travel bincode-framed inside an [`Envelope`]. Optional
//! transaction sections (requester key, second signature) are carried by
//! bincode's option tags, so no out-of-band flags are needed on this path.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tx_core::{Transaction, TransactionId};

/// Publish request: push transactions to a peer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostTransactions {
    /// Carried transactions, unique by id
    pub transactions: Vec<Transaction>,
}

impl PostTransactions {
    /// Build a request, deduplicating by id and capping the batch size
    pub fn new(txs: Vec<Transaction>, cap: usize) -> Self {
        let mut seen = HashSet::new();
        let mut transactions: Vec<Transaction> =
            txs.into_iter().filter(|tx| seen.insert(tx.id.clone())).collect();
        transactions.truncate(cap);
        Self { transactions }
    }

    /// Ids carried by this request
    pub fn ids(&self) -> Vec<TransactionId> {
        self.transactions.iter().map(|tx| tx.id.clone()).collect()
    }

    /// Merge pending requests and re-chunk into batches of at most
    /// `chunk_size`, keeping each id once
    pub fn merge(requests: Vec<Self>, chunk_size: usize) -> Vec<Self> {
        let mut seen = HashSet::new();
        let merged: Vec<Transaction> = requests
            .into_iter()
            .flat_map(|request| request.transactions)
            .filter(|tx| seen.insert(tx.id.clone()))
            .collect();

        merged
            .chunks(chunk_size.max(1))
            .map(|chunk| Self {
                transactions: chunk.to_vec(),
            })
            .collect()
    }

    /// A request is spent once every carried id is confirmed on-chain
    pub fn is_expired(&self, confirmed: &[TransactionId]) -> bool {
        self.transactions
            .iter()
            .all(|tx| confirmed.contains(&tx.id))
    }
}

/// Fetch request: ask a peer for its mergeable transactions; no body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetTransactions;

/// Response to [`GetTransactions`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionsResponse {
    /// Mergeable transactions, capped by the responder
    pub transactions: Vec<Transaction>,
}

/// Framed transport message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Envelope {
    /// Push transactions
    Post(PostTransactions),
    /// Request mergeable transactions
    Get(GetTransactions),
    /// Answer to a fetch
    Transactions(TransactionsResponse),
}

impl Envelope {
    /// Frame for the wire
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialize(e.to_string()))
    }

    /// Decode a framed message
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        bincode::deserialize(raw).map_err(|e| Error::Serialize(e.to_string()))
    }
}
