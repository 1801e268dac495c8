//! Staged transaction pool
//!
//! Four independent keyed stores, each keeping insertion order. The pool
//! holds no transition policy: which stage a transaction belongs in is
//! decided entirely by the manager. The only rule enforced here is that an
//! id lives in at most one stage at a time.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use tx_core::{Transaction, TransactionId};

/// Pool stage a transaction can occupy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Verified and waiting for unconfirmed application
    Ready,
    /// Newly received, not yet examined
    Queued,
    /// Examined but not ready (multisignature wait and the like)
    Pending,
    /// Applied against unconfirmed balances
    Unconfirmed,
}

impl Stage {
    /// Lookup probe order: ready, queued, pending, unconfirmed
    pub const PROBE_ORDER: [Stage; 4] = [
        Stage::Ready,
        Stage::Queued,
        Stage::Pending,
        Stage::Unconfirmed,
    ];

    /// Stage name for logs and metrics labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ready => "ready",
            Stage::Queued => "queued",
            Stage::Pending => "pending",
            Stage::Unconfirmed => "unconfirmed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Bookkeeping carried alongside a pooled transaction
#[derive(Debug, Clone, PartialEq)]
pub struct PoolPayload {
    /// When the transaction entered the pool
    pub received_at: DateTime<Utc>,
    /// Last readiness decision made for it
    pub ready: bool,
}

impl PoolPayload {
    /// Fresh payload stamped with the current time
    pub fn new(ready: bool) -> Self {
        Self {
            received_at: Utc::now(),
            ready,
        }
    }
}

/// A pooled transaction with its payload
#[derive(Debug, Clone)]
pub struct PoolEntry {
    /// The transaction itself
    pub tx: Transaction,
    /// Pool bookkeeping
    pub payload: PoolPayload,
}

/// One keyed, insertion-ordered stage store
#[derive(Debug, Default)]
struct StageStore {
    entries: HashMap<TransactionId, PoolEntry>,
    order: Vec<TransactionId>,
}

impl StageStore {
    fn insert(&mut self, entry: PoolEntry) {
        self.order.push(entry.tx.id.clone());
        self.entries.insert(entry.tx.id.clone(), entry);
    }

    fn remove(&mut self, id: &TransactionId) -> Option<PoolEntry> {
        let entry = self.entries.remove(id)?;
        self.order.retain(|existing| existing != id);
        Some(entry)
    }

    fn get(&self, id: &TransactionId) -> Option<&PoolEntry> {
        self.entries.get(id)
    }

    fn get_mut(&mut self, id: &TransactionId) -> Option<&mut PoolEntry> {
        self.entries.get_mut(id)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// The staged pool
#[derive(Debug, Default)]
pub struct TransactionPool {
    ready: StageStore,
    queued: StageStore,
    pending: StageStore,
    unconfirmed: StageStore,
}

impl TransactionPool {
    /// Empty pool
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self, stage: Stage) -> &StageStore {
        match stage {
            Stage::Ready => &self.ready,
            Stage::Queued => &self.queued,
            Stage::Pending => &self.pending,
            Stage::Unconfirmed => &self.unconfirmed,
        }
    }

    fn store_mut(&mut self, stage: Stage) -> &mut StageStore {
        match stage {
            Stage::Ready => &mut self.ready,
            Stage::Queued => &mut self.queued,
            Stage::Pending => &mut self.pending,
            Stage::Unconfirmed => &mut self.unconfirmed,
        }
    }

    /// Insert a transaction into a stage
    ///
    /// Fails with [`Error::Duplicate`] if the id is already present in any
    /// stage.
    pub fn add(&mut self, stage: Stage, tx: Transaction, payload: PoolPayload) -> Result<()> {
        if self.what_queue(&tx.id).is_some() {
            return Err(Error::Duplicate(tx.id.to_string()));
        }
        self.store_mut(stage).insert(PoolEntry { tx, payload });
        Ok(())
    }

    /// Find the stage currently holding an id
    pub fn what_queue(&self, id: &TransactionId) -> Option<Stage> {
        Stage::PROBE_ORDER
            .into_iter()
            .find(|stage| self.store(*stage).get(id).is_some())
    }

    /// Look up an entry in probe order across all stages
    pub fn get(&self, id: &TransactionId) -> Option<&PoolEntry> {
        let stage = self.what_queue(id)?;
        self.store(stage).get(id)
    }

    /// Whether a stage holds an id
    pub fn has(&self, stage: Stage, id: &TransactionId) -> bool {
        self.store(stage).get(id).is_some()
    }

    /// Remove an entry from one stage
    pub fn remove(&mut self, stage: Stage, id: &TransactionId) -> Option<PoolEntry> {
        self.store_mut(stage).remove(id)
    }

    /// Remove an id from whichever stage holds it; idempotent
    pub fn remove_from_pool(&mut self, id: &TransactionId) -> Option<Stage> {
        let stage = self.what_queue(id)?;
        self.store_mut(stage).remove(id);
        Some(stage)
    }

    /// Atomically move an entry between stages, preserving its payload
    pub fn move_tx(&mut self, id: &TransactionId, from: Stage, to: Stage) -> Result<()> {
        let entry = self
            .store_mut(from)
            .remove(id)
            .ok_or_else(|| Error::Missing(format!("{} not in {}", id, from)))?;
        self.store_mut(to).insert(entry);
        Ok(())
    }

    /// Update the readiness flag on a pooled entry
    pub fn mark_ready(&mut self, stage: Stage, id: &TransactionId, ready: bool) -> Result<()> {
        let entry = self
            .store_mut(stage)
            .get_mut(id)
            .ok_or_else(|| Error::Missing(format!("{} not in {}", id, stage)))?;
        entry.payload.ready = ready;
        Ok(())
    }

    /// Number of entries in one stage
    pub fn count(&self, stage: Stage) -> usize {
        self.store(stage).len()
    }

    /// Number of entries across all stages
    pub fn total_count(&self) -> usize {
        Stage::PROBE_ORDER
            .into_iter()
            .map(|stage| self.count(stage))
            .sum()
    }

    /// Snapshot up to `limit` entries of a stage in insertion order
    ///
    /// `newest_first` reverses the insertion order before the limit applies.
    pub fn list(&self, stage: Stage, limit: usize, newest_first: bool) -> Vec<PoolEntry> {
        let store = self.store(stage);
        let ids: Vec<&TransactionId> = if newest_first {
            store.order.iter().rev().take(limit).collect()
        } else {
            store.order.iter().take(limit).collect()
        };
        ids.into_iter()
            .filter_map(|id| store.get(id).cloned())
            .collect()
    }

    /// Snapshot a stage sorted by a caller comparator, truncated to `limit`
    pub fn list_sorted_by<F>(&self, stage: Stage, limit: usize, mut cmp: F) -> Vec<Transaction>
    where
        F: FnMut(&Transaction, &Transaction) -> std::cmp::Ordering,
    {
        let store = self.store(stage);
        let mut txs: Vec<Transaction> = store
            .order
            .iter()
            .filter_map(|id| store.get(id).map(|entry| entry.tx.clone()))
            .collect();
        txs.sort_by(|a, b| cmp(a, b));
        txs.truncate(limit);
        txs
    }
}
