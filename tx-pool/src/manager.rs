//! Pool manager: the recurring tick driving stage transitions
//!
//! Each tick runs four phases in strict order: expire, admit queued,
//! promote pending, apply ready. The expire phase only removes entries and
//! runs lock-free; the other three mutate balances and therefore run as
//! jobs on the shared single-writer sequence, so concurrent ingress can
//! never interleave with them.

use crate::broadcast::Broadcast;
use crate::config::PoolConfig;
use crate::error::Result;
use crate::metrics;
use crate::pool::{PoolPayload, Stage, TransactionPool};
use chrono::Utc;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use tx_core::backend::require_account;
use tx_core::{
    Account, ChainBackend, Hooks, PublicKey, Sequence, Transaction, TransactionId,
    TransactionLogic,
};

/// Drives the staged pool on a fixed interval
///
/// Cheap to clone; all clones share the same pool, collaborators, and
/// balances sequence.
#[derive(Clone)]
pub struct PoolManager {
    pool: Arc<RwLock<TransactionPool>>,
    logic: Arc<TransactionLogic>,
    backend: Arc<dyn ChainBackend>,
    hooks: Arc<dyn Hooks>,
    broadcast: Arc<dyn Broadcast>,
    sequence: Sequence,
    config: PoolConfig,
}

impl PoolManager {
    /// Wire up a manager over a shared pool and its collaborators
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: Arc<RwLock<TransactionPool>>,
        logic: Arc<TransactionLogic>,
        backend: Arc<dyn ChainBackend>,
        hooks: Arc<dyn Hooks>,
        broadcast: Arc<dyn Broadcast>,
        sequence: Sequence,
        config: PoolConfig,
    ) -> Self {
        Self {
            pool,
            logic,
            backend,
            hooks,
            broadcast,
            sequence,
            config,
        }
    }

    /// Shared handle to the underlying pool
    pub fn pool(&self) -> Arc<RwLock<TransactionPool>> {
        Arc::clone(&self.pool)
    }

    /// The verification engine this manager runs against
    pub fn logic(&self) -> Arc<TransactionLogic> {
        Arc::clone(&self.logic)
    }

    /// The shared balances sequence
    pub fn sequence(&self) -> Sequence {
        self.sequence.clone()
    }

    /// Admit externally received transactions into the queued stage
    ///
    /// Runs on the balances sequence so it serializes against tick phases.
    /// Ids already present anywhere in the pool are skipped. Returns how
    /// many were admitted.
    pub async fn enqueue(&self, txs: Vec<Transaction>) -> Result<usize> {
        let this = self.clone();
        let admitted = self
            .sequence
            .run(async move {
                let mut pool = this.pool.write();
                let mut admitted = 0;
                for tx in txs {
                    if pool.what_queue(&tx.id).is_some() {
                        debug!(id = %tx.id, "skipping transaction already in pool");
                        continue;
                    }
                    pool.add(Stage::Queued, tx, PoolPayload::new(false))?;
                    admitted += 1;
                }
                Ok::<usize, crate::error::Error>(admitted)
            })
            .await??;
        Ok(admitted)
    }

    /// Run one full tick: expire, admit, promote, apply
    pub async fn tick(&self) -> Result<()> {
        let _timer = metrics::POOL_TICK_DURATION.start_timer();

        self.expire_transactions().await?;

        let this = self.clone();
        self.sequence
            .run(async move { this.admit_queued().await })
            .await??;

        let this = self.clone();
        self.sequence
            .run(async move { this.promote_pending().await })
            .await??;

        let this = self.clone();
        self.sequence
            .run(async move { this.apply_ready().await })
            .await??;

        self.update_gauges();
        Ok(())
    }

    /// Tick loop; an overrunning tick delays the next, never overlaps it
    pub async fn run(self) {
        info!(
            interval_ms = self.config.tick_interval_ms,
            "starting pool manager"
        );
        let mut interval =
            tokio::time::interval(std::time::Duration::from_millis(self.config.tick_interval_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if let Err(e) = self.tick().await {
                warn!("pool tick failed: {}", e);
            }
        }
    }

    /// Spawn the tick loop onto the runtime
    pub fn spawn(&self) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(this.run())
    }

    /// Phase 1: drop entries whose pool lifetime has elapsed
    async fn expire_transactions(&self) -> Result<()> {
        let now = Utc::now();
        for stage in Stage::PROBE_ORDER {
            let entries = self.pool.read().list(stage, usize::MAX, false);
            for entry in entries {
                let timeout = self
                    .hooks
                    .expiry_timeout(self.config.expiry_secs, &entry.tx)
                    .await
                    .map_err(tx_core::Error::Hook)?;
                let age = now
                    .signed_duration_since(entry.payload.received_at)
                    .num_seconds();
                if age >= 0 && age as u64 > timeout {
                    self.pool.write().remove_from_pool(&entry.tx.id);
                    info!(
                        id = %entry.tx.id,
                        stage = %stage,
                        age_secs = age,
                        "removed expired transaction"
                    );
                    metrics::POOL_EXPIRED_TOTAL.inc();
                }
            }
        }
        Ok(())
    }

    /// Phase 2: examine the newest queued batch
    async fn admit_queued(&self) -> Result<()> {
        let batch = self
            .pool
            .read()
            .list(Stage::Queued, self.config.bundle_limit, true);
        if batch.is_empty() {
            return Ok(());
        }

        let accounts = self.resolve_senders(batch.iter().map(|e| &e.tx)).await?;
        let height = self.backend.height().await?;

        for entry in batch {
            let tx = entry.tx;
            let sender = match accounts.get(&tx.sender_public_key) {
                Some(account) => account,
                None => {
                    self.pool.write().remove(Stage::Queued, &tx.id);
                    warn!(id = %tx.id, "dropped queued transaction with unknown sender");
                    phase_outcome("admit", "unknown_sender");
                    continue;
                }
            };

            if !self.logic.ready(&tx, sender).await? {
                let mut pool = self.pool.write();
                pool.move_tx(&tx.id, Stage::Queued, Stage::Pending)?;
                pool.mark_ready(Stage::Pending, &tx.id, false)?;
                drop(pool);
                debug!(id = %tx.id, "transaction not ready, parked as pending");
                phase_outcome("admit", "pending");
                continue;
            }

            match self.check_transaction(&tx, sender, height).await {
                Ok(()) => {
                    let mut pool = self.pool.write();
                    pool.move_tx(&tx.id, Stage::Queued, Stage::Ready)?;
                    pool.mark_ready(Stage::Ready, &tx.id, true)?;
                    phase_outcome("admit", "ready");
                }
                Err(e) => {
                    self.pool.write().remove(Stage::Queued, &tx.id);
                    debug!(id = %tx.id, error = %e, "rejected queued transaction");
                    phase_outcome("admit", "rejected");
                }
            }
        }
        Ok(())
    }

    /// Phase 3: re-evaluate readiness of every pending entry
    ///
    /// The whole stage is scanned each tick (it is bounded by expiry);
    /// `release_limit` only sizes the account resolution batches.
    async fn promote_pending(&self) -> Result<()> {
        let entries = self.pool.read().list(Stage::Pending, usize::MAX, false);
        if entries.is_empty() {
            return Ok(());
        }

        for batch in entries.chunks(self.config.release_limit.max(1)) {
            let accounts = self.resolve_senders(batch.iter().map(|e| &e.tx)).await?;

            for entry in batch {
                let tx = &entry.tx;
                let sender = match accounts.get(&tx.sender_public_key) {
                    Some(account) => account,
                    None => {
                        self.pool.write().remove(Stage::Pending, &tx.id);
                        warn!(id = %tx.id, "dropped pending transaction with unknown sender");
                        phase_outcome("promote", "unknown_sender");
                        continue;
                    }
                };

                if self.logic.ready(tx, sender).await? {
                    let mut pool = self.pool.write();
                    pool.move_tx(&tx.id, Stage::Pending, Stage::Ready)?;
                    pool.mark_ready(Stage::Ready, &tx.id, true)?;
                    drop(pool);
                    debug!(id = %tx.id, "pending transaction became ready");
                    phase_outcome("promote", "ready");
                }
            }
        }
        Ok(())
    }

    /// Phase 4: apply ready entries against unconfirmed balances
    async fn apply_ready(&self) -> Result<()> {
        let budget = self
            .logic
            .config()
            .max_txs_per_block
            .saturating_sub(self.pool.read().count(Stage::Unconfirmed));
        if budget == 0 {
            return Ok(());
        }

        // Cheapest first: a block slot given to a high-fee transaction it
        // cannot fit wastes the whole slot
        let candidates = self
            .pool
            .read()
            .list_sorted_by(Stage::Ready, budget, |a, b| a.fee.cmp(&b.fee));
        if candidates.is_empty() {
            return Ok(());
        }

        let ids: Vec<TransactionId> = candidates.iter().map(|tx| tx.id.clone()).collect();
        let confirmed = self.backend.filter_confirmed_ids(&ids).await?;
        for id in &confirmed {
            self.pool.write().remove_from_pool(id);
            debug!(%id, "already confirmed on-chain, removed from pool");
            phase_outcome("apply", "already_confirmed");
        }

        let mut accounts = self.resolve_senders(candidates.iter()).await?;
        let height = self.backend.height().await?;

        let mut applied = Vec::new();
        for tx in candidates {
            if confirmed.contains(&tx.id) {
                continue;
            }

            let outcome = match accounts.get_mut(&tx.sender_public_key) {
                Some(sender) => self.apply_one(&tx, sender, height).await,
                None => Err(crate::error::Error::Missing(format!(
                    "unknown sender for {}",
                    tx.id
                ))),
            };

            match outcome {
                Ok(()) => {
                    self.pool
                        .write()
                        .move_tx(&tx.id, Stage::Ready, Stage::Unconfirmed)?;
                    self.hooks.on_unconfirmed_transaction(&tx, true).await;
                    phase_outcome("apply", "unconfirmed");
                    applied.push(tx);
                }
                Err(e) => {
                    // Transient by policy: the next tick re-examines it
                    warn!(id = %tx.id, error = %e, "failed to apply ready transaction, requeueing");
                    let mut pool = self.pool.write();
                    pool.move_tx(&tx.id, Stage::Ready, Stage::Queued)?;
                    pool.mark_ready(Stage::Queued, &tx.id, false)?;
                    phase_outcome("apply", "requeued");
                }
            }
        }

        if !applied.is_empty() {
            info!(count = applied.len(), "transactions entered unconfirmed state");
            self.broadcast.enqueue(applied).await;
        }
        Ok(())
    }

    async fn apply_one(
        &self,
        tx: &Transaction,
        sender: &mut Account,
        height: u64,
    ) -> Result<()> {
        let requester = match &tx.requester_public_key {
            Some(key) => Some(require_account(self.backend.as_ref(), key).await?),
            None => None,
        };
        self.logic
            .verify(tx, sender, requester.as_ref(), height)
            .await?;
        let ops = self.logic.apply_unconfirmed(tx, sender).await?;
        self.backend.persist(ops).await?;
        Ok(())
    }

    async fn check_transaction(
        &self,
        tx: &Transaction,
        sender: &Account,
        height: u64,
    ) -> Result<()> {
        let requester = match &tx.requester_public_key {
            Some(key) => Some(require_account(self.backend.as_ref(), key).await?),
            None => None,
        };
        self.logic
            .verify(tx, sender, requester.as_ref(), height)
            .await?;
        Ok(())
    }

    async fn resolve_senders<'a>(
        &self,
        txs: impl Iterator<Item = &'a Transaction>,
    ) -> Result<std::collections::HashMap<PublicKey, Account>> {
        let mut keys: Vec<PublicKey> = txs.map(|tx| tx.sender_public_key).collect();
        keys.sort_unstable_by_key(|k| *k.as_bytes());
        keys.dedup();
        Ok(self.backend.accounts_by_public_keys(&keys).await?)
    }

    fn update_gauges(&self) {
        let pool = self.pool.read();
        for stage in Stage::PROBE_ORDER {
            metrics::POOL_STAGE_SIZE
                .with_label_values(&[stage.as_str()])
                .set(pool.count(stage) as i64);
        }
    }
}

fn phase_outcome(phase: &str, outcome: &str) {
    metrics::POOL_TRANSACTIONS_TOTAL
        .with_label_values(&[phase, outcome])
        .inc();
}

impl std::fmt::Debug for PoolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
