//! Extension points consumed by the core
//!
//! The node's filter/action dispatcher is injected as a trait object. Every
//! method has a transparent identity or no-op default, so an unregistered
//! hook changes nothing; errors raised by a registered hook propagate
//! unchanged (the core never swallows them).

use crate::dbops::DbOp;
use crate::types::{Account, Transaction};
use async_trait::async_trait;

/// Named hook points the core calls at defined spots
#[async_trait]
pub trait Hooks: Send + Sync {
    /// Static checks before the structural verification sequence
    async fn pre_verify(&self, _tx: &Transaction) -> anyhow::Result<()> {
        Ok(())
    }

    /// Checks after verification has otherwise passed
    async fn post_verify(&self, _tx: &Transaction) -> anyhow::Result<()> {
        Ok(())
    }

    /// Filter: adjust the readiness decision for a transaction
    async fn transaction_ready(
        &self,
        ready: bool,
        _tx: &Transaction,
        _sender: &Account,
    ) -> anyhow::Result<bool> {
        Ok(ready)
    }

    /// Filter: adjust the persistence ops produced by apply paths
    async fn apply_ops(&self, ops: Vec<DbOp>, _tx: &Transaction) -> anyhow::Result<Vec<DbOp>> {
        Ok(ops)
    }

    /// Filter: adjust the persistence ops produced by undo paths
    async fn undo_ops(&self, ops: Vec<DbOp>, _tx: &Transaction) -> anyhow::Result<Vec<DbOp>> {
        Ok(ops)
    }

    /// Filter: adjust the pool expiry timeout for a transaction
    async fn expiry_timeout(&self, timeout_secs: u64, _tx: &Transaction) -> anyhow::Result<u64> {
        Ok(timeout_secs)
    }

    /// Action: a transaction entered the unconfirmed stage
    async fn on_unconfirmed_transaction(&self, _tx: &Transaction, _broadcast: bool) {}
}

/// Identity/no-op hook set used when nothing is registered
#[derive(Debug, Default)]
pub struct NoopHooks;

#[async_trait]
impl Hooks for NoopHooks {}
