//! External collaborator interface for the account ledger and chain view
//!
//! The core never touches storage. Account resolution, confirmed-id
//! filtering, and persistence-op execution are provided by the surrounding
//! node through this trait.

use crate::dbops::DbOp;
use crate::error::{Error, Result};
use crate::types::{Account, Address, PublicKey, TransactionId};
use async_trait::async_trait;
use std::collections::HashMap;

/// Account ledger and chain-state collaborator
#[async_trait]
pub trait ChainBackend: Send + Sync {
    /// Resolve an account by address
    async fn account(&self, address: &Address) -> Result<Option<Account>>;

    /// Resolve an account by public key
    async fn account_by_public_key(&self, public_key: &PublicKey) -> Result<Option<Account>>;

    /// Bulk account resolution for a batch of sender keys
    ///
    /// Missing accounts are simply absent from the map; callers decide what
    /// a miss means for the transaction in hand.
    async fn accounts_by_public_keys(
        &self,
        keys: &[PublicKey],
    ) -> Result<HashMap<PublicKey, Account>> {
        let mut accounts = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(account) = self.account_by_public_key(key).await? {
                accounts.insert(*key, account);
            }
        }
        Ok(accounts)
    }

    /// Of the given ids, return the subset already confirmed on-chain
    async fn filter_confirmed_ids(&self, ids: &[TransactionId]) -> Result<Vec<TransactionId>>;

    /// Current chain height
    async fn height(&self) -> Result<u64>;

    /// Hand an ordered op list to the persistence executor
    ///
    /// Ops are consumed exactly once; the default drops them, for callers
    /// that only validate.
    async fn persist(&self, ops: Vec<DbOp>) -> Result<()> {
        let _ = ops;
        Ok(())
    }
}

/// Convenience: resolve an account or fail with a descriptive error
pub async fn require_account(
    backend: &dyn ChainBackend,
    public_key: &PublicKey,
) -> Result<Account> {
    backend
        .account_by_public_key(public_key)
        .await?
        .ok_or_else(|| Error::Account(format!("unknown account for key {}", public_key)))
}
