//! Transaction type registry
//!
//! One handler per transaction kind, registered once at process start and
//! never removed. The handlers form a closed union reached through the type
//! tag; everything above the registry dispatches through the
//! [`TransactionHandler`] capability set instead of matching on kinds.

use crate::config::ChainConfig;
use crate::dbops::DbOp;
use crate::error::{Error, Result};
use crate::handlers;
use crate::types::{Account, Asset, BlockRef, Transaction, TransactionType};
use serde_json::Value;
use std::collections::HashMap;

/// Capability set implemented by every transaction kind
pub trait TransactionHandler: Send + Sync {
    /// The type tag this handler owns
    fn transaction_type(&self) -> TransactionType;

    /// Fee for this transaction at the given chain height
    fn calculate_fee(&self, tx: &Transaction, sender: &Account, height: u64) -> u64;

    /// Type-specific consensus validation, run after the structural checks
    fn verify(&self, tx: &Transaction, sender: &Account) -> Result<()>;

    /// Asset section of the wire encoding
    fn asset_bytes(&self, tx: &Transaction) -> Result<Vec<u8>>;

    /// Inverse of [`Self::asset_bytes`]
    fn asset_from_bytes(&self, raw: &[u8]) -> Result<Asset>;

    /// Confirmed asset effects as persistence ops
    fn apply(&self, tx: &Transaction, block: &BlockRef, sender: &Account) -> Result<Vec<DbOp>>;

    /// Exact reversal of [`Self::apply`]
    fn undo(&self, tx: &Transaction, block: &BlockRef, sender: &Account) -> Result<Vec<DbOp>>;

    /// Unconfirmed asset effects; may mutate the sender's `u_*` fields
    fn apply_unconfirmed(&self, tx: &Transaction, sender: &mut Account) -> Result<Vec<DbOp>>;

    /// Exact reversal of [`Self::apply_unconfirmed`]
    fn undo_unconfirmed(&self, tx: &Transaction, sender: &mut Account) -> Result<Vec<DbOp>>;

    /// Build the typed asset from a raw JSON asset object
    fn normalize_asset(&self, asset: &Value) -> Result<Asset>;

    /// Batched asset persistence ops; invoked once per type per batch
    fn db_save(&self, txs: &[&Transaction]) -> Result<Vec<DbOp>>;

    /// Rehydrate the asset from a stored row, if this type stores one
    fn db_read(&self, row: &Value) -> Result<Option<Asset>>;

    /// Post-persistence side effects
    fn after_save(&self, tx: &Transaction) -> Result<()> {
        let _ = tx;
        Ok(())
    }

    /// Whether the transaction satisfies its preconditions for admission
    ///
    /// Defaults to true; readiness policy beyond this lives in the
    /// readiness extension point.
    fn ready(&self, tx: &Transaction, sender: &Account) -> bool {
        let _ = (tx, sender);
        true
    }

    /// Worst-case asset byte length, used to bound batch sizes
    fn max_asset_size(&self) -> usize;

    /// Best-case asset byte length
    fn min_asset_size(&self) -> usize;
}

impl std::fmt::Debug for dyn TransactionHandler + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionHandler")
            .field("type", &self.transaction_type())
            .finish()
    }
}

/// Tag-to-handler table, populated once at startup
pub struct Registry {
    handlers: HashMap<TransactionType, Box<dyn TransactionHandler>>,
}

impl Registry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registry with the five standard handlers attached
    pub fn standard(config: &ChainConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(handlers::Transfer::new(config.fees.clone())));
        registry.register(Box::new(handlers::SecondSignature::new(config.fees.clone())));
        registry.register(Box::new(handlers::Delegate::new(config.fees.clone())));
        registry.register(Box::new(handlers::Vote::new(config.fees.clone())));
        registry.register(Box::new(handlers::Multisignature::new(config.fees.clone())));
        registry
    }

    /// Attach a handler for its type tag
    ///
    /// Replacing an existing handler is a startup wiring bug; it is logged
    /// and the new handler wins.
    pub fn register(&mut self, handler: Box<dyn TransactionHandler>) {
        let tx_type = handler.transaction_type();
        if self.handlers.insert(tx_type, handler).is_some() {
            tracing::warn!("replaced existing handler for type {}", tx_type);
        }
    }

    /// Handler for a type tag
    pub fn handler(&self, tx_type: TransactionType) -> Result<&dyn TransactionHandler> {
        self.handlers
            .get(&tx_type)
            .map(|h| h.as_ref())
            .ok_or(Error::UnknownType(tx_type.as_u8()))
    }

    /// Iterate all registered handlers
    pub fn iter(&self) -> impl Iterator<Item = &dyn TransactionHandler> {
        self.handlers.values().map(|h| h.as_ref())
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<TransactionType> = self.handlers.keys().copied().collect();
        types.sort_unstable_by_key(|t| t.as_u8());
        f.debug_struct("Registry").field("types", &types).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_covers_all_types() {
        let registry = Registry::standard(&ChainConfig::default());
        assert_eq!(registry.len(), 5);
        for tag in 0u8..=4 {
            let tx_type = TransactionType::from_u8(tag).unwrap();
            assert!(registry.handler(tx_type).is_ok());
        }
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        let registry = Registry::new();
        let err = registry.handler(TransactionType::Transfer).unwrap_err();
        assert!(matches!(err, Error::UnknownType(0)));
    }
}
