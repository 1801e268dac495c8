//! Value-transfer handler (type 0)

use super::{amount_delta, asset_mismatch};
use crate::config::FeeSchedule;
use crate::dbops::DbOp;
use crate::error::{Error, Result};
use crate::registry::TransactionHandler;
use crate::types::{Account, Asset, BlockRef, Transaction, TransactionType};
use serde_json::Value;

/// Moves `amount` from the sender to the recipient
#[derive(Debug)]
pub struct Transfer {
    fees: FeeSchedule,
}

impl Transfer {
    /// New handler with the chain fee schedule
    pub fn new(fees: FeeSchedule) -> Self {
        Self { fees }
    }
}

impl TransactionHandler for Transfer {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::Transfer
    }

    fn calculate_fee(&self, _tx: &Transaction, _sender: &Account, _height: u64) -> u64 {
        self.fees.transfer
    }

    fn verify(&self, tx: &Transaction, _sender: &Account) -> Result<()> {
        if !matches!(tx.asset, Asset::Transfer) {
            return Err(asset_mismatch(tx));
        }
        if tx.recipient_id.is_none() {
            return Err(Error::InvalidAsset("missing recipient".to_string()));
        }
        if tx.amount == 0 {
            return Err(Error::InvalidAmount(
                "transfer amount must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn asset_bytes(&self, tx: &Transaction) -> Result<Vec<u8>> {
        match tx.asset {
            Asset::Transfer => Ok(Vec::new()),
            _ => Err(asset_mismatch(tx)),
        }
    }

    fn asset_from_bytes(&self, raw: &[u8]) -> Result<Asset> {
        if !raw.is_empty() {
            return Err(Error::Decode(format!(
                "transfer carries no asset bytes, got {}",
                raw.len()
            )));
        }
        Ok(Asset::Transfer)
    }

    fn apply(&self, tx: &Transaction, block: &BlockRef, _sender: &Account) -> Result<Vec<DbOp>> {
        let recipient = tx
            .recipient_id
            .as_ref()
            .ok_or_else(|| Error::InvalidAsset("missing recipient".to_string()))?;
        Ok(vec![DbOp::merge_balance(
            recipient,
            amount_delta(tx.amount)?,
            Some(&block.id),
        )])
    }

    fn undo(&self, tx: &Transaction, block: &BlockRef, _sender: &Account) -> Result<Vec<DbOp>> {
        let recipient = tx
            .recipient_id
            .as_ref()
            .ok_or_else(|| Error::InvalidAsset("missing recipient".to_string()))?;
        Ok(vec![DbOp::merge_balance(
            recipient,
            -amount_delta(tx.amount)?,
            Some(&block.id),
        )])
    }

    // The recipient's unconfirmed balance is only credited at confirmation,
    // so a pooled transfer has no unconfirmed asset effects.
    fn apply_unconfirmed(&self, _tx: &Transaction, _sender: &mut Account) -> Result<Vec<DbOp>> {
        Ok(Vec::new())
    }

    fn undo_unconfirmed(&self, _tx: &Transaction, _sender: &mut Account) -> Result<Vec<DbOp>> {
        Ok(Vec::new())
    }

    fn normalize_asset(&self, asset: &Value) -> Result<Asset> {
        match asset {
            Value::Null => Ok(Asset::Transfer),
            Value::Object(map) if map.is_empty() => Ok(Asset::Transfer),
            _ => Err(Error::SchemaViolation(
                "transfer asset must be empty".to_string(),
            )),
        }
    }

    fn db_save(&self, _txs: &[&Transaction]) -> Result<Vec<DbOp>> {
        Ok(Vec::new())
    }

    fn db_read(&self, _row: &Value) -> Result<Option<Asset>> {
        Ok(None)
    }

    fn max_asset_size(&self) -> usize {
        0
    }

    fn min_asset_size(&self) -> usize {
        0
    }
}
