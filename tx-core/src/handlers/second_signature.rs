//! Second-factor signature registration handler (type 1)

use super::{already_pending, asset_mismatch, expect_no_recipient, expect_zero_amount};
use crate::config::FeeSchedule;
use crate::dbops::DbOp;
use crate::error::{Error, Result};
use crate::registry::TransactionHandler;
use crate::types::{Account, Asset, BlockRef, PublicKey, Transaction, TransactionType};
use serde_json::{json, Value};

/// Registers a second public key the account must co-sign with
#[derive(Debug)]
pub struct SecondSignature {
    fees: FeeSchedule,
}

impl SecondSignature {
    /// New handler with the chain fee schedule
    pub fn new(fees: FeeSchedule) -> Self {
        Self { fees }
    }

    fn asset_key(tx: &Transaction) -> Result<&PublicKey> {
        match &tx.asset {
            Asset::SecondSignature { public_key } => Ok(public_key),
            _ => Err(asset_mismatch(tx)),
        }
    }
}

impl TransactionHandler for SecondSignature {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::SecondSignature
    }

    fn calculate_fee(&self, _tx: &Transaction, _sender: &Account, _height: u64) -> u64 {
        self.fees.second_signature
    }

    fn verify(&self, tx: &Transaction, _sender: &Account) -> Result<()> {
        expect_no_recipient(tx)?;
        expect_zero_amount(tx)?;
        Self::asset_key(tx)?;
        Ok(())
    }

    fn asset_bytes(&self, tx: &Transaction) -> Result<Vec<u8>> {
        Ok(Self::asset_key(tx)?.as_bytes().to_vec())
    }

    fn asset_from_bytes(&self, raw: &[u8]) -> Result<Asset> {
        let bytes: [u8; 32] = raw.try_into().map_err(|_| {
            Error::Decode(format!(
                "second-signature asset must be 32 bytes, got {}",
                raw.len()
            ))
        })?;
        Ok(Asset::SecondSignature {
            public_key: PublicKey::from_bytes(bytes),
        })
    }

    fn apply(&self, tx: &Transaction, _block: &BlockRef, sender: &Account) -> Result<Vec<DbOp>> {
        let key = Self::asset_key(tx)?;
        Ok(vec![DbOp::set_account_fields(
            &sender.address,
            json!({ "secondSignature": 1, "secondPublicKey": key.to_hex() }),
        )])
    }

    fn undo(&self, _tx: &Transaction, _block: &BlockRef, sender: &Account) -> Result<Vec<DbOp>> {
        Ok(vec![DbOp::set_account_fields(
            &sender.address,
            json!({ "secondSignature": 0, "secondPublicKey": Value::Null }),
        )])
    }

    fn apply_unconfirmed(&self, tx: &Transaction, sender: &mut Account) -> Result<Vec<DbOp>> {
        if sender.u_second_signature || sender.second_signature {
            return Err(already_pending("second signature", sender));
        }
        Self::asset_key(tx)?;
        sender.u_second_signature = true;
        Ok(vec![DbOp::set_account_fields(
            &sender.address,
            json!({ "u_secondSignature": 1 }),
        )])
    }

    fn undo_unconfirmed(&self, _tx: &Transaction, sender: &mut Account) -> Result<Vec<DbOp>> {
        sender.u_second_signature = false;
        Ok(vec![DbOp::set_account_fields(
            &sender.address,
            json!({ "u_secondSignature": 0 }),
        )])
    }

    fn normalize_asset(&self, asset: &Value) -> Result<Asset> {
        let key = asset
            .get("signature")
            .and_then(|s| s.get("publicKey"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::SchemaViolation(
                    "second-signature asset requires signature.publicKey".to_string(),
                )
            })?;
        let public_key = PublicKey::from_hex(key).map_err(Error::SchemaViolation)?;
        Ok(Asset::SecondSignature { public_key })
    }

    fn db_save(&self, txs: &[&Transaction]) -> Result<Vec<DbOp>> {
        let mut values = Vec::with_capacity(txs.len());
        for tx in txs {
            values.push(json!({
                "transactionId": tx.id.as_str(),
                "publicKey": Self::asset_key(tx)?.to_hex(),
            }));
        }
        Ok(vec![DbOp::BulkCreate {
            model: "signatures".to_string(),
            values,
        }])
    }

    fn db_read(&self, row: &Value) -> Result<Option<Asset>> {
        match row.get("s_publicKey").and_then(Value::as_str) {
            Some(key) => Ok(Some(Asset::SecondSignature {
                public_key: PublicKey::from_hex(key).map_err(Error::Decode)?,
            })),
            None => Ok(None),
        }
    }

    fn max_asset_size(&self) -> usize {
        32
    }

    fn min_asset_size(&self) -> usize {
        32
    }
}
