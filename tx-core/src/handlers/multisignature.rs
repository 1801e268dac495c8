//! Multisignature group registration handler (type 4)

use super::{
    already_pending, asset_mismatch, expect_no_recipient, expect_zero_amount, parse_signed_key,
    SIGNED_KEY_LEN,
};
use crate::config::FeeSchedule;
use crate::dbops::DbOp;
use crate::error::{Error, Result};
use crate::registry::TransactionHandler;
use crate::types::{Account, Asset, BlockRef, PublicKey, Transaction, TransactionType};
use serde_json::{json, Value};
use std::collections::HashSet;

/// Keysgroup size bounds
const MIN_KEYSGROUP: usize = 1;
const MAX_KEYSGROUP: usize = 15;

/// Signature threshold bounds
const MIN_THRESHOLD: u8 = 1;
const MAX_THRESHOLD: u8 = 16;

/// Lifetime bounds in hours
const MIN_LIFETIME: u8 = 1;
const MAX_LIFETIME: u8 = 72;

/// Registers a multisignature group on the sender account
#[derive(Debug)]
pub struct Multisignature {
    fees: FeeSchedule,
}

impl Multisignature {
    /// New handler with the chain fee schedule
    pub fn new(fees: FeeSchedule) -> Self {
        Self { fees }
    }

    fn asset_parts(tx: &Transaction) -> Result<(u8, u8, &[String])> {
        match &tx.asset {
            Asset::Multisignature {
                min,
                lifetime,
                keysgroup,
            } => Ok((*min, *lifetime, keysgroup)),
            _ => Err(asset_mismatch(tx)),
        }
    }

    fn validate(min: u8, lifetime: u8, keysgroup: &[String], sender: &Account) -> Result<()> {
        if !(MIN_KEYSGROUP..=MAX_KEYSGROUP).contains(&keysgroup.len()) {
            return Err(Error::InvalidAsset(format!(
                "keysgroup must hold {} to {} keys, got {}",
                MIN_KEYSGROUP,
                MAX_KEYSGROUP,
                keysgroup.len()
            )));
        }
        if !(MIN_THRESHOLD..=MAX_THRESHOLD).contains(&min) {
            return Err(Error::InvalidAsset(format!(
                "signature threshold must be {} to {}, got {}",
                MIN_THRESHOLD, MAX_THRESHOLD, min
            )));
        }
        if min as usize > keysgroup.len() + 1 {
            return Err(Error::InvalidAsset(format!(
                "signature threshold {} exceeds group size {}",
                min,
                keysgroup.len() + 1
            )));
        }
        if !(MIN_LIFETIME..=MAX_LIFETIME).contains(&lifetime) {
            return Err(Error::InvalidAsset(format!(
                "lifetime must be {} to {} hours, got {}",
                MIN_LIFETIME, MAX_LIFETIME, lifetime
            )));
        }
        let mut seen = HashSet::new();
        for entry in keysgroup {
            let (sign, key) = parse_signed_key(entry)?;
            if sign != '+' {
                return Err(Error::InvalidAsset(format!(
                    "keysgroup entries must be additions: {}",
                    entry
                )));
            }
            if Some(key) == sender.public_key {
                return Err(Error::InvalidAsset(
                    "keysgroup must not contain the sender key".to_string(),
                ));
            }
            if !seen.insert(key) {
                return Err(Error::InvalidAsset(format!(
                    "duplicate key in keysgroup: {}",
                    key
                )));
            }
        }
        Ok(())
    }

    fn member_keys(keysgroup: &[String]) -> Result<Vec<PublicKey>> {
        keysgroup
            .iter()
            .map(|entry| parse_signed_key(entry).map(|(_, key)| key))
            .collect()
    }
}

impl TransactionHandler for Multisignature {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::Multisignature
    }

    fn calculate_fee(&self, tx: &Transaction, _sender: &Account, _height: u64) -> u64 {
        let keys = match &tx.asset {
            Asset::Multisignature { keysgroup, .. } => keysgroup.len() as u64,
            _ => 0,
        };
        (keys + 1) * self.fees.multisignature
    }

    fn verify(&self, tx: &Transaction, sender: &Account) -> Result<()> {
        expect_no_recipient(tx)?;
        expect_zero_amount(tx)?;
        let (min, lifetime, keysgroup) = Self::asset_parts(tx)?;
        Self::validate(min, lifetime, keysgroup, sender)
    }

    fn asset_bytes(&self, tx: &Transaction) -> Result<Vec<u8>> {
        let (min, lifetime, keysgroup) = Self::asset_parts(tx)?;
        let mut bytes = Vec::with_capacity(2 + keysgroup.len() * SIGNED_KEY_LEN);
        bytes.push(min);
        bytes.push(lifetime);
        bytes.extend_from_slice(keysgroup.concat().as_bytes());
        Ok(bytes)
    }

    fn asset_from_bytes(&self, raw: &[u8]) -> Result<Asset> {
        if raw.len() < 2 {
            return Err(Error::Decode(
                "multisignature asset must carry min and lifetime".to_string(),
            ));
        }
        let (min, lifetime) = (raw[0], raw[1]);
        let text = std::str::from_utf8(&raw[2..])
            .map_err(|e| Error::Decode(format!("keysgroup is not utf8: {}", e)))?;
        if text.is_empty() || text.len() % SIGNED_KEY_LEN != 0 {
            return Err(Error::Decode(format!(
                "keysgroup length must be a positive multiple of {}: {}",
                SIGNED_KEY_LEN,
                text.len()
            )));
        }
        let keysgroup: Vec<String> = text
            .as_bytes()
            .chunks(SIGNED_KEY_LEN)
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect();
        Ok(Asset::Multisignature {
            min,
            lifetime,
            keysgroup,
        })
    }

    fn apply(&self, tx: &Transaction, _block: &BlockRef, sender: &Account) -> Result<Vec<DbOp>> {
        let (min, lifetime, keysgroup) = Self::asset_parts(tx)?;
        let keys: Vec<String> = Self::member_keys(keysgroup)?
            .iter()
            .map(PublicKey::to_hex)
            .collect();
        Ok(vec![DbOp::set_account_fields(
            &sender.address,
            json!({ "multimin": min, "multilifetime": lifetime, "multisignatures": keys }),
        )])
    }

    fn undo(&self, _tx: &Transaction, _block: &BlockRef, sender: &Account) -> Result<Vec<DbOp>> {
        Ok(vec![DbOp::set_account_fields(
            &sender.address,
            json!({ "multimin": 0, "multilifetime": 0, "multisignatures": [] }),
        )])
    }

    fn apply_unconfirmed(&self, tx: &Transaction, sender: &mut Account) -> Result<Vec<DbOp>> {
        if !sender.u_multisignatures.is_empty() || !sender.multisignatures.is_empty() {
            return Err(already_pending("multisignature", sender));
        }
        let (min, lifetime, keysgroup) = Self::asset_parts(tx)?;
        sender.u_multisignatures = Self::member_keys(keysgroup)?;
        let keys: Vec<String> = sender.u_multisignatures.iter().map(PublicKey::to_hex).collect();
        Ok(vec![DbOp::set_account_fields(
            &sender.address,
            json!({ "u_multimin": min, "u_multilifetime": lifetime, "u_multisignatures": keys }),
        )])
    }

    fn undo_unconfirmed(&self, _tx: &Transaction, sender: &mut Account) -> Result<Vec<DbOp>> {
        sender.u_multisignatures.clear();
        Ok(vec![DbOp::set_account_fields(
            &sender.address,
            json!({ "u_multimin": 0, "u_multilifetime": 0, "u_multisignatures": [] }),
        )])
    }

    fn normalize_asset(&self, asset: &Value) -> Result<Asset> {
        let group = asset.get("multisignature").ok_or_else(|| {
            Error::SchemaViolation("multisignature asset requires a multisignature object".to_string())
        })?;
        let min = group
            .get("min")
            .and_then(Value::as_u64)
            .and_then(|v| u8::try_from(v).ok())
            .ok_or_else(|| Error::SchemaViolation("multisignature.min must be a small integer".to_string()))?;
        let lifetime = group
            .get("lifetime")
            .and_then(Value::as_u64)
            .and_then(|v| u8::try_from(v).ok())
            .ok_or_else(|| {
                Error::SchemaViolation("multisignature.lifetime must be a small integer".to_string())
            })?;
        let keysgroup: Vec<String> = group
            .get("keysgroup")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                Error::SchemaViolation("multisignature.keysgroup must be an array".to_string())
            })?
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| Error::SchemaViolation("keysgroup entries must be strings".to_string()))
            })
            .collect::<Result<_>>()?;
        Ok(Asset::Multisignature {
            min,
            lifetime,
            keysgroup,
        })
    }

    fn db_save(&self, txs: &[&Transaction]) -> Result<Vec<DbOp>> {
        let mut values = Vec::with_capacity(txs.len());
        for tx in txs {
            let (min, lifetime, keysgroup) = Self::asset_parts(tx)?;
            values.push(json!({
                "transactionId": tx.id.as_str(),
                "min": min,
                "lifetime": lifetime,
                "keysgroup": keysgroup.join(","),
            }));
        }
        Ok(vec![DbOp::BulkCreate {
            model: "multisignatures".to_string(),
            values,
        }])
    }

    fn db_read(&self, row: &Value) -> Result<Option<Asset>> {
        let keysgroup = match row.get("m_keysgroup").and_then(Value::as_str) {
            Some(joined) => joined.split(',').map(str::to_string).collect(),
            None => return Ok(None),
        };
        let min = row.get("m_min").and_then(Value::as_u64).unwrap_or(0) as u8;
        let lifetime = row.get("m_lifetime").and_then(Value::as_u64).unwrap_or(0) as u8;
        Ok(Some(Asset::Multisignature {
            min,
            lifetime,
            keysgroup,
        }))
    }

    fn max_asset_size(&self) -> usize {
        2 + MAX_KEYSGROUP * SIGNED_KEY_LEN
    }

    fn min_asset_size(&self) -> usize {
        2 + MIN_KEYSGROUP * SIGNED_KEY_LEN
    }
}
