//! Delegate registration handler (type 2)

use super::{already_pending, asset_mismatch, expect_no_recipient, expect_zero_amount};
use crate::config::FeeSchedule;
use crate::dbops::DbOp;
use crate::error::{Error, Result};
use crate::registry::TransactionHandler;
use crate::types::{Account, Asset, BlockRef, Transaction, TransactionType, ADDRESS_SUFFIX};
use serde_json::{json, Value};

/// Maximum username length in bytes
const MAX_USERNAME_LEN: usize = 20;

/// Registers the sender as a forging delegate under a username
#[derive(Debug)]
pub struct Delegate {
    fees: FeeSchedule,
}

impl Delegate {
    /// New handler with the chain fee schedule
    pub fn new(fees: FeeSchedule) -> Self {
        Self { fees }
    }

    fn asset_username(tx: &Transaction) -> Result<&str> {
        match &tx.asset {
            Asset::Delegate { username } => Ok(username),
            _ => Err(asset_mismatch(tx)),
        }
    }

    fn validate_username(username: &str) -> Result<()> {
        if username.is_empty() {
            return Err(Error::InvalidAsset("username must not be empty".to_string()));
        }
        if username.len() > MAX_USERNAME_LEN {
            return Err(Error::InvalidAsset(format!(
                "username is longer than {} characters: {}",
                MAX_USERNAME_LEN, username
            )));
        }
        if username != username.to_lowercase() {
            return Err(Error::InvalidAsset(format!(
                "username must be lowercase: {}",
                username
            )));
        }
        let allowed =
            |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || "!@$&_.".contains(c);
        if !username.chars().all(allowed) {
            return Err(Error::InvalidAsset(format!(
                "username contains invalid characters: {}",
                username
            )));
        }
        // A username that parses as an address would shadow account lookups
        let looks_like_address = username
            .strip_suffix(ADDRESS_SUFFIX.to_ascii_lowercase())
            .map(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false);
        if looks_like_address {
            return Err(Error::InvalidAsset(format!(
                "username must not look like an address: {}",
                username
            )));
        }
        Ok(())
    }
}

impl TransactionHandler for Delegate {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::Delegate
    }

    fn calculate_fee(&self, _tx: &Transaction, _sender: &Account, _height: u64) -> u64 {
        self.fees.delegate
    }

    fn verify(&self, tx: &Transaction, sender: &Account) -> Result<()> {
        expect_no_recipient(tx)?;
        expect_zero_amount(tx)?;
        if sender.is_delegate {
            return Err(Error::InvalidAsset(format!(
                "account is already a delegate: {}",
                sender.address
            )));
        }
        Self::validate_username(Self::asset_username(tx)?)
    }

    fn asset_bytes(&self, tx: &Transaction) -> Result<Vec<u8>> {
        Ok(Self::asset_username(tx)?.as_bytes().to_vec())
    }

    fn asset_from_bytes(&self, raw: &[u8]) -> Result<Asset> {
        let username = std::str::from_utf8(raw)
            .map_err(|e| Error::Decode(format!("delegate username is not utf8: {}", e)))?;
        if username.is_empty() || username.len() > MAX_USERNAME_LEN {
            return Err(Error::Decode(format!(
                "delegate username length out of range: {}",
                username.len()
            )));
        }
        Ok(Asset::Delegate {
            username: username.to_string(),
        })
    }

    fn apply(&self, tx: &Transaction, _block: &BlockRef, sender: &Account) -> Result<Vec<DbOp>> {
        let username = Self::asset_username(tx)?;
        Ok(vec![DbOp::set_account_fields(
            &sender.address,
            json!({ "isDelegate": 1, "username": username }),
        )])
    }

    fn undo(&self, _tx: &Transaction, _block: &BlockRef, sender: &Account) -> Result<Vec<DbOp>> {
        Ok(vec![DbOp::set_account_fields(
            &sender.address,
            json!({ "isDelegate": 0, "username": Value::Null }),
        )])
    }

    fn apply_unconfirmed(&self, tx: &Transaction, sender: &mut Account) -> Result<Vec<DbOp>> {
        if sender.u_is_delegate || sender.is_delegate {
            return Err(already_pending("delegate", sender));
        }
        let username = Self::asset_username(tx)?.to_string();
        sender.u_is_delegate = true;
        sender.u_username = Some(username.clone());
        Ok(vec![DbOp::set_account_fields(
            &sender.address,
            json!({ "u_isDelegate": 1, "u_username": username }),
        )])
    }

    fn undo_unconfirmed(&self, _tx: &Transaction, sender: &mut Account) -> Result<Vec<DbOp>> {
        sender.u_is_delegate = false;
        sender.u_username = None;
        Ok(vec![DbOp::set_account_fields(
            &sender.address,
            json!({ "u_isDelegate": 0, "u_username": Value::Null }),
        )])
    }

    fn normalize_asset(&self, asset: &Value) -> Result<Asset> {
        let username = asset
            .get("delegate")
            .and_then(|d| d.get("username"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::SchemaViolation("delegate asset requires delegate.username".to_string())
            })?;
        Self::validate_username(username)
            .map_err(|e| Error::SchemaViolation(e.to_string()))?;
        Ok(Asset::Delegate {
            username: username.to_string(),
        })
    }

    fn db_save(&self, txs: &[&Transaction]) -> Result<Vec<DbOp>> {
        let mut values = Vec::with_capacity(txs.len());
        for tx in txs {
            values.push(json!({
                "transactionId": tx.id.as_str(),
                "username": Self::asset_username(tx)?,
            }));
        }
        Ok(vec![DbOp::BulkCreate {
            model: "delegates".to_string(),
            values,
        }])
    }

    fn db_read(&self, row: &Value) -> Result<Option<Asset>> {
        Ok(row
            .get("d_username")
            .and_then(Value::as_str)
            .map(|username| Asset::Delegate {
                username: username.to_string(),
            }))
    }

    fn max_asset_size(&self) -> usize {
        MAX_USERNAME_LEN
    }

    fn min_asset_size(&self) -> usize {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, PublicKey, Signature, TransactionId};

    fn handler() -> Delegate {
        Delegate::new(FeeSchedule::default())
    }

    fn registration_tx(username: &str) -> Transaction {
        Transaction {
            tx_type: TransactionType::Delegate,
            timestamp: 0,
            sender_public_key: PublicKey::from_bytes([1u8; 32]),
            requester_public_key: None,
            sender_id: Address::from_numeric(1),
            recipient_id: None,
            amount: 0,
            fee: 2_500_000_000,
            signature: Signature::zero(),
            sign_signature: None,
            id: TransactionId::new("1"),
            asset: Asset::Delegate {
                username: username.to_string(),
            },
            block_id: None,
            relays: 0,
        }
    }

    #[test]
    fn test_username_rules() {
        assert!(Delegate::validate_username("genesis_1").is_ok());
        assert!(Delegate::validate_username("").is_err());
        assert!(Delegate::validate_username("UPPER").is_err());
        assert!(Delegate::validate_username("way_too_long_username_xx").is_err());
        assert!(Delegate::validate_username("has space").is_err());
        assert!(Delegate::validate_username("12345m").is_err());
    }

    #[test]
    fn test_verify_rejects_existing_delegate() {
        let h = handler();
        let tx = registration_tx("validator");
        let mut sender = Account::new(Address::from_numeric(1));
        assert!(h.verify(&tx, &sender).is_ok());

        sender.is_delegate = true;
        assert!(h.verify(&tx, &sender).is_err());
    }

    #[test]
    fn test_asset_round_trip() {
        let h = handler();
        let tx = registration_tx("validator");
        let bytes = h.asset_bytes(&tx).unwrap();
        assert_eq!(h.asset_from_bytes(&bytes).unwrap(), tx.asset);
    }

    #[test]
    fn test_unconfirmed_marks_pending() {
        let h = handler();
        let tx = registration_tx("validator");
        let mut sender = Account::new(Address::from_numeric(1));

        h.apply_unconfirmed(&tx, &mut sender).unwrap();
        assert!(sender.u_is_delegate);
        assert_eq!(sender.u_username.as_deref(), Some("validator"));
        assert!(h.apply_unconfirmed(&tx, &mut sender).is_err());

        h.undo_unconfirmed(&tx, &mut sender).unwrap();
        assert!(!sender.u_is_delegate);
    }
}
