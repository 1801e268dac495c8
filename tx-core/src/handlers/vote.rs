//! Delegate vote handler (type 3)

use super::{asset_mismatch, expect_zero_amount, parse_signed_key, SIGNED_KEY_LEN};
use crate::config::FeeSchedule;
use crate::dbops::DbOp;
use crate::error::{Error, Result};
use crate::registry::TransactionHandler;
use crate::types::{Account, Asset, BlockRef, Transaction, TransactionType};
use serde_json::{json, Value};
use std::collections::HashSet;

/// Maximum vote entries in one transaction
const MAX_VOTES: usize = 33;

/// Adds or removes delegate votes for the sender
#[derive(Debug)]
pub struct Vote {
    fees: FeeSchedule,
}

impl Vote {
    /// New handler with the chain fee schedule
    pub fn new(fees: FeeSchedule) -> Self {
        Self { fees }
    }

    fn asset_votes(tx: &Transaction) -> Result<&[String]> {
        match &tx.asset {
            Asset::Vote { votes } => Ok(votes),
            _ => Err(asset_mismatch(tx)),
        }
    }

    fn validate_votes(votes: &[String]) -> Result<()> {
        if votes.is_empty() {
            return Err(Error::InvalidAsset("votes must not be empty".to_string()));
        }
        if votes.len() > MAX_VOTES {
            return Err(Error::InvalidAsset(format!(
                "voting limit exceeded: {} votes, maximum {}",
                votes.len(),
                MAX_VOTES
            )));
        }
        let mut seen = HashSet::new();
        for vote in votes {
            let (_, key) = parse_signed_key(vote)?;
            if !seen.insert(key) {
                return Err(Error::InvalidAsset(format!(
                    "duplicate vote for delegate {}",
                    key
                )));
            }
        }
        Ok(())
    }

    /// Flip every vote sign, producing the exact undo delta
    fn invert(votes: &[String]) -> Vec<String> {
        votes
            .iter()
            .map(|v| {
                let (sign, rest) = v.split_at(1);
                let flipped = if sign == "+" { "-" } else { "+" };
                format!("{}{}", flipped, rest)
            })
            .collect()
    }
}

impl TransactionHandler for Vote {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::Vote
    }

    fn calculate_fee(&self, _tx: &Transaction, _sender: &Account, _height: u64) -> u64 {
        self.fees.vote
    }

    fn verify(&self, tx: &Transaction, _sender: &Account) -> Result<()> {
        expect_zero_amount(tx)?;
        // Votes are self-addressed
        match &tx.recipient_id {
            Some(recipient) if recipient.eq_ignore_case(&tx.sender_id) => {}
            _ => {
                return Err(Error::InvalidAsset(
                    "vote recipient must match the sender".to_string(),
                ))
            }
        }
        Self::validate_votes(Self::asset_votes(tx)?)
    }

    fn asset_bytes(&self, tx: &Transaction) -> Result<Vec<u8>> {
        Ok(Self::asset_votes(tx)?.concat().into_bytes())
    }

    fn asset_from_bytes(&self, raw: &[u8]) -> Result<Asset> {
        let text = std::str::from_utf8(raw)
            .map_err(|e| Error::Decode(format!("vote asset is not utf8: {}", e)))?;
        if text.is_empty() || text.len() % SIGNED_KEY_LEN != 0 {
            return Err(Error::Decode(format!(
                "vote asset length must be a positive multiple of {}: {}",
                SIGNED_KEY_LEN,
                text.len()
            )));
        }
        let votes: Vec<String> = text
            .as_bytes()
            .chunks(SIGNED_KEY_LEN)
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect();
        Self::validate_votes(&votes).map_err(|e| Error::Decode(e.to_string()))?;
        Ok(Asset::Vote { votes })
    }

    fn apply(&self, tx: &Transaction, _block: &BlockRef, sender: &Account) -> Result<Vec<DbOp>> {
        Ok(vec![DbOp::Update {
            model: "mem_accounts2delegates".to_string(),
            where_clause: json!({ "accountId": sender.address.as_str() }),
            values: json!({ "delegates": Self::asset_votes(tx)? }),
        }])
    }

    fn undo(&self, tx: &Transaction, _block: &BlockRef, sender: &Account) -> Result<Vec<DbOp>> {
        Ok(vec![DbOp::Update {
            model: "mem_accounts2delegates".to_string(),
            where_clause: json!({ "accountId": sender.address.as_str() }),
            values: json!({ "delegates": Self::invert(Self::asset_votes(tx)?) }),
        }])
    }

    fn apply_unconfirmed(&self, tx: &Transaction, sender: &mut Account) -> Result<Vec<DbOp>> {
        Ok(vec![DbOp::Update {
            model: "mem_accounts2u_delegates".to_string(),
            where_clause: json!({ "accountId": sender.address.as_str() }),
            values: json!({ "u_delegates": Self::asset_votes(tx)? }),
        }])
    }

    fn undo_unconfirmed(&self, tx: &Transaction, sender: &mut Account) -> Result<Vec<DbOp>> {
        Ok(vec![DbOp::Update {
            model: "mem_accounts2u_delegates".to_string(),
            where_clause: json!({ "accountId": sender.address.as_str() }),
            values: json!({ "u_delegates": Self::invert(Self::asset_votes(tx)?) }),
        }])
    }

    fn normalize_asset(&self, asset: &Value) -> Result<Asset> {
        let votes = asset
            .get("votes")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                Error::SchemaViolation("vote asset requires a votes array".to_string())
            })?;
        let votes: Vec<String> = votes
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| Error::SchemaViolation("votes must be strings".to_string()))
            })
            .collect::<Result<_>>()?;
        Self::validate_votes(&votes).map_err(|e| Error::SchemaViolation(e.to_string()))?;
        Ok(Asset::Vote { votes })
    }

    fn db_save(&self, txs: &[&Transaction]) -> Result<Vec<DbOp>> {
        let mut values = Vec::with_capacity(txs.len());
        for tx in txs {
            values.push(json!({
                "transactionId": tx.id.as_str(),
                "votes": Self::asset_votes(tx)?.join(","),
            }));
        }
        Ok(vec![DbOp::BulkCreate {
            model: "votes".to_string(),
            values,
        }])
    }

    fn db_read(&self, row: &Value) -> Result<Option<Asset>> {
        Ok(row.get("v_votes").and_then(Value::as_str).map(|joined| {
            Asset::Vote {
                votes: joined.split(',').map(str::to_string).collect(),
            }
        }))
    }

    fn max_asset_size(&self) -> usize {
        MAX_VOTES * SIGNED_KEY_LEN
    }

    fn min_asset_size(&self) -> usize {
        SIGNED_KEY_LEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, PublicKey, Signature, TransactionId};

    fn handler() -> Vote {
        Vote::new(FeeSchedule::default())
    }

    fn vote_entry(sign: char, byte: u8) -> String {
        format!("{}{}", sign, hex::encode([byte; 32]))
    }

    fn vote_tx(votes: Vec<String>) -> Transaction {
        let sender_id = Address::from_numeric(1);
        Transaction {
            tx_type: TransactionType::Vote,
            timestamp: 0,
            sender_public_key: PublicKey::from_bytes([1u8; 32]),
            requester_public_key: None,
            sender_id: sender_id.clone(),
            recipient_id: Some(sender_id),
            amount: 0,
            fee: 100_000_000,
            signature: Signature::zero(),
            sign_signature: None,
            id: TransactionId::new("1"),
            asset: Asset::Vote { votes },
            block_id: None,
            relays: 0,
        }
    }

    #[test]
    fn test_verify_vote_rules() {
        let h = handler();
        let sender = Account::new(Address::from_numeric(1));

        let ok = vote_tx(vec![vote_entry('+', 1), vote_entry('-', 2)]);
        assert!(h.verify(&ok, &sender).is_ok());

        let empty = vote_tx(vec![]);
        assert!(h.verify(&empty, &sender).is_err());

        let duplicate = vote_tx(vec![vote_entry('+', 1), vote_entry('-', 1)]);
        assert!(h.verify(&duplicate, &sender).is_err());

        let bad_sign = vote_tx(vec![format!("*{}", hex::encode([1u8; 32]))]);
        assert!(h.verify(&bad_sign, &sender).is_err());

        let mut wrong_recipient = vote_tx(vec![vote_entry('+', 1)]);
        wrong_recipient.recipient_id = Some(Address::from_numeric(2));
        assert!(h.verify(&wrong_recipient, &sender).is_err());

        let too_many = vote_tx((0..34).map(|i| vote_entry('+', i)).collect());
        assert!(h.verify(&too_many, &sender).is_err());
    }

    #[test]
    fn test_asset_round_trip() {
        let h = handler();
        let tx = vote_tx(vec![vote_entry('+', 3), vote_entry('-', 4)]);
        let bytes = h.asset_bytes(&tx).unwrap();
        assert_eq!(bytes.len(), 2 * SIGNED_KEY_LEN);
        assert_eq!(h.asset_from_bytes(&bytes).unwrap(), tx.asset);
    }

    #[test]
    fn test_undo_inverts_votes() {
        let h = handler();
        let sender = Account::new(Address::from_numeric(1));
        let tx = vote_tx(vec![vote_entry('+', 3)]);
        let block = BlockRef {
            id: "9".to_string(),
            height: 1,
        };

        let ops = h.undo(&tx, &block, &sender).unwrap();
        match &ops[0] {
            DbOp::Update { values, .. } => {
                assert_eq!(values["delegates"][0], vote_entry('-', 3));
            }
            _ => panic!("expected update op"),
        }
    }
}
