//! Transaction verification and application engine
//!
//! Orchestrates id derivation, signature verification, fee/amount/balance
//! checks, and balance-mutating apply/undo. Type-specific behavior is
//! delegated to the registry; storage effects are emitted as persistence-op
//! descriptors, never executed here.
//!
//! Failure policy: structural and consensus violations are synchronous hard
//! failures and are never retried by this component. Extension-point errors
//! propagate unchanged.

use crate::codec;
use crate::config::ChainConfig;
use crate::crypto::{self, KeyPair};
use crate::dbops::DbOp;
use crate::error::{Error, Result};
use crate::hooks::Hooks;
use crate::registry::Registry;
use crate::types::{
    Account, Address, BlockRef, PublicKey, Signature, Transaction, TransactionId, TransactionType,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// The verification/application engine
pub struct TransactionLogic {
    registry: Registry,
    hooks: Arc<dyn Hooks>,
    config: ChainConfig,
}

impl std::fmt::Debug for TransactionLogic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionLogic")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TransactionLogic {
    /// New engine over a populated registry
    pub fn new(registry: Registry, hooks: Arc<dyn Hooks>, config: ChainConfig) -> Self {
        Self {
            registry,
            hooks,
            config,
        }
    }

    /// The type registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Chain constants
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Wire encoding, see [`codec::to_bytes`]
    pub fn to_bytes(
        &self,
        tx: &Transaction,
        skip_signature: bool,
        skip_second_signature: bool,
    ) -> Result<Vec<u8>> {
        codec::to_bytes(&self.registry, tx, skip_signature, skip_second_signature)
    }

    /// Wire decoding, see [`codec::from_bytes`]
    pub fn from_bytes(
        &self,
        raw: &[u8],
        has_requester: bool,
        has_second_signature: bool,
    ) -> Result<Transaction> {
        codec::from_bytes(&self.registry, raw, has_requester, has_second_signature)
    }

    /// Canonical id, see [`codec::transaction_id`]
    pub fn transaction_id(&self, tx: &Transaction) -> Result<TransactionId> {
        codec::transaction_id(&self.registry, tx)
    }

    /// Sign a transaction and refresh its id
    pub fn sign(&self, keypair: &KeyPair, tx: &mut Transaction) -> Result<()> {
        let unsigned = self.to_bytes(tx, true, true)?;
        tx.signature = keypair.sign(&unsigned);
        tx.id = self.transaction_id(tx)?;
        Ok(())
    }

    /// Attach a second-factor signature and refresh the id
    pub fn sign_second(&self, keypair: &KeyPair, tx: &mut Transaction) -> Result<()> {
        let once_signed = self.to_bytes(tx, false, true)?;
        tx.sign_signature = Some(keypair.sign(&once_signed));
        tx.id = self.transaction_id(tx)?;
        Ok(())
    }

    /// Verify the primary signature against a public key
    ///
    /// The signed range excludes both signature fields.
    pub fn verify_signature(&self, tx: &Transaction, public_key: &PublicKey) -> Result<bool> {
        let bytes = self.to_bytes(tx, true, true)?;
        Ok(crypto::verify_signature(&bytes, &tx.signature, public_key))
    }

    /// Verify the second-factor signature against a public key
    ///
    /// The signed range excludes only the second signature.
    pub fn verify_second_signature(
        &self,
        tx: &Transaction,
        public_key: &PublicKey,
    ) -> Result<bool> {
        let second = match &tx.sign_signature {
            Some(signature) => signature,
            None => return Ok(false),
        };
        let bytes = self.to_bytes(tx, false, true)?;
        Ok(crypto::verify_signature(&bytes, second, public_key))
    }

    fn is_genesis_block_tx(&self, tx: &Transaction) -> bool {
        tx.block_id.as_deref() == Some(self.config.genesis_block_id.as_str())
    }

    /// Full consensus verification of a single transaction
    ///
    /// `requester` is the resolved on-behalf-of account when
    /// `requesterPublicKey` is set. `height` feeds height-dependent fee
    /// calculation.
    pub async fn verify(
        &self,
        tx: &Transaction,
        sender: &Account,
        requester: Option<&Account>,
        height: u64,
    ) -> Result<()> {
        self.hooks.pre_verify(tx).await.map_err(Error::Hook)?;

        let handler = self.registry.handler(tx.tx_type)?;

        match &sender.public_key {
            Some(known) if *known == tx.sender_public_key => {}
            Some(known) => {
                return Err(Error::InvalidSenderKey(format!(
                    "expected {}, got {}",
                    known, tx.sender_public_key
                )))
            }
            None => {
                return Err(Error::InvalidSenderKey(format!(
                    "account {} has no known public key",
                    sender.address
                )))
            }
        }

        if tx.sender_public_key == self.config.genesis_public_key
            && !self.is_genesis_block_tx(tx)
        {
            return Err(Error::GenesisViolation);
        }

        let derived = crypto::address_from_public_key(&tx.sender_public_key);
        if !derived.eq_ignore_case(&tx.sender_id) {
            return Err(Error::InvalidAddress(format!(
                "claimed {}, derived {}",
                tx.sender_id, derived
            )));
        }

        let expected_id = self.transaction_id(tx)?;
        if expected_id != tx.id {
            return Err(Error::InvalidId {
                expected: expected_id.to_string(),
                actual: tx.id.to_string(),
            });
        }

        let now = self.config.now_timestamp();
        if tx.timestamp > now {
            return Err(Error::InvalidTimestamp(format!(
                "timestamp {} is ahead of network time {}",
                tx.timestamp, now
            )));
        }

        // On-behalf-of transactions are signed by the requester, and the
        // requester must belong to the sender's multisignature group.
        let signing_key = match &tx.requester_public_key {
            Some(requester_key) => {
                if !sender.multisignatures.contains(requester_key) {
                    return Err(Error::InvalidSenderKey(format!(
                        "requester {} is not in the sender's multisignature group",
                        requester_key
                    )));
                }
                requester_key
            }
            None => &tx.sender_public_key,
        };
        if !self.verify_signature(tx, signing_key)? {
            return Err(Error::InvalidSignature);
        }

        // The second-factor requirement follows whoever signed.
        let second_signer = requester.unwrap_or(sender);
        if second_signer.second_signature {
            let second_key = second_signer
                .second_public_key
                .as_ref()
                .ok_or(Error::InvalidSecondSignature)?;
            if !self.verify_second_signature(tx, second_key)? {
                return Err(Error::InvalidSecondSignature);
            }
        } else if tx.sign_signature.is_some() {
            return Err(Error::InvalidSecondSignature);
        }

        let expected_fee = handler.calculate_fee(tx, sender, height);
        if expected_fee != tx.fee {
            return Err(Error::InvalidFee {
                expected: expected_fee,
                actual: tx.fee,
            });
        }

        if tx.amount > self.config.total_supply {
            return Err(Error::InvalidAmount(format!(
                "amount {} exceeds total supply {}",
                tx.amount, self.config.total_supply
            )));
        }

        if !self.is_genesis_block_tx(tx) {
            self.check_balance(tx, sender.balance, sender)?;
        }

        handler.verify(tx, sender)?;

        self.hooks.post_verify(tx).await.map_err(Error::Hook)?;
        Ok(())
    }

    fn check_balance(&self, tx: &Transaction, available: u64, sender: &Account) -> Result<()> {
        let required = tx.total_spend().ok_or_else(|| {
            Error::InvalidAmount("amount plus fee overflows".to_string())
        })?;
        if available < required {
            return Err(Error::InsufficientBalance {
                address: sender.address.to_string(),
                balance: available,
                required,
            });
        }
        Ok(())
    }

    /// Readiness of a transaction for admission
    ///
    /// Handler default plus the readiness extension point; defaults to true.
    pub async fn ready(&self, tx: &Transaction, sender: &Account) -> Result<bool> {
        let handler = self.registry.handler(tx.tx_type)?;
        let ready = handler.ready(tx, sender);
        self.hooks
            .transaction_ready(ready, tx, sender)
            .await
            .map_err(Error::Hook)
    }

    /// Apply confirmed balance effects, mutating `sender` eagerly
    ///
    /// Returns the ordered persistence ops, already passed through the
    /// apply-ops extension filter.
    pub async fn apply(
        &self,
        tx: &Transaction,
        block: &BlockRef,
        sender: &mut Account,
    ) -> Result<Vec<DbOp>> {
        if !self.ready(tx, sender).await? {
            return Err(Error::NotReady(tx.id.to_string()));
        }

        let genesis = self.is_genesis_block_tx(tx);
        if !genesis {
            self.check_balance(tx, sender.balance, sender)?;
        }
        let required = tx.total_spend().ok_or_else(|| {
            Error::InvalidAmount("amount plus fee overflows".to_string())
        })?;

        let handler = self.registry.handler(tx.tx_type)?;
        let mut ops = vec![DbOp::merge_balance(
            &sender.address,
            -spend_delta(required)?,
            Some(&block.id),
        )];
        ops.extend(handler.apply(tx, block, sender)?);

        sender.balance = sender.balance.saturating_sub(required);

        self.hooks.apply_ops(ops, tx).await.map_err(Error::Hook)
    }

    /// Exact reversal of [`Self::apply`]
    ///
    /// Undo never re-validates sufficiency; it must be runnable regardless
    /// of the current balance.
    pub async fn undo(
        &self,
        tx: &Transaction,
        block: &BlockRef,
        sender: &mut Account,
    ) -> Result<Vec<DbOp>> {
        let required = tx.total_spend().ok_or_else(|| {
            Error::InvalidAmount("amount plus fee overflows".to_string())
        })?;

        let handler = self.registry.handler(tx.tx_type)?;
        let mut ops = vec![DbOp::merge_balance(
            &sender.address,
            spend_delta(required)?,
            Some(&block.id),
        )];
        ops.extend(handler.undo(tx, block, sender)?);

        sender.balance = sender.balance.checked_add(required).ok_or_else(|| {
            Error::InvalidAmount("balance overflow on undo".to_string())
        })?;

        self.hooks.undo_ops(ops, tx).await.map_err(Error::Hook)
    }

    /// Apply unconfirmed balance effects, mutating `sender` eagerly
    pub async fn apply_unconfirmed(
        &self,
        tx: &Transaction,
        sender: &mut Account,
    ) -> Result<Vec<DbOp>> {
        let required = tx.total_spend().ok_or_else(|| {
            Error::InvalidAmount("amount plus fee overflows".to_string())
        })?;
        if sender.u_balance < required {
            return Err(Error::InsufficientBalance {
                address: sender.address.to_string(),
                balance: sender.u_balance,
                required,
            });
        }

        let handler = self.registry.handler(tx.tx_type)?;
        let mut ops = vec![DbOp::merge_unconfirmed_balance(
            &sender.address,
            -spend_delta(required)?,
        )];
        ops.extend(handler.apply_unconfirmed(tx, sender)?);

        sender.u_balance -= required;

        self.hooks.apply_ops(ops, tx).await.map_err(Error::Hook)
    }

    /// Exact reversal of [`Self::apply_unconfirmed`]
    pub async fn undo_unconfirmed(
        &self,
        tx: &Transaction,
        sender: &mut Account,
    ) -> Result<Vec<DbOp>> {
        let required = tx.total_spend().ok_or_else(|| {
            Error::InvalidAmount("amount plus fee overflows".to_string())
        })?;

        let handler = self.registry.handler(tx.tx_type)?;
        let mut ops = vec![DbOp::merge_unconfirmed_balance(
            &sender.address,
            spend_delta(required)?,
        )];
        ops.extend(handler.undo_unconfirmed(tx, sender)?);

        sender.u_balance = sender.u_balance.checked_add(required).ok_or_else(|| {
            Error::InvalidAmount("unconfirmed balance overflow on undo".to_string())
        })?;

        self.hooks.undo_ops(ops, tx).await.map_err(Error::Hook)
    }

    /// Worst-case wire size over all registered types
    pub fn max_bytes_size(&self) -> usize {
        let asset = self
            .registry
            .iter()
            .map(|h| h.max_asset_size())
            .max()
            .unwrap_or(0);
        codec::FIXED_HEAD_LEN + codec::PUBLIC_KEY_LEN + asset + 2 * codec::SIGNATURE_LEN
    }

    /// Best-case wire size over all registered types
    pub fn min_bytes_size(&self) -> usize {
        let asset = self
            .registry
            .iter()
            .map(|h| h.min_asset_size())
            .min()
            .unwrap_or(0);
        codec::FIXED_HEAD_LEN + asset + codec::SIGNATURE_LEN
    }

    /// Normalize a raw JSON transaction into the typed form
    ///
    /// Strips null fields, decodes hex, validates structure with aggregated
    /// messages, then delegates asset normalization to the type handler.
    pub fn object_normalize(&self, mut value: Value) -> Result<Transaction> {
        let obj = value.as_object_mut().ok_or_else(|| {
            Error::SchemaViolation("transaction must be a JSON object".to_string())
        })?;
        obj.retain(|_, v| !v.is_null());

        let mut errors: Vec<String> = Vec::new();

        let tx_type = match obj.get("type").and_then(Value::as_u64) {
            Some(tag) if tag <= u8::MAX as u64 => match TransactionType::from_u8(tag as u8) {
                Some(t) => Some(t),
                None => {
                    errors.push(format!("unknown transaction type {}", tag));
                    None
                }
            },
            _ => {
                errors.push("type must be an integer type tag".to_string());
                None
            }
        };

        let timestamp = match obj.get("timestamp").and_then(Value::as_u64) {
            Some(ts) if ts <= u32::MAX as u64 => Some(ts as u32),
            _ => {
                errors.push("timestamp must be a 32-bit unsigned integer".to_string());
                None
            }
        };

        // as_u64 rejects fractional and exponential JSON numbers outright
        let amount = match obj.get("amount") {
            Some(v) => match v.as_u64() {
                Some(n) if n <= self.config.total_supply => Some(n),
                Some(n) => {
                    errors.push(format!("amount {} exceeds total supply", n));
                    None
                }
                None => {
                    errors.push(
                        "amount must be a non-negative integer without fraction or exponent"
                            .to_string(),
                    );
                    None
                }
            },
            None => Some(0),
        };

        let fee = match obj.get("fee") {
            Some(v) => match v.as_u64() {
                Some(n) => Some(n),
                None => {
                    errors.push("fee must be a non-negative integer".to_string());
                    None
                }
            },
            None => Some(0),
        };

        let sender_public_key = match obj.get("senderPublicKey").and_then(Value::as_str) {
            Some(s) => match PublicKey::from_hex(s) {
                Ok(key) => Some(key),
                Err(e) => {
                    errors.push(format!("senderPublicKey: {}", e));
                    None
                }
            },
            None => {
                errors.push("senderPublicKey is required".to_string());
                None
            }
        };

        let requester_public_key = match obj.get("requesterPublicKey") {
            Some(v) => match v.as_str().map(PublicKey::from_hex) {
                Some(Ok(key)) => Some(key),
                _ => {
                    errors.push("requesterPublicKey must be a 32-byte hex string".to_string());
                    None
                }
            },
            None => None,
        };

        let signature = match obj.get("signature").and_then(Value::as_str) {
            Some(s) => match Signature::from_hex(s) {
                Ok(sig) => Some(sig),
                Err(e) => {
                    errors.push(format!("signature: {}", e));
                    None
                }
            },
            None => {
                errors.push("signature is required".to_string());
                None
            }
        };

        let sign_signature = match obj.get("signSignature") {
            Some(v) => match v.as_str().map(Signature::from_hex) {
                Some(Ok(sig)) => Some(sig),
                _ => {
                    errors.push("signSignature must be a 64-byte hex string".to_string());
                    None
                }
            },
            None => None,
        };

        let sender_id = match obj.get("senderId").and_then(Value::as_str) {
            Some(s) => match Address::parse(s) {
                Ok(address) => Some(address),
                Err(e) => {
                    errors.push(format!("senderId: {}", e));
                    None
                }
            },
            None => None,
        };

        let recipient_id = match obj.get("recipientId") {
            Some(v) => match v.as_str().map(Address::parse) {
                Some(Ok(address)) => Some(address),
                _ => {
                    errors.push("recipientId must be a valid address".to_string());
                    None
                }
            },
            None => None,
        };

        let claimed_id = match obj.get("id") {
            Some(v) => match v.as_str() {
                Some(s)
                    if !s.is_empty()
                        && s.len() <= 20
                        && s.chars().all(|c| c.is_ascii_digit()) =>
                {
                    Some(TransactionId::new(s))
                }
                _ => {
                    errors.push("id must be a decimal string".to_string());
                    None
                }
            },
            None => None,
        };

        if !errors.is_empty() {
            return Err(Error::SchemaViolation(errors.join("; ")));
        }
        let (Some(tx_type), Some(timestamp), Some(amount), Some(fee), Some(sender_public_key), Some(signature)) =
            (tx_type, timestamp, amount, fee, sender_public_key, signature)
        else {
            return Err(Error::SchemaViolation("incomplete transaction".to_string()));
        };

        let handler = self.registry.handler(tx_type)?;
        let asset = handler.normalize_asset(obj.get("asset").unwrap_or(&Value::Null))?;

        let sender_id = sender_id
            .unwrap_or_else(|| crypto::address_from_public_key(&sender_public_key));

        let mut tx = Transaction {
            tx_type,
            timestamp,
            sender_public_key,
            requester_public_key,
            sender_id,
            recipient_id,
            amount,
            fee,
            signature,
            sign_signature,
            id: TransactionId::new("0"),
            asset,
            block_id: None,
            relays: 0,
        };
        tx.id = match claimed_id {
            Some(id) => id,
            None => self.transaction_id(&tx)?,
        };
        Ok(tx)
    }

    /// Batched persistence ops for a set of transactions
    ///
    /// One bulk insert for the transaction rows plus the asset ops of each
    /// handler, invoked once per type per batch.
    pub fn db_save(&self, txs: &[Transaction]) -> Result<Vec<DbOp>> {
        if txs.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<Value> = txs
            .iter()
            .map(|tx| {
                serde_json::to_value(tx)
                    .map_err(|e| Error::Other(format!("failed to serialize transaction: {}", e)))
            })
            .collect::<Result<_>>()?;
        let mut ops = vec![DbOp::BulkCreate {
            model: "transactions".to_string(),
            values: rows,
        }];

        for (tx_type, group) in group_by_type(txs) {
            let handler = self.registry.handler(tx_type)?;
            ops.extend(handler.db_save(&group)?);
        }
        Ok(ops)
    }

    /// Post-persistence side effects, grouped by type
    pub fn after_save(&self, txs: &[Transaction]) -> Result<()> {
        for (tx_type, group) in group_by_type(txs) {
            let handler = self.registry.handler(tx_type)?;
            for tx in group {
                handler.after_save(tx)?;
            }
        }
        Ok(())
    }

    /// Rehydrate asset payloads from stored rows, grouped by type
    pub fn attach_assets(
        &self,
        txs: &mut [Transaction],
        rows: &HashMap<TransactionId, Value>,
    ) -> Result<()> {
        let mut by_type: HashMap<TransactionType, Vec<usize>> = HashMap::new();
        for (index, tx) in txs.iter().enumerate() {
            by_type.entry(tx.tx_type).or_default().push(index);
        }
        for (tx_type, indexes) in by_type {
            let handler = self.registry.handler(tx_type)?;
            for index in indexes {
                if let Some(row) = rows.get(&txs[index].id) {
                    if let Some(asset) = handler.db_read(row)? {
                        txs[index].asset = asset;
                    }
                }
            }
        }
        Ok(())
    }
}

fn spend_delta(amount: u64) -> Result<i64> {
    i64::try_from(amount)
        .map_err(|_| Error::InvalidAmount(format!("spend does not fit a signed delta: {}", amount)))
}

fn group_by_type(txs: &[Transaction]) -> HashMap<TransactionType, Vec<&Transaction>> {
    let mut groups: HashMap<TransactionType, Vec<&Transaction>> = HashMap::new();
    for tx in txs {
        groups.entry(tx.tx_type).or_default().push(tx);
    }
    groups
}
