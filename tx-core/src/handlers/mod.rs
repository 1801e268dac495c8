//! Standard transaction type handlers
//!
//! One module per transaction kind. Each implements
//! [`crate::registry::TransactionHandler`] and owns the shape of its asset
//! payload, its wire asset bytes, and its persistence rows.

mod delegate;
mod multisignature;
mod second_signature;
mod transfer;
mod vote;

pub use delegate::Delegate;
pub use multisignature::Multisignature;
pub use second_signature::SecondSignature;
pub use transfer::Transfer;
pub use vote::Vote;

use crate::error::{Error, Result};
use crate::types::{Account, PublicKey, Transaction};

/// Length of a signed-key entry: sign character plus 64 hex characters
pub(crate) const SIGNED_KEY_LEN: usize = 65;

/// Reject transactions that carry a recipient
pub(crate) fn expect_no_recipient(tx: &Transaction) -> Result<()> {
    if tx.recipient_id.is_some() {
        return Err(Error::InvalidAsset(format!(
            "{} transactions must not have a recipient",
            tx.tx_type
        )));
    }
    Ok(())
}

/// Reject transactions that carry an amount
pub(crate) fn expect_zero_amount(tx: &Transaction) -> Result<()> {
    if tx.amount != 0 {
        return Err(Error::InvalidAmount(format!(
            "{} transactions must have zero amount, got {}",
            tx.tx_type, tx.amount
        )));
    }
    Ok(())
}

/// Parse a `+<hex pubkey>` / `-<hex pubkey>` entry
pub(crate) fn parse_signed_key(entry: &str) -> Result<(char, PublicKey)> {
    if entry.len() != SIGNED_KEY_LEN {
        return Err(Error::InvalidAsset(format!(
            "signed key entry must be {} characters: {}",
            SIGNED_KEY_LEN, entry
        )));
    }
    let sign = entry
        .chars()
        .next()
        .ok_or_else(|| Error::InvalidAsset("empty signed key entry".to_string()))?;
    if sign != '+' && sign != '-' {
        return Err(Error::InvalidAsset(format!(
            "signed key entry must start with '+' or '-': {}",
            entry
        )));
    }
    let key = PublicKey::from_hex(&entry[1..]).map_err(Error::InvalidAsset)?;
    Ok((sign, key))
}

/// Convert an atomic amount into a signed persistence delta
pub(crate) fn amount_delta(amount: u64) -> Result<i64> {
    i64::try_from(amount)
        .map_err(|_| Error::InvalidAmount(format!("amount does not fit a signed delta: {}", amount)))
}

/// Error for an asset that does not belong to the handler's type
pub(crate) fn asset_mismatch(tx: &Transaction) -> Error {
    Error::InvalidAsset(format!(
        "asset does not match transaction type {}",
        tx.tx_type
    ))
}

/// Guard used by second-signature style handlers: the sender must not have a
/// pending unconfirmed registration of the same kind
pub(crate) fn already_pending(what: &str, sender: &Account) -> Error {
    Error::InvalidAsset(format!(
        "{} registration already pending for {}",
        what, sender.address
    ))
}
