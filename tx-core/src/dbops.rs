//! Persistence-operation descriptors
//!
//! The core never writes storage. Apply/undo/save paths produce ordered
//! lists of [`DbOp`] descriptors which an external persistence executor
//! consumes exactly once.

use crate::types::Address;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A single abstract storage mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DbOp {
    /// Insert a batch of rows into a model
    BulkCreate {
        /// Target model identifier
        model: String,
        /// Literal row values
        values: Vec<Value>,
    },

    /// Update rows matching a predicate with a value delta
    Update {
        /// Target model identifier
        model: String,
        /// Predicate selecting the rows to update
        where_clause: Value,
        /// Column deltas or literal values to apply
        values: Value,
    },

    /// Free-form statement the executor knows how to run
    Custom {
        /// Target model identifier
        model: String,
        /// Statement text
        statement: String,
    },
}

impl DbOp {
    /// Ledger-merge op adjusting an account's confirmed balance
    pub fn merge_balance(address: &Address, delta: i64, block_id: Option<&str>) -> Self {
        let mut values = json!({ "balance": delta });
        if let Some(id) = block_id {
            values["blockId"] = json!(id);
        }
        DbOp::Update {
            model: "mem_accounts".to_string(),
            where_clause: json!({ "address": address.as_str() }),
            values,
        }
    }

    /// Ledger-merge op adjusting an account's unconfirmed balance
    pub fn merge_unconfirmed_balance(address: &Address, delta: i64) -> Self {
        DbOp::Update {
            model: "mem_accounts".to_string(),
            where_clause: json!({ "address": address.as_str() }),
            values: json!({ "u_balance": delta }),
        }
    }

    /// Generic field update on an account row
    pub fn set_account_fields(address: &Address, values: Value) -> Self {
        DbOp::Update {
            model: "mem_accounts".to_string(),
            where_clause: json!({ "address": address.as_str() }),
            values,
        }
    }
}
