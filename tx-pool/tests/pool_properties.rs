//! Property-based tests for the staged pool
//!
//! Invariant under test: a transaction id occupies at most one stage at any
//! time, through any interleaving of add, move, and remove operations.

use proptest::prelude::*;
use std::collections::HashMap;
use tx_core::{Address, Asset, PublicKey, Signature, Transaction, TransactionId, TransactionType};
use tx_pool::{PoolPayload, Stage, TransactionPool};

fn test_tx(id: usize) -> Transaction {
    Transaction {
        tx_type: TransactionType::Transfer,
        timestamp: 0,
        sender_public_key: PublicKey::from_bytes([0u8; 32]),
        requester_public_key: None,
        sender_id: Address::from_numeric(1),
        recipient_id: Some(Address::from_numeric(2)),
        amount: 1,
        fee: id as u64,
        signature: Signature::zero(),
        sign_signature: None,
        id: TransactionId::new(id.to_string()),
        asset: Asset::Transfer,
        block_id: None,
        relays: 0,
    }
}

#[derive(Debug, Clone)]
enum Op {
    Add(usize, Stage),
    Move(usize, Stage),
    Remove(usize),
}

fn stage_strategy() -> impl Strategy<Value = Stage> {
    prop_oneof![
        Just(Stage::Ready),
        Just(Stage::Queued),
        Just(Stage::Pending),
        Just(Stage::Unconfirmed),
    ]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..20, stage_strategy()).prop_map(|(id, stage)| Op::Add(id, stage)),
        (0usize..20, stage_strategy()).prop_map(|(id, stage)| Op::Move(id, stage)),
        (0usize..20).prop_map(Op::Remove),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Property: after any operation sequence, the pool and a reference
    /// model agree, and every id is in at most one stage
    #[test]
    fn prop_at_most_one_stage(ops in prop::collection::vec(op_strategy(), 1..80)) {
        let mut pool = TransactionPool::new();
        let mut model: HashMap<usize, Stage> = HashMap::new();

        for op in ops {
            match op {
                Op::Add(id, stage) => {
                    let result = pool.add(stage, test_tx(id), PoolPayload::new(false));
                    if model.contains_key(&id) {
                        prop_assert!(result.is_err());
                    } else {
                        prop_assert!(result.is_ok());
                        model.insert(id, stage);
                    }
                }
                Op::Move(id, to) => {
                    let tx_id = TransactionId::new(id.to_string());
                    match model.get(&id).copied() {
                        Some(from) => {
                            pool.move_tx(&tx_id, from, to).unwrap();
                            model.insert(id, to);
                        }
                        None => {
                            prop_assert!(pool.move_tx(&tx_id, Stage::Queued, to).is_err());
                        }
                    }
                }
                Op::Remove(id) => {
                    let tx_id = TransactionId::new(id.to_string());
                    let removed_from = pool.remove_from_pool(&tx_id);
                    prop_assert_eq!(removed_from, model.remove(&id));
                }
            }

            // Pool and model agree on membership and stage
            for probe in 0usize..20 {
                let tx_id = TransactionId::new(probe.to_string());
                prop_assert_eq!(pool.what_queue(&tx_id), model.get(&probe).copied());

                let occupied = Stage::PROBE_ORDER
                    .into_iter()
                    .filter(|stage| pool.has(*stage, &tx_id))
                    .count();
                prop_assert!(occupied <= 1);
            }
            prop_assert_eq!(pool.total_count(), model.len());
        }
    }
}
