//! Property-based tests for the wire codec
//!
//! These tests use proptest to verify consensus-critical invariants:
//! - Round trip: decode(encode(tx)) == tx for every transaction kind
//! - Deterministic ids: same bytes → same id
//! - Tamper evidence: any single-byte corruption is detectable

use proptest::prelude::*;
use std::sync::Arc;
use tx_core::codec;
use tx_core::crypto::KeyPair;
use tx_core::{
    Account, Address, Asset, ChainConfig, Error, NoopHooks, Registry, Signature, Transaction,
    TransactionId, TransactionLogic, TransactionType,
};

fn registry() -> Registry {
    Registry::standard(&ChainConfig::default())
}

/// Strategy for generating per-kind asset payloads
fn asset_strategy() -> impl Strategy<Value = Asset> {
    prop_oneof![
        Just(Asset::Transfer),
        prop::array::uniform32(any::<u8>()).prop_map(|bytes| Asset::SecondSignature {
            public_key: tx_core::PublicKey::from_bytes(bytes),
        }),
        "[a-z]{1,20}".prop_map(|username| Asset::Delegate { username }),
        (prop::array::uniform32(any::<u8>()), 1usize..=10).prop_map(|(base, count)| {
            Asset::Vote {
                votes: distinct_signed_keys(base, count, '+'),
            }
        }),
        (
            prop::array::uniform32(any::<u8>()),
            1usize..=15,
            1u8..=16,
            1u8..=72,
        )
            .prop_map(|(base, count, min, lifetime)| {
                let keysgroup = distinct_signed_keys(base, count, '+');
                let min = min.min(count as u8 + 1);
                Asset::Multisignature {
                    min,
                    lifetime,
                    keysgroup,
                }
            }),
    ]
}

/// Derive `count` distinct signed-key strings from one base key
fn distinct_signed_keys(base: [u8; 32], count: usize, sign: char) -> Vec<String> {
    (0..count)
        .map(|i| {
            let mut key = base;
            key[0] = key[0].wrapping_add(i as u8);
            format!("{}{}", sign, hex::encode(key))
        })
        .collect()
}

fn type_for_asset(asset: &Asset) -> TransactionType {
    match asset {
        Asset::Transfer => TransactionType::Transfer,
        Asset::SecondSignature { .. } => TransactionType::SecondSignature,
        Asset::Delegate { .. } => TransactionType::Delegate,
        Asset::Vote { .. } => TransactionType::Vote,
        Asset::Multisignature { .. } => TransactionType::Multisignature,
    }
}

/// Build a fully signed transaction around a generated asset
fn build_signed(
    registry: &Registry,
    seed: [u8; 32],
    timestamp: u32,
    amount: u64,
    recipient: Option<u64>,
    asset: Asset,
    with_requester: bool,
    with_second: bool,
) -> Transaction {
    let keypair = KeyPair::from_seed(&seed);
    let mut requester_seed = seed;
    requester_seed[31] = requester_seed[31].wrapping_add(1);
    let requester = KeyPair::from_seed(&requester_seed);

    let mut tx = Transaction {
        tx_type: type_for_asset(&asset),
        timestamp,
        sender_public_key: keypair.public_key(),
        requester_public_key: with_requester.then(|| requester.public_key()),
        sender_id: keypair.address(),
        recipient_id: recipient.map(Address::from_numeric),
        amount,
        fee: 0,
        signature: Signature::zero(),
        sign_signature: None,
        id: TransactionId::new(""),
        asset,
        block_id: None,
        relays: 0,
    };

    let unsigned = codec::to_bytes(registry, &tx, true, true).unwrap();
    tx.signature = keypair.sign(&unsigned);
    if with_second {
        let once_signed = codec::to_bytes(registry, &tx, false, true).unwrap();
        tx.sign_signature = Some(requester.sign(&once_signed));
    }
    tx.id = codec::transaction_id(registry, &tx).unwrap();
    tx
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: every kind round-trips through the wire layout, over all
    /// optional-section combinations
    #[test]
    fn prop_round_trip_all_kinds(
        seed in prop::array::uniform32(any::<u8>()),
        timestamp in 0u32..=u32::MAX,
        amount in 0u64..10_000_000_000_000_000,
        recipient in prop::option::of(1u64..=u64::MAX),
        asset in asset_strategy(),
        with_requester in any::<bool>(),
        with_second in any::<bool>(),
    ) {
        let registry = registry();
        let tx = build_signed(
            &registry, seed, timestamp, amount, recipient, asset,
            with_requester, with_second,
        );

        let bytes = codec::to_bytes(&registry, &tx, false, false).unwrap();
        let decoded = codec::from_bytes(
            &registry,
            &bytes,
            tx.requester_public_key.is_some(),
            tx.sign_signature.is_some(),
        ).unwrap();

        prop_assert_eq!(decoded, tx);
    }

    /// Property: the id is a pure function of the signed bytes
    #[test]
    fn prop_id_deterministic(
        seed in prop::array::uniform32(any::<u8>()),
        timestamp in 0u32..=u32::MAX,
        amount in 0u64..1_000_000_000,
        asset in asset_strategy(),
    ) {
        let registry = registry();
        let tx = build_signed(&registry, seed, timestamp, amount, Some(7), asset, false, false);

        let id1 = codec::transaction_id(&registry, &tx).unwrap();
        let id2 = codec::transaction_id(&registry, &tx).unwrap();
        prop_assert_eq!(&id1, &id2);
        prop_assert_eq!(id1, tx.id);
    }

    /// Property: flipping any single byte either fails to decode or fails
    /// full verification on the id or signature check
    #[test]
    fn prop_single_byte_corruption_detected(
        seed in prop::array::uniform32(any::<u8>()),
        // Past timestamps only; the timestamp check must never fire first
        timestamp in 0u32..1_000_000,
        amount in 0u64..1_000_000_000,
        asset in asset_strategy(),
        position in any::<prop::sample::Index>(),
        flip in 1u8..=255,
    ) {
        let config = ChainConfig::default();
        let logic = TransactionLogic::new(
            Registry::standard(&config),
            Arc::new(NoopHooks),
            config,
        );
        let registry = registry();
        let tx = build_signed(&registry, seed, timestamp, amount, Some(7), asset, false, false);

        let mut bytes = codec::to_bytes(&registry, &tx, false, false).unwrap();
        let index = position.index(bytes.len());
        bytes[index] ^= flip;

        match codec::from_bytes(&registry, &bytes, false, false) {
            Err(_) => {}
            Ok(mut decoded) => {
                prop_assert_ne!(&decoded, &tx);

                // Present the corrupted payload under the original claimed
                // id, with a sender account consistent with the decoded
                // key, so only the id and signature checks can object
                decoded.id = tx.id.clone();
                let sender = Account::with_balance(
                    decoded.sender_id.clone(),
                    decoded.sender_public_key,
                    u64::MAX,
                );

                let runtime = tokio::runtime::Builder::new_current_thread()
                    .build()
                    .unwrap();
                let err = runtime
                    .block_on(logic.verify(&decoded, &sender, None, 1))
                    .unwrap_err();
                prop_assert!(
                    matches!(err, Error::InvalidId { .. } | Error::InvalidSignature),
                    "unexpected error: {:?}",
                    err
                );
            }
        }
    }

    /// Property: the signed range excludes exactly the signature sections
    #[test]
    fn prop_signed_range_is_prefix(
        seed in prop::array::uniform32(any::<u8>()),
        timestamp in 0u32..=u32::MAX,
        asset in asset_strategy(),
        with_second in any::<bool>(),
    ) {
        let registry = registry();
        let tx = build_signed(&registry, seed, timestamp, 10, Some(7), asset, false, with_second);

        let unsigned = codec::to_bytes(&registry, &tx, true, true).unwrap();
        let once_signed = codec::to_bytes(&registry, &tx, false, true).unwrap();
        let full = codec::to_bytes(&registry, &tx, false, false).unwrap();

        prop_assert_eq!(&full[..unsigned.len()], &unsigned[..]);
        prop_assert_eq!(&full[..once_signed.len()], &once_signed[..]);
        prop_assert_eq!(once_signed.len(), unsigned.len() + 64);
        let second_len = if tx.sign_signature.is_some() { 64 } else { 0 };
        prop_assert_eq!(full.len(), once_signed.len() + second_len);
    }
}
