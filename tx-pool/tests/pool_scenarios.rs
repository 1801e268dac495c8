//! End-to-end pool manager scenarios against an in-memory chain backend

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tx_core::crypto::KeyPair;
use tx_core::{
    Account, Address, Asset, ChainBackend, ChainConfig, Hooks, NoopHooks, PublicKey, Registry,
    Sequence, Signature, Transaction, TransactionId, TransactionLogic, TransactionType,
};
use tx_pool::{Broadcast, PoolConfig, PoolManager, PoolPayload, Stage, TransactionPool};

#[derive(Default)]
struct MockBackend {
    accounts: Mutex<HashMap<PublicKey, Account>>,
    confirmed: Mutex<HashSet<TransactionId>>,
}

impl MockBackend {
    fn insert_account(&self, account: Account) {
        if let Some(key) = account.public_key {
            self.accounts.lock().insert(key, account);
        }
    }
}

#[async_trait]
impl ChainBackend for MockBackend {
    async fn account(&self, address: &Address) -> tx_core::Result<Option<Account>> {
        Ok(self
            .accounts
            .lock()
            .values()
            .find(|account| &account.address == address)
            .cloned())
    }

    async fn account_by_public_key(
        &self,
        public_key: &PublicKey,
    ) -> tx_core::Result<Option<Account>> {
        Ok(self.accounts.lock().get(public_key).cloned())
    }

    async fn filter_confirmed_ids(
        &self,
        ids: &[TransactionId],
    ) -> tx_core::Result<Vec<TransactionId>> {
        let confirmed = self.confirmed.lock();
        Ok(ids.iter().filter(|id| confirmed.contains(id)).cloned().collect())
    }

    async fn height(&self) -> tx_core::Result<u64> {
        Ok(100)
    }
}

#[derive(Default)]
struct RecordingBroadcast {
    sent: Mutex<Vec<Transaction>>,
}

#[async_trait]
impl Broadcast for RecordingBroadcast {
    async fn enqueue(&self, txs: Vec<Transaction>) {
        self.sent.lock().extend(txs);
    }
}

struct Harness {
    manager: PoolManager,
    backend: Arc<MockBackend>,
    broadcast: Arc<RecordingBroadcast>,
    logic: Arc<TransactionLogic>,
}

fn harness() -> Harness {
    harness_with(|_| {})
}

fn harness_with(tune: impl FnOnce(&mut ChainConfig)) -> Harness {
    harness_tuned(tune, PoolConfig::default(), Arc::new(NoopHooks))
}

fn harness_tuned(
    tune: impl FnOnce(&mut ChainConfig),
    pool_config: PoolConfig,
    hooks: Arc<dyn Hooks>,
) -> Harness {
    let mut config = ChainConfig::default();
    config.fees.transfer = 10;
    tune(&mut config);

    let logic = Arc::new(TransactionLogic::new(
        Registry::standard(&config),
        Arc::clone(&hooks),
        config,
    ));
    let backend = Arc::new(MockBackend::default());
    let broadcast = Arc::new(RecordingBroadcast::default());
    let manager = PoolManager::new(
        Arc::new(RwLock::new(TransactionPool::new())),
        Arc::clone(&logic),
        backend.clone(),
        hooks,
        broadcast.clone(),
        Sequence::spawn("test-balances"),
        pool_config,
    );

    Harness {
        manager,
        backend,
        broadcast,
        logic,
    }
}

fn funded_sender(harness: &Harness, seed: u8, balance: u64) -> KeyPair {
    let keypair = KeyPair::from_seed(&[seed; 32]);
    harness.backend.insert_account(Account::with_balance(
        keypair.address(),
        keypair.public_key(),
        balance,
    ));
    keypair
}

fn signed_transfer(harness: &Harness, keypair: &KeyPair, amount: u64, recipient: u64) -> Transaction {
    let logic = &harness.logic;
    let mut tx = Transaction {
        tx_type: TransactionType::Transfer,
        timestamp: logic.config().now_timestamp(),
        sender_public_key: keypair.public_key(),
        requester_public_key: None,
        sender_id: keypair.address(),
        recipient_id: Some(Address::from_numeric(recipient)),
        amount,
        fee: logic.config().fees.transfer,
        signature: Signature::zero(),
        sign_signature: None,
        id: TransactionId::new("0"),
        asset: Asset::Transfer,
        block_id: None,
        relays: 0,
    };
    logic.sign(keypair, &mut tx).unwrap();
    tx
}

#[tokio::test]
async fn test_valid_transfer_reaches_unconfirmed_in_one_tick() {
    let harness = harness();
    let keypair = funded_sender(&harness, 1, 1_000);
    let tx = signed_transfer(&harness, &keypair, 500, 99);
    let id = tx.id.clone();

    let admitted = harness.manager.enqueue(vec![tx]).await.unwrap();
    assert_eq!(admitted, 1);
    assert_eq!(
        harness.manager.pool().read().what_queue(&id),
        Some(Stage::Queued)
    );

    harness.manager.tick().await.unwrap();

    assert_eq!(
        harness.manager.pool().read().what_queue(&id),
        Some(Stage::Unconfirmed)
    );
    let sent = harness.broadcast.sent.lock();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].id, id);
}

#[tokio::test]
async fn test_insufficient_balance_is_dropped_not_requeued() {
    let harness = harness();
    let keypair = funded_sender(&harness, 2, 100);
    // amount 500 + fee 10 against balance 100
    let tx = signed_transfer(&harness, &keypair, 500, 99);
    let id = tx.id.clone();

    harness.manager.enqueue(vec![tx]).await.unwrap();
    harness.manager.tick().await.unwrap();

    assert_eq!(harness.manager.pool().read().what_queue(&id), None);
    assert!(harness.broadcast.sent.lock().is_empty());
}

#[tokio::test]
async fn test_unknown_sender_is_dropped() {
    let harness = harness();
    // Keypair never registered with the backend
    let keypair = KeyPair::from_seed(&[3u8; 32]);
    let tx = signed_transfer(&harness, &keypair, 500, 99);
    let id = tx.id.clone();

    harness.manager.enqueue(vec![tx]).await.unwrap();
    harness.manager.tick().await.unwrap();

    assert_eq!(harness.manager.pool().read().what_queue(&id), None);
}

#[tokio::test]
async fn test_expired_transactions_are_removed() {
    let harness = harness();
    let keypair = funded_sender(&harness, 4, 1_000);
    let fresh = signed_transfer(&harness, &keypair, 10, 90);
    let aged = signed_transfer(&harness, &keypair, 20, 91);
    let fresh_id = fresh.id.clone();
    let aged_id = aged.id.clone();

    {
        let pool = harness.manager.pool();
        let mut pool = pool.write();
        pool.add(Stage::Pending, fresh, PoolPayload::new(false)).unwrap();
        // Older than the 10 800 second default lifetime
        pool.add(
            Stage::Pending,
            aged,
            PoolPayload {
                received_at: Utc::now() - Duration::hours(4),
                ready: false,
            },
        )
        .unwrap();
    }

    harness.manager.tick().await.unwrap();

    let pool = harness.manager.pool();
    let pool = pool.read();
    assert_eq!(pool.what_queue(&aged_id), None);
    assert!(pool.what_queue(&fresh_id).is_some());
}

#[tokio::test]
async fn test_already_confirmed_ready_transactions_are_purged() {
    let harness = harness();
    let keypair = funded_sender(&harness, 5, 1_000);
    let tx = signed_transfer(&harness, &keypair, 100, 99);
    let id = tx.id.clone();
    harness.backend.confirmed.lock().insert(id.clone());

    harness
        .manager
        .pool()
        .write()
        .add(Stage::Ready, tx, PoolPayload::new(true))
        .unwrap();

    harness.manager.tick().await.unwrap();

    assert_eq!(harness.manager.pool().read().what_queue(&id), None);
    assert!(harness.broadcast.sent.lock().is_empty());
}

#[tokio::test]
async fn test_unconfirmed_budget_is_respected() {
    let harness = harness_with(|config| config.max_txs_per_block = 2);
    let keypair = funded_sender(&harness, 6, 1_000_000);

    let txs: Vec<Transaction> = (0..3)
        .map(|i| signed_transfer(&harness, &keypair, 100 + i, 99))
        .collect();
    harness.manager.enqueue(txs).await.unwrap();

    harness.manager.tick().await.unwrap();

    let pool = harness.manager.pool();
    let pool = pool.read();
    assert_eq!(pool.count(Stage::Unconfirmed), 2);
    // The third stays verified and waits for budget
    assert_eq!(pool.count(Stage::Ready), 1);
}

#[tokio::test]
async fn test_concurrent_enqueue_admits_each_id_once() {
    let harness = harness();
    let keypair = funded_sender(&harness, 7, 1_000_000);

    let txs: Vec<Transaction> = (0..5)
        .map(|i| signed_transfer(&harness, &keypair, 100 + i, 99))
        .collect();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = harness.manager.clone();
        let txs = txs.clone();
        handles.push(tokio::spawn(async move { manager.enqueue(txs).await }));
    }
    let mut total_admitted = 0;
    for handle in handles {
        total_admitted += handle.await.unwrap().unwrap();
    }

    assert_eq!(total_admitted, 5);
    let pool = harness.manager.pool();
    let pool = pool.read();
    assert_eq!(pool.count(Stage::Queued), 5);
    for tx in &txs {
        let occupied = Stage::PROBE_ORDER
            .into_iter()
            .filter(|stage| pool.has(*stage, &tx.id))
            .count();
        assert_eq!(occupied, 1);
    }
}

/// Readiness gate keyed by transaction id, closed by default
#[derive(Default)]
struct GatedHooks {
    open: Mutex<HashSet<TransactionId>>,
}

#[async_trait]
impl Hooks for GatedHooks {
    async fn transaction_ready(
        &self,
        _ready: bool,
        tx: &Transaction,
        _sender: &Account,
    ) -> anyhow::Result<bool> {
        Ok(self.open.lock().contains(&tx.id))
    }
}

#[tokio::test]
async fn test_every_pending_entry_is_rescanned_each_tick() {
    let gate = Arc::new(GatedHooks::default());
    let harness = harness_tuned(
        |_| {},
        PoolConfig {
            release_limit: 1,
            ..PoolConfig::default()
        },
        gate.clone(),
    );
    let keypair = funded_sender(&harness, 9, 1_000_000);

    let txs: Vec<Transaction> = (0..3)
        .map(|i| signed_transfer(&harness, &keypair, 100 + i, 99))
        .collect();
    // Queued admission walks newest first, so the first transaction lands
    // at the tail of the pending stage
    let tail_id = txs[0].id.clone();

    harness.manager.enqueue(txs).await.unwrap();
    harness.manager.tick().await.unwrap();
    assert_eq!(harness.manager.pool().read().count(Stage::Pending), 3);

    gate.open.lock().insert(tail_id.clone());
    harness.manager.tick().await.unwrap();

    let pool = harness.manager.pool();
    let pool = pool.read();
    // The tail entry must not be starved by entries ahead of it
    assert_eq!(pool.what_queue(&tail_id), Some(Stage::Unconfirmed));
    assert_eq!(pool.count(Stage::Pending), 2);
}

#[tokio::test]
async fn test_unconfirmed_spend_tracks_across_batch() {
    // Two transactions that individually fit the balance but not together
    let harness = harness();
    let keypair = funded_sender(&harness, 8, 700);

    let first = signed_transfer(&harness, &keypair, 500, 99);
    let second = signed_transfer(&harness, &keypair, 400, 98);
    let (first_id, second_id) = (first.id.clone(), second.id.clone());

    harness.manager.enqueue(vec![first, second]).await.unwrap();
    harness.manager.tick().await.unwrap();

    let pool = harness.manager.pool();
    let pool = pool.read();
    // Exactly one of the two can be applied; verification of the other
    // against the confirmed balance passes, so it fails only at the
    // unconfirmed application step and is requeued
    let applied = [&first_id, &second_id]
        .iter()
        .filter(|id| pool.what_queue(id) == Some(Stage::Unconfirmed))
        .count();
    let requeued = [&first_id, &second_id]
        .iter()
        .filter(|id| pool.what_queue(id) == Some(Stage::Queued))
        .count();
    assert_eq!(applied, 1);
    assert_eq!(requeued, 1);
}
