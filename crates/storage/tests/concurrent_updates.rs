//! Read-modify-write behaviour of the ledger client under concurrency,
//! transient failures and slow round-trips.

use async_trait::async_trait;
use peerfs_storage::{
    Decoded, KeyValueLedger, LedgerClient, LedgerError, MemoryLedger, Mutation, RetryPolicy,
};
use peerfs_types::{DeletionRecord, LedgerValue, PeerId};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Yields to the scheduler inside every call so concurrent read-modify-write
/// sequences interleave.
struct YieldingLedger(MemoryLedger);

#[async_trait]
impl KeyValueLedger for YieldingLedger {
    async fn get(&self, key: &str) -> peerfs_storage::Result<Option<Vec<u8>>> {
        tokio::task::yield_now().await;
        self.0.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> peerfs_storage::Result<()> {
        tokio::task::yield_now().await;
        self.0.set(key, value).await
    }

    fn supports_compare_and_set(&self) -> bool {
        self.0.supports_compare_and_set()
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
    ) -> peerfs_storage::Result<bool> {
        tokio::task::yield_now().await;
        self.0.compare_and_set(key, expected, value).await
    }
}

/// Fails the first `failures` calls with a transient error.
struct FlakyLedger {
    inner: MemoryLedger,
    failures: u32,
    calls: AtomicU32,
}

impl FlakyLedger {
    fn check(&self) -> peerfs_storage::Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(LedgerError::Unavailable(format!("injected failure {call}")));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueLedger for FlakyLedger {
    async fn get(&self, key: &str) -> peerfs_storage::Result<Option<Vec<u8>>> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> peerfs_storage::Result<()> {
        self.check()?;
        self.inner.set(key, value).await
    }
}

/// Never answers within a reasonable deadline.
struct StalledLedger;

#[async_trait]
impl KeyValueLedger for StalledLedger {
    async fn get(&self, _key: &str) -> peerfs_storage::Result<Option<Vec<u8>>> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Vec<u8>) -> peerfs_storage::Result<()> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(())
    }
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        attempts: 3,
        round_trip_timeout: Duration::from_millis(50),
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        cas_attempts: 64,
    }
}

async fn register(client: &LedgerClient, key: &str, peer: PeerId) {
    client
        .update(key, move |current: Decoded<DeletionRecord>| {
            let mut record = current.unwrap_or_default();
            record.register(peer.clone());
            Mutation::Write(record, ())
        })
        .await
        .unwrap();
}

async fn stored_record(ledger: &dyn KeyValueLedger, key: &str) -> DeletionRecord {
    let raw = ledger.get(key).await.unwrap().unwrap();
    DeletionRecord::decode_from(key, &raw).unwrap()
}

#[tokio::test]
async fn test_unguarded_read_modify_write_loses_updates() {
    // Two writers read the same prior value and both write back: the
    // first writer's vote disappears. This is the hazard LedgerClient guards.
    let ledger = MemoryLedger::without_compare_and_set();
    let empty = DeletionRecord::new();

    let mut first = empty.clone();
    first.register(PeerId::new("p1"));
    let mut second = empty;
    second.register(PeerId::new("p2"));

    ledger.set("cid1", first.encode_for("cid1").unwrap()).await.unwrap();
    ledger.set("cid1", second.encode_for("cid1").unwrap()).await.unwrap();

    let record = stored_record(&ledger, "cid1").await;
    assert!(!record.is_member(&PeerId::new("p1")));
    assert!(record.is_member(&PeerId::new("p2")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_key_lock_prevents_lost_updates_without_compare_and_set() {
    let ledger = Arc::new(YieldingLedger(MemoryLedger::without_compare_and_set()));
    let client = LedgerClient::with_policy(ledger.clone(), fast_policy());

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move { register(&client, "cid1", PeerId::new(format!("p{i}"))).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let record = stored_record(ledger.as_ref(), "cid1").await;
    assert_eq!(record.len(), 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_compare_and_set_protects_independent_clients() {
    // Separate clients share no locks, like two processes on one ledger.
    let ledger = Arc::new(YieldingLedger(MemoryLedger::new()));
    let left = LedgerClient::with_policy(ledger.clone(), fast_policy());
    let right = LedgerClient::with_policy(ledger.clone(), fast_policy());

    let mut tasks = Vec::new();
    for i in 0..8 {
        let left = left.clone();
        let right = right.clone();
        tasks.push(tokio::spawn(async move {
            register(&left, "cid1", PeerId::new(format!("left-{i}"))).await
        }));
        tasks.push(tokio::spawn(async move {
            register(&right, "cid1", PeerId::new(format!("right-{i}"))).await
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let record = stored_record(ledger.as_ref(), "cid1").await;
    assert_eq!(record.len(), 16);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let ledger = Arc::new(FlakyLedger {
        inner: MemoryLedger::new(),
        failures: 2,
        calls: AtomicU32::new(0),
    });
    let client = LedgerClient::with_policy(ledger.clone(), fast_policy());

    let decoded = client.read::<DeletionRecord>("cid1").await.unwrap();
    assert!(decoded.value().is_none());
    assert_eq!(ledger.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let ledger = Arc::new(FlakyLedger {
        inner: MemoryLedger::new(),
        failures: 10,
        calls: AtomicU32::new(0),
    });
    let client = LedgerClient::with_policy(ledger.clone(), fast_policy());

    let err = client
        .update("cid1", |_: Decoded<DeletionRecord>| {
            Mutation::Write(DeletionRecord::with_voter(PeerId::new("p1")), ())
        })
        .await
        .unwrap_err();
    assert!(err.is_read());
    assert!(err.is_transient());
    match err {
        LedgerError::Read { key, source } => {
            assert_eq!(key, "cid1");
            assert!(matches!(*source, LedgerError::Unavailable(_)));
        }
        other => panic!("expected a read failure, got {other:?}"),
    }
    assert_eq!(ledger.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_held_key_blocks_other_updates() {
    let ledger = Arc::new(MemoryLedger::new());
    let client = LedgerClient::new(ledger.clone());
    let guard = client.hold("cid1").await;

    let contender = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .update("cid1", |current: Decoded<DeletionRecord>| {
                    let mut record = current.unwrap_or_default();
                    record.register(PeerId::new("p2"));
                    Mutation::Write(record, ())
                })
                .await
        })
    };

    client
        .update_held(&guard, |current: Decoded<DeletionRecord>| {
            let mut record = current.unwrap_or_default();
            record.register(PeerId::new("p1"));
            Mutation::Write(record, ())
        })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!contender.is_finished());
    let held: DeletionRecord = client.read("cid1").await.unwrap().unwrap_or_default();
    assert_eq!(held.len(), 1);

    drop(guard);
    contender.await.unwrap().unwrap();
    let record: DeletionRecord = client.read("cid1").await.unwrap().unwrap_or_default();
    assert_eq!(record.len(), 2);
}

#[tokio::test]
async fn test_round_trip_timeout() {
    let client = LedgerClient::with_policy(Arc::new(StalledLedger), fast_policy());

    let err = client.read::<DeletionRecord>("cid1").await.unwrap_err();
    assert!(matches!(err, LedgerError::Timeout { .. }));
    assert!(err.is_transient());
}
