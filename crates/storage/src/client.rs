//! Typed access to the shared ledger.
//!
//! [`LedgerClient`] wraps a [`KeyValueLedger`] with:
//! - a decode step that separates absent, cleared and corrupt payloads,
//! - a per-call timeout with bounded, jittered retries on transient errors,
//! - per-key serialization of read-modify-write sequences, upgraded to
//!   compare-and-set when the backend supports it.

use crate::error::{LedgerError, Result};
use crate::ledger::KeyValueLedger;
use crate::locks::KeyLocks;
use crate::retry::{compute_backoff, RetryPolicy};
use peerfs_types::LedgerValue;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};

/// Why a ledger read produced no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmptyReason {
    /// Nothing stored under the key.
    Absent,
    /// A payload decoded to an empty structure.
    Cleared,
    /// The payload could not be decoded.
    Corrupt(String),
}

/// Result of decoding a ledger payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<T> {
    Value(T),
    Empty(EmptyReason),
}

impl<T: LedgerValue> Decoded<T> {
    pub fn decode(key: &str, bytes: Option<&[u8]>) -> Self {
        let Some(bytes) = bytes else {
            return Decoded::Empty(EmptyReason::Absent);
        };
        match T::decode_from(key, bytes) {
            Ok(value) if value.is_vacant() => Decoded::Empty(EmptyReason::Cleared),
            Ok(value) => Decoded::Value(value),
            Err(err) => Decoded::Empty(EmptyReason::Corrupt(err.to_string())),
        }
    }
}

impl<T> Decoded<T> {
    pub fn value(self) -> Option<T> {
        match self {
            Decoded::Value(value) => Some(value),
            Decoded::Empty(_) => None,
        }
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, Decoded::Empty(EmptyReason::Corrupt(_)))
    }

    pub fn unwrap_or_default(self) -> T
    where
        T: Default,
    {
        self.value().unwrap_or_default()
    }
}

/// Outcome of one read-modify-write pass.
#[derive(Debug)]
pub enum Mutation<T, R> {
    /// Persist `T` and return `R`.
    Write(T, R),
    /// Leave the ledger untouched and return `R`.
    Keep(R),
}

/// Exclusive hold on one ledger key, released on drop.
pub struct KeyGuard {
    key: String,
    _slot: OwnedMutexGuard<()>,
}

impl KeyGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Shared ledger access helper. Cheap to clone; clones share locks.
#[derive(Clone)]
pub struct LedgerClient {
    ledger: Arc<dyn KeyValueLedger>,
    locks: KeyLocks,
    policy: RetryPolicy,
}

impl LedgerClient {
    pub fn new(ledger: Arc<dyn KeyValueLedger>) -> Self {
        Self::with_policy(ledger, RetryPolicy::default())
    }

    pub fn with_policy(ledger: Arc<dyn KeyValueLedger>, policy: RetryPolicy) -> Self {
        Self {
            ledger,
            locks: KeyLocks::new(),
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn locks(&self) -> &KeyLocks {
        &self.locks
    }

    /// Read and decode the value under `key`.
    ///
    /// Corrupt payloads are logged and reported as [`Decoded::Empty`]; only
    /// transport failures surface as errors.
    pub async fn read<T: LedgerValue>(&self, key: &str) -> Result<Decoded<T>> {
        let raw = self.get_raw(key).await?;
        Ok(self.decode(key, raw.as_deref()))
    }

    /// Take exclusive in-process access to `key` until the guard drops.
    ///
    /// Use with [`LedgerClient::update_held`] to keep other writers of the key
    /// out across several steps. Only this client and its clones honour it.
    pub async fn hold(&self, key: &str) -> KeyGuard {
        KeyGuard {
            key: key.to_string(),
            _slot: self.locks.lock(key).await,
        }
    }

    /// Read-modify-write `key` under its lock.
    ///
    /// `apply` may run more than once when a compare-and-set loses a race, so
    /// it must be a pure function of the decoded value. A failed read surfaces
    /// as [`LedgerError::Read`].
    pub async fn update<T, R, F>(&self, key: &str, apply: F) -> Result<R>
    where
        T: LedgerValue + Send,
        R: Send,
        F: FnMut(Decoded<T>) -> Mutation<T, R> + Send,
    {
        let guard = self.hold(key).await;
        self.update_held(&guard, apply).await
    }

    /// [`LedgerClient::update`] for a key the caller already holds.
    pub async fn update_held<T, R, F>(&self, guard: &KeyGuard, mut apply: F) -> Result<R>
    where
        T: LedgerValue + Send,
        R: Send,
        F: FnMut(Decoded<T>) -> Mutation<T, R> + Send,
    {
        let key = guard.key();
        let use_cas = self.ledger.supports_compare_and_set();
        let max_passes = self.policy.cas_attempts.max(1);
        let mut backoff_ms = duration_ms(self.policy.initial_backoff);
        let mut pass = 0u32;

        loop {
            pass += 1;
            let raw = self.get_raw(key).await.map_err(|source| LedgerError::Read {
                key: key.to_string(),
                source: Box::new(source),
            })?;
            let current = self.decode::<T>(key, raw.as_deref());

            let (next, output) = match apply(current) {
                Mutation::Keep(output) => return Ok(output),
                Mutation::Write(next, output) => (next, output),
            };
            let bytes = next.encode_for(key)?;

            if !use_cas {
                self.set_raw(key, bytes).await?;
                return Ok(output);
            }
            if self.compare_and_set_raw(key, raw.as_deref(), bytes).await? {
                return Ok(output);
            }
            if pass >= max_passes {
                return Err(LedgerError::Contended {
                    key: key.to_string(),
                    attempts: pass,
                });
            }

            let step = compute_backoff(
                backoff_ms,
                duration_ms(self.policy.max_backoff),
                rand::random(),
            );
            debug!(key, pass, sleep_ms = step.sleep_ms, "compare-and-set lost a race, re-reading");
            tokio::time::sleep(Duration::from_millis(step.sleep_ms)).await;
            backoff_ms = step.next_backoff_ms;
        }
    }

    fn decode<T: LedgerValue>(&self, key: &str, bytes: Option<&[u8]>) -> Decoded<T> {
        let decoded = Decoded::decode(key, bytes);
        match &decoded {
            Decoded::Empty(EmptyReason::Corrupt(reason)) => {
                warn!(key, %reason, "ledger payload is corrupt, treating it as empty");
            }
            Decoded::Empty(EmptyReason::Absent) => debug!(key, "ledger key is absent"),
            Decoded::Empty(EmptyReason::Cleared) => debug!(key, "ledger value is cleared"),
            Decoded::Value(_) => {}
        }
        decoded
    }

    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.round_trip("get", key, || self.ledger.get(key)).await
    }

    async fn set_raw(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.round_trip("set", key, || self.ledger.set(key, bytes.clone()))
            .await
    }

    async fn compare_and_set_raw(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        bytes: Vec<u8>,
    ) -> Result<bool> {
        self.round_trip("compare_and_set", key, || {
            self.ledger.compare_and_set(key, expected, bytes.clone())
        })
        .await
    }

    async fn round_trip<T, F, Fut>(&self, op: &'static str, key: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.policy.attempts.max(1);
        let timeout = self.policy.round_trip_timeout;
        let mut backoff_ms = duration_ms(self.policy.initial_backoff);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let result = match tokio::time::timeout(timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(LedgerError::Timeout {
                    key: key.to_string(),
                    timeout,
                }),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < attempts => {
                    let step = compute_backoff(
                        backoff_ms,
                        duration_ms(self.policy.max_backoff),
                        rand::random(),
                    );
                    warn!(
                        op,
                        key,
                        attempt,
                        error = %err,
                        sleep_ms = step.sleep_ms,
                        "transient ledger failure, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(step.sleep_ms)).await;
                    backoff_ms = step.next_backoff_ms;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
