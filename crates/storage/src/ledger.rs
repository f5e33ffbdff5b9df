//! The key/value ledger boundary and its in-memory implementation.

use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared key/value ledger.
///
/// Only `get` and `set` are guaranteed. Concurrent `set`s on one key race and
/// the last writer wins. Backends that can do better advertise it through
/// [`KeyValueLedger::supports_compare_and_set`].
#[async_trait]
pub trait KeyValueLedger: Send + Sync {
    /// Fetch the raw value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Overwrite the value stored under `key`.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    fn supports_compare_and_set(&self) -> bool {
        false
    }

    /// Store `value` only if the current value equals `expected`
    /// (`None` meaning the key is absent). Returns whether the swap happened.
    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
    ) -> Result<bool> {
        let _ = (key, expected, value);
        Err(LedgerError::CompareAndSetUnsupported)
    }
}

/// In-memory ledger (for testing and single-process deployments).
#[derive(Clone)]
pub struct MemoryLedger {
    entries: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    compare_and_set: bool,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            compare_and_set: true,
        }
    }

    /// Plain get/set ledger with no compare-and-set, like the deployed
    /// ledger service.
    pub fn without_compare_and_set() -> Self {
        Self {
            compare_and_set: false,
            ..Self::new()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueLedger for MemoryLedger {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    fn supports_compare_and_set(&self) -> bool {
        self.compare_and_set
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
    ) -> Result<bool> {
        if !self.compare_and_set {
            return Err(LedgerError::CompareAndSetUnsupported);
        }
        let mut entries = self.entries.write();
        if entries.get(key).map(Vec::as_slice) != expected {
            return Ok(false);
        }
        entries.insert(key.to_string(), value);
        Ok(true)
    }
}
