use crate::error::Result;
use crate::ledger::KeyValueLedger;
use async_trait::async_trait;
use sled::{Db, Tree};
use std::path::Path;

/// Sled-backed ledger.
///
/// Values live in a dedicated tree so the database can be shared with other
/// local state. Sled offers native compare-and-swap, which makes concurrent
/// writers from separate processes on one host safe.
pub struct SledLedger {
    db: Db,
    entries: Tree,
}

impl SledLedger {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        let entries = db.open_tree("ledger")?;
        Ok(Self { db, entries })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueLedger for SledLedger {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.entries.insert(key.as_bytes(), value)?;
        Ok(())
    }

    fn supports_compare_and_set(&self) -> bool {
        true
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
    ) -> Result<bool> {
        let swapped = self
            .entries
            .compare_and_swap(key.as_bytes(), expected, Some(value))?;
        Ok(swapped.is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let ledger = SledLedger::open(dir.path()).unwrap();
            ledger.set("p1", br#"{"cid1":{}}"#.to_vec()).await.unwrap();
            ledger.flush().unwrap();
        }

        let ledger = SledLedger::open(dir.path()).unwrap();
        assert_eq!(
            ledger.get("p1").await.unwrap(),
            Some(br#"{"cid1":{}}"#.to_vec())
        );
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_native_compare_and_set() {
        let dir = TempDir::new().unwrap();
        let ledger = SledLedger::open(dir.path()).unwrap();

        assert!(ledger.compare_and_set("k", None, b"a".to_vec()).await.unwrap());
        assert!(!ledger
            .compare_and_set("k", Some(b"stale"), b"b".to_vec())
            .await
            .unwrap());
        assert!(ledger
            .compare_and_set("k", Some(b"a"), b"b".to_vec())
            .await
            .unwrap());
        assert_eq!(ledger.get("k").await.unwrap(), Some(b"b".to_vec()));
    }
}
