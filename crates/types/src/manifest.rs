//! Owner manifests: the files a peer has published.

use crate::{ContentId, LedgerValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata recorded for one published file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Base name of the uploaded file.
    #[serde(rename = "file_name")]
    pub name: String,

    /// File size in bytes.
    #[serde(rename = "file_size")]
    pub size_bytes: u64,
}

impl FileRecord {
    pub fn new(name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            size_bytes,
        }
    }
}

/// Content id -> file record, owned by exactly one peer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerManifest {
    files: BTreeMap<ContentId, FileRecord>,
}

impl OwnerManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the record for `cid`, returning the previous one.
    pub fn insert(&mut self, cid: ContentId, record: FileRecord) -> Option<FileRecord> {
        self.files.insert(cid, record)
    }

    pub fn get(&self, cid: &ContentId) -> Option<&FileRecord> {
        self.files.get(cid)
    }

    pub fn contains(&self, cid: &ContentId) -> bool {
        self.files.contains_key(cid)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ContentId, &FileRecord)> {
        self.files.iter()
    }

    pub fn content_ids(&self) -> impl Iterator<Item = &ContentId> {
        self.files.keys()
    }

    /// Total bytes across all records.
    pub fn total_size(&self) -> u64 {
        self.files
            .values()
            .fold(0u64, |acc, r| acc.saturating_add(r.size_bytes))
    }
}

impl FromIterator<(ContentId, FileRecord)> for OwnerManifest {
    fn from_iter<I: IntoIterator<Item = (ContentId, FileRecord)>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

impl LedgerValue for OwnerManifest {
    fn decode_from(_key: &str, bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    fn encode_for(&self, _key: &str) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    fn is_vacant(&self) -> bool {
        self.files.is_empty()
    }
}
