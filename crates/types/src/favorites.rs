//! Favorites: nicknamed remote peers, one list per local identity.

use crate::{LedgerValue, PeerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteEntry {
    /// Local nickname chosen by the owner of the list.
    pub nickname: String,
    /// Name the remote peer advertises for itself.
    pub peer_name: String,
}

/// Peer -> favorite entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FavoritesList {
    entries: BTreeMap<PeerId, FavoriteEntry>,
}

impl FavoritesList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `peer`.
    pub fn upsert(&mut self, peer: PeerId, entry: FavoriteEntry) -> Option<FavoriteEntry> {
        self.entries.insert(peer, entry)
    }

    /// Change the nickname of an existing entry. Returns `false` if absent.
    pub fn rename(&mut self, peer: &PeerId, nickname: impl Into<String>) -> bool {
        match self.entries.get_mut(peer) {
            Some(entry) => {
                entry.nickname = nickname.into();
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, peer: &PeerId) -> Option<FavoriteEntry> {
        self.entries.remove(peer)
    }

    pub fn get(&self, peer: &PeerId) -> Option<&FavoriteEntry> {
        self.entries.get(peer)
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        self.entries.contains_key(peer)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PeerId, &FavoriteEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl LedgerValue for FavoritesList {
    fn decode_from(_key: &str, bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    fn encode_for(&self, _key: &str) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    fn is_vacant(&self) -> bool {
        self.entries.is_empty()
    }
}
