//! Per-peer manifests of published content.

use crate::error::{FilesError, Result};
use peerfs_storage::{Decoded, LedgerClient, Mutation};
use peerfs_types::{ContentId, FileRecord, LedgerKey, OwnerManifest, PeerId};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Owner manifests stored under each peer's ledger key.
#[derive(Clone)]
pub struct OwnerRegistry {
    ledger: LedgerClient,
}

impl OwnerRegistry {
    pub fn new(ledger: LedgerClient) -> Self {
        Self { ledger }
    }

    /// Insert or overwrite `record` at `cid` in `peer`'s manifest.
    ///
    /// An absent or corrupt manifest is replaced by one holding only this
    /// record. Returns the record previously stored at `cid`. The caller is
    /// responsible for registering the matching deletion vote.
    pub async fn publish(
        &self,
        peer: &PeerId,
        cid: ContentId,
        record: FileRecord,
    ) -> Result<Option<FileRecord>> {
        let key = LedgerKey::Manifest(peer).to_key();
        let previous = self
            .ledger
            .update(&key, |current: Decoded<OwnerManifest>| {
                let mut manifest = current.unwrap_or_default();
                let previous = manifest.insert(cid.clone(), record.clone());
                Mutation::Write(manifest, previous)
            })
            .await
            .map_err(|err| FilesError::from_update(&key, err))?;

        info!(%peer, %cid, name = %record.name, size = record.size_bytes, "published to owner manifest");
        Ok(previous)
    }

    /// Manifest of `peer`. Absent, corrupt and unreachable values all read as
    /// an empty manifest.
    pub async fn read_manifest(&self, peer: &PeerId) -> OwnerManifest {
        let key = LedgerKey::Manifest(peer).to_key();
        match self.ledger.read::<OwnerManifest>(&key).await {
            Ok(decoded) => decoded.unwrap_or_default(),
            Err(err) => {
                warn!(%peer, error = %err, "manifest read failed, treating it as empty");
                OwnerManifest::new()
            }
        }
    }

    /// Read the manifests of `peers` concurrently.
    pub async fn list_all_manifests(&self, peers: &[PeerId]) -> BTreeMap<PeerId, OwnerManifest> {
        let mut futures = Vec::new();
        for peer in peers {
            let registry = self.clone();
            let peer = peer.clone();
            futures.push(async move {
                let manifest = registry.read_manifest(&peer).await;
                (peer, manifest)
            });
        }

        let manifests: BTreeMap<_, _> = futures::future::join_all(futures).await.into_iter().collect();
        debug!(peers = manifests.len(), "collected owner manifests");
        manifests
    }
}
