//! End-to-end file workflows for one local peer.

use crate::coordinator::{ConsensusCoordinator, DeleteOutcome};
use crate::error::{FilesError, Result};
use crate::favorites::FavoritesDirectory;
use crate::registry::OwnerRegistry;
use crate::votes::DeletionLedger;
use peerfs_content::{ClusterDirectory, ContentStore, Replication};
use peerfs_storage::{Decoded, EmptyReason, LedgerClient};
use peerfs_types::{ContentId, FileRecord, OwnerManifest, PeerId};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Everything a [`FileService`] needs, resolved up front.
#[derive(Clone)]
pub struct FilesContext {
    pub local_peer: PeerId,
    pub ledger: LedgerClient,
    pub store: Arc<dyn ContentStore>,
    pub directory: Arc<dyn ClusterDirectory>,
    /// Pin uploads with this range; `None` leaves pinning to the store.
    pub replication: Option<Replication>,
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub cid: ContentId,
    pub record: FileRecord,
    pub pinned: bool,
}

/// Registry repair summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Content that had no deletion record and now has the local vote.
    pub registered: Vec<ContentId>,
    /// Content whose deletion record could not be decoded; left untouched.
    pub corrupt: Vec<ContentId>,
}

#[derive(Clone)]
pub struct FileService {
    local_peer: PeerId,
    store: Arc<dyn ContentStore>,
    directory: Arc<dyn ClusterDirectory>,
    replication: Option<Replication>,
    registry: OwnerRegistry,
    votes: DeletionLedger,
    coordinator: ConsensusCoordinator,
    favorites: FavoritesDirectory,
}

impl FileService {
    pub fn new(ctx: FilesContext) -> Self {
        let registry = OwnerRegistry::new(ctx.ledger.clone());
        let votes = DeletionLedger::new(ctx.ledger.clone());
        let coordinator = ConsensusCoordinator::new(votes.clone(), ctx.store.clone());
        let favorites =
            FavoritesDirectory::new(ctx.ledger, ctx.directory.clone(), ctx.local_peer.clone());
        Self {
            local_peer: ctx.local_peer,
            store: ctx.store,
            directory: ctx.directory,
            replication: ctx.replication,
            registry,
            votes,
            coordinator,
            favorites,
        }
    }

    pub fn local_peer(&self) -> &PeerId {
        &self.local_peer
    }

    pub fn registry(&self) -> &OwnerRegistry {
        &self.registry
    }

    pub fn votes(&self) -> &DeletionLedger {
        &self.votes
    }

    pub fn favorites(&self) -> &FavoritesDirectory {
        &self.favorites
    }

    pub fn directory(&self) -> &Arc<dyn ClusterDirectory> {
        &self.directory
    }

    /// Store the file at `path`, record it in the local manifest and register
    /// the local deletion vote.
    pub async fn upload(&self, path: &Path) -> Result<UploadReceipt> {
        self.local_peer.validate()?;
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|err| invalid_path(path, err.to_string()))?;
        if !metadata.is_file() {
            return Err(invalid_path(path, "not a regular file"));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| invalid_path(path, "path has no file name"))?;

        let cid = self.store.put_file(path).await?;
        // The id becomes a ledger key.
        cid.validate()?;
        let record = FileRecord::new(name, metadata.len());

        let pinned = match self.replication {
            Some(replication) => match self.directory.pin(&cid, replication).await {
                Ok(()) => true,
                Err(err) => {
                    warn!(%cid, error = %err, "pin after upload failed");
                    false
                }
            },
            None => false,
        };

        self.registry
            .publish(&self.local_peer, cid.clone(), record.clone())
            .await?;
        self.votes.register_vote(&cid, &self.local_peer).await?;

        info!(%cid, name = %record.name, size = record.size_bytes, pinned, "upload complete");
        Ok(UploadReceipt {
            cid,
            record,
            pinned,
        })
    }

    /// Fetch `cid` into `destination`, returning the bytes written.
    pub async fn download(&self, cid: &ContentId, destination: &Path) -> Result<u64> {
        let written = self.store.fetch_to(cid, destination).await?;
        info!(%cid, destination = %destination.display(), written, "download complete");
        Ok(written)
    }

    /// Vote to delete `cid` as the local peer.
    pub async fn delete(&self, cid: &ContentId) -> Result<DeleteOutcome> {
        self.coordinator.delete_content(cid, &self.local_peer).await
    }

    pub async fn my_files(&self) -> OwnerManifest {
        self.registry.read_manifest(&self.local_peer).await
    }

    /// Manifests of the local peer and every cluster peer it knows.
    pub async fn list_all_files(&self) -> Result<BTreeMap<PeerId, OwnerManifest>> {
        let local = self.directory.local_peer().await?;
        let mut peers = vec![self.local_peer.clone()];
        for peer in std::iter::once(local.id).chain(local.cluster_peers) {
            if !peers.contains(&peer) {
                peers.push(peer);
            }
        }
        Ok(self.registry.list_all_manifests(&peers).await)
    }

    /// Re-register the local vote for published content that never got a
    /// deletion record. Cleared records belong to deleted content and are
    /// skipped.
    pub async fn repair_votes(&self) -> Result<RepairReport> {
        let manifest = self.my_files().await;
        let mut report = RepairReport::default();

        for cid in manifest.content_ids() {
            match self.votes.read_record(cid).await? {
                Decoded::Empty(EmptyReason::Absent) => {
                    self.votes.register_vote(cid, &self.local_peer).await?;
                    report.registered.push(cid.clone());
                }
                Decoded::Empty(EmptyReason::Corrupt(_)) => report.corrupt.push(cid.clone()),
                Decoded::Value(_) | Decoded::Empty(EmptyReason::Cleared) => {}
            }
        }

        info!(
            registered = report.registered.len(),
            corrupt = report.corrupt.len(),
            "vote repair finished"
        );
        Ok(report)
    }
}

fn invalid_path(path: &Path, reason: impl Into<String>) -> FilesError {
    FilesError::InvalidPath {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}
