use crate::error::{Result, StoreError};
use crate::store::{ClusterDirectory, ClusterPeer, ContentStore, PeerPinInfo, PinStatus, Replication};
use async_trait::async_trait;
use parking_lot::RwLock;
use peerfs_types::{ContentId, PeerId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

struct Blob {
    name: String,
    bytes: Vec<u8>,
    replication: Replication,
}

/// In-memory content store and cluster (for testing and local mode).
///
/// Content ids are BLAKE3 digests of the stored bytes. Every known peer is
/// reported as pinning every stored blob.
#[derive(Clone)]
pub struct MemoryContentStore {
    inner: Arc<MemoryContentStoreInner>,
}

struct MemoryContentStoreInner {
    local: PeerId,
    /// Peer id -> advertised name, local peer included.
    peers: RwLock<BTreeMap<PeerId, String>>,
    blobs: RwLock<HashMap<ContentId, Blob>>,
}

impl MemoryContentStore {
    pub fn new(local: PeerId, local_name: impl Into<String>) -> Self {
        let mut peers = BTreeMap::new();
        peers.insert(local.clone(), local_name.into());
        Self {
            inner: Arc::new(MemoryContentStoreInner {
                local,
                peers: RwLock::new(peers),
                blobs: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Make another peer known to the cluster.
    pub fn add_peer(&self, peer: PeerId, name: impl Into<String>) {
        self.inner.peers.write().insert(peer, name.into());
    }

    pub fn contains(&self, cid: &ContentId) -> bool {
        self.inner.blobs.read().contains_key(cid)
    }

    pub fn len(&self) -> usize {
        self.inner.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.blobs.read().is_empty()
    }

    /// Replication range last requested for `cid`.
    pub fn replication(&self, cid: &ContentId) -> Option<Replication> {
        self.inner.blobs.read().get(cid).map(|blob| blob.replication)
    }

    fn describe(&self, id: &PeerId, name: &str) -> ClusterPeer {
        ClusterPeer {
            id: id.clone(),
            addresses: Vec::new(),
            cluster_peers: self.inner.peers.read().keys().cloned().collect(),
            peername: name.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            error: String::new(),
        }
    }

    fn status_of(&self, cid: &ContentId, blob: &Blob) -> PinStatus {
        let peer_map = self
            .inner
            .peers
            .read()
            .iter()
            .map(|(id, name)| {
                (
                    id.to_string(),
                    PeerPinInfo {
                        peername: name.clone(),
                        status: "pinned".to_string(),
                        ..Default::default()
                    },
                )
            })
            .collect();
        PinStatus {
            cid: cid.clone(),
            name: blob.name.clone(),
            peer_map,
        }
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<ContentId> {
        let cid = ContentId::from_data(&bytes);
        self.inner
            .blobs
            .write()
            .entry(cid.clone())
            .or_insert_with(|| Blob {
                name: name.to_string(),
                bytes,
                replication: Replication::default(),
            });
        Ok(cid)
    }

    async fn get(&self, cid: &ContentId) -> Result<Vec<u8>> {
        self.inner
            .blobs
            .read()
            .get(cid)
            .map(|blob| blob.bytes.clone())
            .ok_or_else(|| StoreError::NotFound(cid.clone()))
    }

    async fn remove(&self, cid: &ContentId) -> Result<()> {
        self.inner.blobs.write().remove(cid);
        Ok(())
    }
}

#[async_trait]
impl ClusterDirectory for MemoryContentStore {
    async fn local_peer(&self) -> Result<ClusterPeer> {
        let name = self
            .inner
            .peers
            .read()
            .get(&self.inner.local)
            .cloned()
            .unwrap_or_default();
        Ok(self.describe(&self.inner.local, &name))
    }

    async fn peers(&self) -> Result<Vec<ClusterPeer>> {
        let peers: Vec<(PeerId, String)> = self
            .inner
            .peers
            .read()
            .iter()
            .map(|(id, name)| (id.clone(), name.clone()))
            .collect();
        Ok(peers
            .iter()
            .map(|(id, name)| self.describe(id, name))
            .collect())
    }

    async fn pin(&self, cid: &ContentId, replication: Replication) -> Result<()> {
        let mut blobs = self.inner.blobs.write();
        let blob = blobs
            .get_mut(cid)
            .ok_or_else(|| StoreError::NotFound(cid.clone()))?;
        blob.replication = replication;
        Ok(())
    }

    async fn pin_status(&self, cid: &ContentId) -> Result<PinStatus> {
        let blobs = self.inner.blobs.read();
        let blob = blobs
            .get(cid)
            .ok_or_else(|| StoreError::NotFound(cid.clone()))?;
        Ok(self.status_of(cid, blob))
    }

    async fn pins(&self) -> Result<Vec<PinStatus>> {
        let blobs = self.inner.blobs.read();
        let mut pins: Vec<PinStatus> = blobs
            .iter()
            .map(|(cid, blob)| self.status_of(cid, blob))
            .collect();
        pins.sort_by(|a, b| a.cid.cmp(&b.cid));
        Ok(pins)
    }
}
