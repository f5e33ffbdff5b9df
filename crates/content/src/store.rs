//! Content store and cluster directory boundaries.

use crate::error::Result;
use async_trait::async_trait;
use peerfs_types::{ContentId, PeerId};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::Path;

/// Content-addressed blob store.
///
/// Identical bytes map to the same [`ContentId`]; content is durable once
/// `put` returns and `remove` is idempotent.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store `bytes` under a content-derived id. `name` is advisory.
    async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<ContentId>;

    async fn get(&self, cid: &ContentId) -> Result<Vec<u8>>;

    async fn remove(&self, cid: &ContentId) -> Result<()>;

    /// Store the file at `path`, named after its base name.
    async fn put_file(&self, path: &Path) -> Result<ContentId> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.put(&name, bytes).await
    }

    /// Fetch `cid` into `destination`, returning the number of bytes written.
    async fn fetch_to(&self, cid: &ContentId, destination: &Path) -> Result<u64> {
        let bytes = self.get(cid).await?;
        tokio::fs::write(destination, &bytes).await?;
        Ok(bytes.len() as u64)
    }
}

/// Replication factor range for a pin. `-1` means "every peer".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replication {
    #[serde(rename = "replication-min")]
    pub min: i32,
    #[serde(rename = "replication-max")]
    pub max: i32,
}

impl Default for Replication {
    fn default() -> Self {
        Self { min: -1, max: -1 }
    }
}

/// Pin state of one piece of content on one peer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerPinInfo {
    #[serde(default)]
    pub peername: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub error: String,
}

/// Cluster-wide pin status of one piece of content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinStatus {
    #[serde(with = "cid_link")]
    pub cid: ContentId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub peer_map: BTreeMap<String, PeerPinInfo>,
}

impl PinStatus {
    /// Peers reporting the content as pinned.
    pub fn pinned_on(&self) -> impl Iterator<Item = &str> {
        self.peer_map
            .iter()
            .filter(|(_, info)| info.status == "pinned")
            .map(|(peer, _)| peer.as_str())
    }

    /// Peers reporting an error for the content.
    pub fn errors(&self) -> impl Iterator<Item = (&str, &str)> {
        self.peer_map
            .iter()
            .filter(|(_, info)| !info.error.is_empty())
            .map(|(peer, info)| (peer.as_str(), info.error.as_str()))
    }
}

/// Identity and membership information reported by a cluster peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterPeer {
    pub id: PeerId,
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub cluster_peers: Vec<PeerId>,
    #[serde(default)]
    pub peername: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub error: String,
}

/// Peer discovery and pin management offered by the storage cluster.
#[async_trait]
pub trait ClusterDirectory: Send + Sync {
    /// The peer this node talks to; its `id` is the local identity.
    async fn local_peer(&self) -> Result<ClusterPeer>;

    async fn peers(&self) -> Result<Vec<ClusterPeer>>;

    /// Advertised name of `peer`, if the cluster knows it.
    async fn peer_name(&self, peer: &PeerId) -> Result<Option<String>> {
        Ok(self
            .peers()
            .await?
            .into_iter()
            .find(|p| &p.id == peer)
            .map(|p| p.peername))
    }

    async fn pin(&self, cid: &ContentId, replication: Replication) -> Result<()>;

    async fn pin_status(&self, cid: &ContentId) -> Result<PinStatus>;

    async fn pins(&self) -> Result<Vec<PinStatus>>;
}

/// Content ids appear either as plain strings or as IPLD links
/// (`{"/": "<cid>"}`). Serialized as links.
pub(crate) mod cid_link {
    use super::*;

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    pub(crate) enum CidRepr {
        Link {
            #[serde(rename = "/")]
            link: String,
        },
        Plain(String),
    }

    impl From<CidRepr> for ContentId {
        fn from(repr: CidRepr) -> Self {
            match repr {
                CidRepr::Link { link } => ContentId::new(link),
                CidRepr::Plain(cid) => ContentId::new(cid),
            }
        }
    }

    pub fn serialize<S: Serializer>(cid: &ContentId, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        CidRepr::Link {
            link: cid.as_str().to_string(),
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<ContentId, D::Error> {
        CidRepr::deserialize(deserializer).map(ContentId::from)
    }
}
