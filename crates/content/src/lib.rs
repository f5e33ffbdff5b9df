//! Content store and cluster access for PeerFS.
//!
//! [`ContentStore`] is the content-addressed blob boundary and
//! [`ClusterDirectory`] the peer/pin view of the storage cluster.
//! [`ClusterClient`] speaks the cluster REST API plus an IPFS gateway;
//! [`MemoryContentStore`] implements both traits in-process.

pub mod cluster;
pub mod error;
pub mod memory;
pub mod store;

pub use cluster::ClusterClient;
pub use error::{Result, StoreError};
pub use memory::MemoryContentStore;
pub use store::{ClusterDirectory, ClusterPeer, ContentStore, PeerPinInfo, PinStatus, Replication};
