//! PeerFS file coordination.
//!
//! Owner manifests, deletion votes and favorites live in the shared ledger;
//! bytes live in the content store. Content published by several peers is
//! only removed once every one of them has voted to delete it.

pub mod coordinator;
pub mod error;
pub mod favorites;
pub mod registry;
pub mod service;
pub mod votes;

pub use coordinator::{ConsensusCoordinator, DeleteOutcome};
pub use error::{FilesError, Result};
pub use favorites::FavoritesDirectory;
pub use registry::OwnerRegistry;
pub use service::{FileService, FilesContext, RepairReport, UploadReceipt};
pub use votes::{consensus_reached, DeletionLedger, RecordHold};
