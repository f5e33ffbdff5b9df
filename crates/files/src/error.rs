//! Error types for file coordination.

use peerfs_content::StoreError;
use peerfs_storage::LedgerError;
use peerfs_types::{ContentId, FavoritesList, IdError, PeerId};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilesError {
    #[error("peer {peer} has no standing to delete {cid}")]
    NoStanding { cid: ContentId, peer: PeerId },

    #[error("content store failed to remove {cid}: {source}")]
    StoreRemovalFailed {
        cid: ContentId,
        #[source]
        source: StoreError,
    },

    #[error("{cid} was removed but its deletion record gained a non-consenting member")]
    RecordChanged { cid: ContentId, waiting_on: Vec<PeerId> },

    #[error("ledger write failed for key {key:?}: {source}")]
    LedgerWriteFailed {
        key: String,
        #[source]
        source: LedgerError,
    },

    #[error("peer {peer} is not in the favorites list")]
    UnknownFavorite { peer: PeerId, current: FavoritesList },

    #[error("cannot upload {path:?}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("content store error: {0}")]
    Store(#[from] StoreError),
}

impl FilesError {
    /// Classify a failed read-modify-write by the step that failed.
    pub(crate) fn from_update(key: impl Into<String>, source: LedgerError) -> Self {
        if source.is_read() {
            return FilesError::Ledger(source);
        }
        FilesError::LedgerWriteFailed {
            key: key.into(),
            source,
        }
    }

    /// Failure stage of a delete request, for reporting.
    pub fn stage(&self) -> &'static str {
        match self {
            FilesError::NoStanding { .. } => "no-standing",
            FilesError::StoreRemovalFailed { .. } => "store-removal",
            FilesError::RecordChanged { .. } => "ledger-clear",
            FilesError::LedgerWriteFailed { .. } => "ledger-write",
            FilesError::Ledger(_) => "ledger-read",
            FilesError::UnknownFavorite { .. } => "favorites",
            FilesError::InvalidPath { .. } | FilesError::InvalidId(_) => "input",
            FilesError::Store(_) => "content-store",
        }
    }
}

pub type Result<T> = std::result::Result<T, FilesError>;
