//! Multi-peer delete workflow.
//!
//! A delete request flips the caller's vote. Once every member consents the
//! content is removed from the store first and the deletion record cleared
//! second, so an interrupted sequence leaves a stale all-consenting record
//! rather than a cleared record pointing at live content. A failed removal
//! leaves the record untouched and the same request can simply be retried.
//!
//! The record stays held from the vote through the clear, so a peer of this
//! process cannot join it while the content is being removed.

use crate::error::{FilesError, Result};
use crate::votes::{consensus_reached, DeletionLedger};
use peerfs_content::ContentStore;
use peerfs_storage::Decoded;
use peerfs_types::{ContentId, PeerId};
use std::sync::Arc;
use tracing::{info, warn};

/// Non-error result of a delete request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Every member consented; content removed and record cleared.
    Removed,
    /// Vote recorded; waiting for the listed members.
    Pending { waiting_on: Vec<PeerId> },
}

#[derive(Clone)]
pub struct ConsensusCoordinator {
    votes: DeletionLedger,
    store: Arc<dyn ContentStore>,
}

impl ConsensusCoordinator {
    pub fn new(votes: DeletionLedger, store: Arc<dyn ContentStore>) -> Self {
        Self { votes, store }
    }

    pub async fn delete_content(&self, cid: &ContentId, peer: &PeerId) -> Result<DeleteOutcome> {
        let hold = self.votes.hold(cid).await;
        let record = hold.cast_delete_vote(peer).await?;

        if !consensus_reached(&record) {
            let waiting_on: Vec<PeerId> = record.pending().cloned().collect();
            info!(%cid, %peer, waiting = waiting_on.len(), "delete pending on other peers");
            return Ok(DeleteOutcome::Pending { waiting_on });
        }

        self.store
            .remove(cid)
            .await
            .map_err(|source| {
                warn!(%cid, error = %source, "content removal failed, votes kept for retry");
                FilesError::StoreRemovalFailed {
                    cid: cid.clone(),
                    source,
                }
            })?;

        if !hold.clear_if_consensus().await? {
            // Only another process writing through compare-and-set gets here.
            let waiting_on = match self.votes.read_record(cid).await? {
                Decoded::Value(current) => current.pending().cloned().collect(),
                Decoded::Empty(_) => Vec::new(),
            };
            warn!(%cid, ?waiting_on, "deletion record gained a member during removal, leaving it in place");
            return Err(FilesError::RecordChanged {
                cid: cid.clone(),
                waiting_on,
            });
        }

        info!(%cid, %peer, voters = record.len(), "content deleted by consensus");
        Ok(DeleteOutcome::Removed)
    }
}
