//! Deletion votes, one record per content id.

use crate::error::{FilesError, Result};
use peerfs_storage::{Decoded, KeyGuard, LedgerClient, Mutation};
use peerfs_types::{ContentId, DeletionRecord, LedgerKey, PeerId};
use tracing::{debug, info};

/// True iff `record` has members and all of them consent.
pub fn consensus_reached(record: &DeletionRecord) -> bool {
    record.consensus_reached()
}

enum Cast {
    NoStanding,
    Recorded(DeletionRecord),
}

/// Deletion records stored under each content id's ledger key.
#[derive(Clone)]
pub struct DeletionLedger {
    ledger: LedgerClient,
}

impl DeletionLedger {
    pub fn new(ledger: LedgerClient) -> Self {
        Self { ledger }
    }

    /// Make `peer` a non-consenting member of `cid`'s record, creating the
    /// record if needed. An existing vote is left as is.
    ///
    /// Returns `true` if the peer was added.
    pub async fn register_vote(&self, cid: &ContentId, peer: &PeerId) -> Result<bool> {
        let key = LedgerKey::Deletion(cid).to_key();
        let added = self
            .ledger
            .update(&key, |current: Decoded<DeletionRecord>| {
                let mut record = current.unwrap_or_default();
                if record.register(peer.clone()) {
                    Mutation::Write(record, true)
                } else {
                    Mutation::Keep(false)
                }
            })
            .await
            .map_err(|err| FilesError::from_update(&key, err))?;

        if added {
            info!(%cid, %peer, "registered deletion vote");
        } else {
            debug!(%cid, %peer, "deletion vote already registered");
        }
        Ok(added)
    }

    /// Hold `cid`'s record so that no other vote mutation from this process
    /// interleaves until the returned guard drops.
    pub async fn hold<'a>(&'a self, cid: &'a ContentId) -> RecordHold<'a> {
        let key = LedgerKey::Deletion(cid).to_key();
        RecordHold {
            ledger: &self.ledger,
            cid,
            guard: self.ledger.hold(&key).await,
        }
    }

    /// Record `peer`'s consent to delete `cid` and return the updated record.
    ///
    /// Fails with [`FilesError::NoStanding`] if `cid` has no record or `peer`
    /// is not a member of it. Re-voting is a no-op.
    pub async fn cast_delete_vote(&self, cid: &ContentId, peer: &PeerId) -> Result<DeletionRecord> {
        self.hold(cid).await.cast_delete_vote(peer).await
    }

    /// Current record for `cid`, distinguishing absent, cleared and corrupt
    /// payloads.
    pub async fn read_record(&self, cid: &ContentId) -> Result<Decoded<DeletionRecord>> {
        let key = LedgerKey::Deletion(cid).to_key();
        Ok(self.ledger.read(&key).await?)
    }

    /// Clear `cid`'s record if every member still consents.
    ///
    /// Returns `false` when the record gained a non-consenting member since
    /// consensus was observed; the record is then left in place.
    pub async fn clear_if_consensus(&self, cid: &ContentId) -> Result<bool> {
        self.hold(cid).await.clear_if_consensus().await
    }
}

/// Exclusive in-process access to one deletion record.
///
/// [`DeletionLedger::register_vote`] for the same content waits while a hold
/// is alive. Writers in other processes are only kept out by the ledger's
/// compare-and-set.
pub struct RecordHold<'a> {
    ledger: &'a LedgerClient,
    cid: &'a ContentId,
    guard: KeyGuard,
}

impl RecordHold<'_> {
    pub fn cid(&self) -> &ContentId {
        self.cid
    }

    /// See [`DeletionLedger::cast_delete_vote`].
    pub async fn cast_delete_vote(&self, peer: &PeerId) -> Result<DeletionRecord> {
        let cid = self.cid;
        let cast = self
            .ledger
            .update_held(&self.guard, |current: Decoded<DeletionRecord>| {
                let Some(mut record) = current.value() else {
                    return Mutation::Keep(Cast::NoStanding);
                };
                match record.consent(peer) {
                    None => Mutation::Keep(Cast::NoStanding),
                    Some(true) => Mutation::Keep(Cast::Recorded(record)),
                    Some(false) => Mutation::Write(record.clone(), Cast::Recorded(record)),
                }
            })
            .await
            .map_err(|err| FilesError::from_update(self.guard.key(), err))?;

        match cast {
            Cast::NoStanding => Err(FilesError::NoStanding {
                cid: cid.clone(),
                peer: peer.clone(),
            }),
            Cast::Recorded(record) => {
                debug!(%cid, %peer, pending = record.pending().count(), "delete vote recorded");
                Ok(record)
            }
        }
    }

    /// See [`DeletionLedger::clear_if_consensus`].
    pub async fn clear_if_consensus(&self) -> Result<bool> {
        self.ledger
            .update_held(&self.guard, |current: Decoded<DeletionRecord>| match current.value() {
                Some(record) if record.consensus_reached() => {
                    Mutation::Write(DeletionRecord::new(), true)
                }
                Some(_) => Mutation::Keep(false),
                // Already cleared by a concurrent delete.
                None => Mutation::Keep(true),
            })
            .await
            .map_err(|err| FilesError::from_update(self.guard.key(), err))
    }
}
