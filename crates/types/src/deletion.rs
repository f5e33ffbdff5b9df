//! Deletion records: per-content consent votes.

use crate::{LedgerValue, PeerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Peer -> "consents to delete", scoped to one content id.
///
/// A peer is a member of the record once it has published (or otherwise
/// registered interest in) the content. Only members may vote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeletionRecord {
    votes: BTreeMap<PeerId, bool>,
}

impl DeletionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record with a single member that has not consented yet.
    pub fn with_voter(peer: PeerId) -> Self {
        let mut record = Self::new();
        record.register(peer);
        record
    }

    /// Add `peer` as a non-consenting member.
    ///
    /// Returns `false` and leaves the record untouched if the peer is
    /// already a member, so an existing `true` is never reset.
    pub fn register(&mut self, peer: PeerId) -> bool {
        if self.votes.contains_key(&peer) {
            return false;
        }
        self.votes.insert(peer, false);
        true
    }

    /// Flip `peer`'s vote to consent.
    ///
    /// Returns the previous vote, or `None` if the peer is not a member.
    pub fn consent(&mut self, peer: &PeerId) -> Option<bool> {
        self.votes
            .get_mut(peer)
            .map(|vote| std::mem::replace(vote, true))
    }

    pub fn vote(&self, peer: &PeerId) -> Option<bool> {
        self.votes.get(peer).copied()
    }

    pub fn is_member(&self, peer: &PeerId) -> bool {
        self.votes.contains_key(peer)
    }

    /// True iff the record has members and every one of them consents.
    pub fn consensus_reached(&self) -> bool {
        !self.votes.is_empty() && self.votes.values().all(|v| *v)
    }

    /// Members that have not consented yet.
    pub fn pending(&self) -> impl Iterator<Item = &PeerId> {
        self.votes
            .iter()
            .filter(|(_, consents)| !**consents)
            .map(|(peer, _)| peer)
    }

    pub fn voters(&self) -> impl Iterator<Item = &PeerId> {
        self.votes.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PeerId, bool)> {
        self.votes.iter().map(|(p, v)| (p, *v))
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }
}

impl FromIterator<(PeerId, bool)> for DeletionRecord {
    fn from_iter<I: IntoIterator<Item = (PeerId, bool)>>(iter: I) -> Self {
        Self {
            votes: iter.into_iter().collect(),
        }
    }
}

/// Accepted payload shapes. Deployed nodes wrap the votes under the content
/// id (`{"<cid>": {"<peer>": false}}`); a bare vote map is also accepted.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireRecord {
    Wrapped(BTreeMap<String, BTreeMap<PeerId, bool>>),
    Flat(BTreeMap<PeerId, bool>),
}

impl LedgerValue for DeletionRecord {
    fn decode_from(key: &str, bytes: &[u8]) -> serde_json::Result<Self> {
        let votes = match serde_json::from_slice::<WireRecord>(bytes)? {
            WireRecord::Wrapped(mut outer) => outer.remove(key).unwrap_or_default(),
            WireRecord::Flat(votes) => votes,
        };
        Ok(Self { votes })
    }

    fn encode_for(&self, key: &str) -> serde_json::Result<Vec<u8>> {
        // Cleared records are written as `{}`: the ledger has no delete.
        if self.votes.is_empty() {
            return serde_json::to_vec(&serde_json::Map::new());
        }
        let mut outer = BTreeMap::new();
        outer.insert(key, &self.votes);
        serde_json::to_vec(&outer)
    }

    fn is_vacant(&self) -> bool {
        self.votes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(id: &str) -> PeerId {
        PeerId::new(id)
    }

    #[test]
    fn test_register_never_resets_consent() {
        let mut record = DeletionRecord::with_voter(peer("p1"));
        assert_eq!(record.consent(&peer("p1")), Some(false));
        assert!(!record.register(peer("p1")));
        assert_eq!(record.vote(&peer("p1")), Some(true));
    }

    #[test]
    fn test_consent_requires_membership() {
        let mut record = DeletionRecord::with_voter(peer("p1"));
        assert_eq!(record.consent(&peer("p3")), None);
        assert!(!record.is_member(&peer("p3")));
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_consensus_predicate() {
        assert!(!DeletionRecord::new().consensus_reached());

        let mut record: DeletionRecord = [(peer("p1"), true), (peer("p2"), false)]
            .into_iter()
            .collect();
        assert!(!record.consensus_reached());
        assert_eq!(record.pending().collect::<Vec<_>>(), vec![&peer("p2")]);

        record.consent(&peer("p2"));
        assert!(record.consensus_reached());
        assert_eq!(record.pending().count(), 0);
    }

    #[test]
    fn test_wire_format_is_wrapped_under_content_id() {
        let record = DeletionRecord::with_voter(peer("p1"));
        let bytes = record.encode_for("cid1").unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value, serde_json::json!({ "cid1": { "p1": false } }));

        let decoded = DeletionRecord::decode_from("cid1", &bytes).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_decode_accepts_flat_and_cleared_payloads() {
        let flat = DeletionRecord::decode_from("cid1", br#"{"p1": true, "p2": false}"#).unwrap();
        assert_eq!(flat.vote(&peer("p1")), Some(true));
        assert_eq!(flat.vote(&peer("p2")), Some(false));

        let cleared = DeletionRecord::decode_from("cid1", b"{}").unwrap();
        assert!(cleared.is_vacant());
        assert_eq!(DeletionRecord::new().encode_for("cid1").unwrap(), b"{}");

        // Wrapped under some other content id: nothing for this key.
        let foreign = DeletionRecord::decode_from("cid1", br#"{"cid9": {"p1": false}}"#).unwrap();
        assert!(foreign.is_vacant());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(DeletionRecord::decode_from("cid1", b"not json").is_err());
        assert!(DeletionRecord::decode_from("cid1", br#"{"p1": "yes"}"#).is_err());
    }
}
