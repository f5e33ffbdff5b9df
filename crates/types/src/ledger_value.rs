//! Ledger key-space and payload encoding.
//!
//! Every shared structure lives under one ledger key. The key layout is fixed
//! by existing deployments:
//!
//! | key                      | payload                                      |
//! |--------------------------|----------------------------------------------|
//! | `<peer>`                 | owner manifest, content id -> file record    |
//! | `<content id>`           | deletion record, wrapped under the content id |
//! | `<peer> FAVORITE`        | favorites list, peer -> nickname entry       |

use crate::{ContentId, PeerId};
use std::fmt;

/// Suffix appended to a peer identity to form its favorites key.
pub const FAVORITES_SUFFIX: &str = " FAVORITE";

/// Typed ledger key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerKey<'a> {
    /// Manifest of content published by a peer.
    Manifest(&'a PeerId),
    /// Deletion votes for one piece of content.
    Deletion(&'a ContentId),
    /// Favorites list owned by a peer.
    Favorites(&'a PeerId),
}

impl LedgerKey<'_> {
    pub fn to_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for LedgerKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerKey::Manifest(peer) => f.write_str(peer.as_str()),
            LedgerKey::Deletion(cid) => f.write_str(cid.as_str()),
            LedgerKey::Favorites(peer) => write!(f, "{}{}", peer.as_str(), FAVORITES_SUFFIX),
        }
    }
}

/// A structure persisted as a single ledger value.
///
/// The key is passed to both directions because some payloads embed it
/// (deletion records are wrapped under their content id).
pub trait LedgerValue: Sized {
    fn decode_from(key: &str, bytes: &[u8]) -> serde_json::Result<Self>;

    fn encode_for(&self, key: &str) -> serde_json::Result<Vec<u8>>;

    /// Whether a successfully decoded value carries no data and should be
    /// treated like an absent key.
    fn is_vacant(&self) -> bool;
}
