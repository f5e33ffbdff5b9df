//! PeerFS shared data model.
//!
//! Identifiers, owner manifests, deletion records and favorites lists, plus
//! the mapping of each structure onto the shared ledger key-space.

pub mod deletion;
pub mod favorites;
pub mod ids;
pub mod ledger_value;
pub mod manifest;

pub use deletion::DeletionRecord;
pub use favorites::{FavoriteEntry, FavoritesList};
pub use ids::{ContentId, IdError, PeerId};
pub use ledger_value::{LedgerKey, LedgerValue, FAVORITES_SUFFIX};
pub use manifest::{FileRecord, OwnerManifest};
