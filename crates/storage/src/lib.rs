//! PeerFS ledger access.
//!
//! The shared ledger is an external key/value service with plain get/set
//! semantics. This crate defines that boundary ([`KeyValueLedger`]), ships an
//! in-memory and a sled-backed implementation, and provides [`LedgerClient`],
//! the typed helper every component uses to read and mutate ledger values.

pub mod client;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod retry;
pub mod sled_ledger;

pub use client::{Decoded, EmptyReason, KeyGuard, LedgerClient, Mutation};
pub use error::{LedgerError, Result};
pub use ledger::{KeyValueLedger, MemoryLedger};
pub use locks::KeyLocks;
pub use retry::{compute_backoff, Backoff, RetryPolicy};
pub use sled_ledger::SledLedger;
