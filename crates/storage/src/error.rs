use std::time::Duration;

/// Ledger errors
#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    #[error("ledger round-trip on key {key:?} timed out after {timeout:?}")]
    Timeout { key: String, timeout: Duration },
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("compare-and-set is not supported by this ledger")]
    CompareAndSetUnsupported,
    #[error("key {key:?} still contended after {attempts} compare-and-set attempts")]
    Contended { key: String, attempts: u32 },
    #[error("ledger read of key {key:?} failed: {source}")]
    Read {
        key: String,
        #[source]
        source: Box<LedgerError>,
    },
}

impl LedgerError {
    /// Whether retrying the same round-trip may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            LedgerError::Timeout { .. } | LedgerError::Unavailable(_) => true,
            LedgerError::Read { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// Whether the failure happened before anything was written.
    pub fn is_read(&self) -> bool {
        matches!(self, LedgerError::Read { .. })
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
