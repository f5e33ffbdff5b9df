use peerfs_types::ContentId;
use thiserror::Error;

/// Errors raised by content store and cluster backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("url error: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("cluster refused request (status {status}): {message}")]
    Status { status: u16, message: String },
    #[error("content not found: {0}")]
    NotFound(ContentId),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(String),
}

impl StoreError {
    pub(crate) fn parse_error(msg: impl Into<String>) -> Self {
        StoreError::Parse(msg.into())
    }

    pub(crate) fn status(status: u16, message: impl Into<String>) -> Self {
        StoreError::Status {
            status,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
