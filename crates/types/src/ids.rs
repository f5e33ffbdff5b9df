use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors emitted when an identifier cannot be used as (part of) a ledger key.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("{kind} must not be empty")]
    Empty { kind: &'static str },
    #[error("{kind} must not contain whitespace: {value:?}")]
    Whitespace { kind: &'static str, value: String },
}

fn validate_component(kind: &'static str, value: &str) -> Result<(), IdError> {
    if value.is_empty() {
        return Err(IdError::Empty { kind });
    }
    // Whitespace would let an id collide with the "<peer> FAVORITE" key family.
    if value.chars().any(char::is_whitespace) {
        return Err(IdError::Whitespace {
            kind,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Content-derived identifier of a blob held by the content store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    /// Wrap an identifier returned by the content store.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive an identifier from raw bytes (BLAKE3, hex encoded).
    ///
    /// Used by stores that address content locally; remote stores hand back
    /// their own identifiers.
    pub fn from_data(data: &[u8]) -> Self {
        Self(hex::encode(blake3::hash(data).as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check the identifier is usable as a ledger key.
    pub fn validate(&self) -> Result<(), IdError> {
        validate_component("content id", &self.0)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ContentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ContentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Stable identity of one participant in the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check the identity is usable as a ledger key.
    pub fn validate(&self) -> Result<(), IdError> {
        validate_component("peer id", &self.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PeerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PeerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PeerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_id_from_data_is_deterministic() {
        let a = ContentId::from_data(b"hello world");
        let b = ContentId::from_data(b"hello world");
        let c = ContentId::from_data(b"hello world!");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_validation_rejects_empty_and_whitespace() {
        assert!(ContentId::new("QmVGp7rNegQrd86YNViYzuLMBYPHiqE3usij9AuZAJzdSn")
            .validate()
            .is_ok());
        assert_eq!(
            ContentId::new("").validate(),
            Err(IdError::Empty { kind: "content id" })
        );
        assert!(matches!(
            PeerId::new("peer FAVORITE").validate(),
            Err(IdError::Whitespace { .. })
        ));
        assert!(PeerId::new("12D3KooWEH7HALhJhEHY6RQ1SDrxcbrihM8VBy9vB7Rf6GqRFtSg")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let peer = PeerId::new("p1");
        assert_eq!(serde_json::to_string(&peer).unwrap(), "\"p1\"");
        let cid: ContentId = serde_json::from_str("\"cid1\"").unwrap();
        assert_eq!(cid, ContentId::from("cid1"));
    }
}
