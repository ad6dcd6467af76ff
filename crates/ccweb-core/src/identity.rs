//! # Identity Newtypes
//!
//! Domain-primitive newtypes for the identifiers that flow through
//! ingestion. A [`PrincipalId`] is supplied by the identity service and is
//! threaded explicitly through every call; there is no ambient "current
//! user". A [`FileId`] is the surrogate row key the catalog assigns to a
//! stored object.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// An authenticated actor that uploads or retrieves content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(Uuid);

impl PrincipalId {
    /// Create a new random principal identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a principal identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Parse a principal identifier from its hyphenated UUID form.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        s.trim()
            .parse::<Uuid>()
            .map(Self)
            .map_err(|_| ValidationError::InvalidPrincipal(s.to_string()))
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Catalog row identifier of a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(i64);

impl FileId {
    /// Wrap a raw row identifier.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// The raw row identifier.
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_parse_roundtrip() {
        let p = PrincipalId::new();
        assert_eq!(PrincipalId::parse(&p.to_string()).unwrap(), p);
    }

    #[test]
    fn principal_parse_rejects_garbage() {
        let err = PrincipalId::parse("alice").unwrap_err();
        assert_eq!(err, ValidationError::InvalidPrincipal("alice".into()));
    }

    #[test]
    fn principals_are_distinct() {
        assert_ne!(PrincipalId::new(), PrincipalId::new());
    }

    #[test]
    fn principal_serializes_as_bare_uuid() {
        let id = Uuid::nil();
        let json = serde_json::to_string(&PrincipalId::from_uuid(id)).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }
}
