//! # Stored Objects
//!
//! The catalog record for a piece of ingested content.
//!
//! A [`StoredObject`] is written exactly once, on the first ingestion of
//! novel content, and is never mutated afterwards. Duplicate uploads only
//! add access grants; they never touch the name, remark, uploader or
//! timestamp captured the first time.

use serde::{Deserialize, Serialize};

use crate::digest::Fingerprint;
use crate::identity::{FileId, PrincipalId};
use crate::temporal::Timestamp;

/// Name of the permanent blob: the fingerprint hex followed by the extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    /// Derive the key for content with the given fingerprint and extension.
    pub fn derive(fingerprint: &Fingerprint, extension: &str) -> Self {
        Self(format!("{}{}", fingerprint.to_hex(), extension))
    }

    /// Reconstruct a key read back from the catalog.
    pub fn from_stored(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Return the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata for content that has not been cataloged yet.
///
/// The catalog assigns the [`FileId`] on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewObject {
    /// Content fingerprint; must be unique in the catalog.
    pub fingerprint: Fingerprint,
    /// Sanitized client filename without extension.
    pub original_name: String,
    /// Extension including its leading dot, or empty.
    pub extension: String,
    /// Size of the content in bytes.
    pub size_bytes: u64,
    /// Principal who introduced the content.
    pub uploader_id: PrincipalId,
    /// Instant of first ingestion.
    pub uploaded_at: Timestamp,
    /// Processing parameters supplied with the first upload.
    pub parameters: Option<String>,
    /// Remark supplied with the first upload.
    pub remark: String,
}

impl NewObject {
    /// The storage key this object will be committed under.
    pub fn storage_key(&self) -> StorageKey {
        StorageKey::derive(&self.fingerprint, &self.extension)
    }

    /// Attach the catalog-assigned identifier.
    pub fn into_stored(self, id: FileId) -> StoredObject {
        let storage_key = self.storage_key();
        StoredObject {
            id,
            fingerprint: self.fingerprint,
            storage_key,
            original_name: self.original_name,
            extension: self.extension,
            size_bytes: self.size_bytes,
            uploader_id: self.uploader_id,
            uploaded_at: self.uploaded_at,
            parameters: self.parameters,
            remark: self.remark,
        }
    }
}

/// A cataloged piece of content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    /// Catalog row identifier.
    pub id: FileId,
    /// Content fingerprint (unique).
    pub fingerprint: Fingerprint,
    /// Permanent blob name, always `fingerprint + extension`.
    pub storage_key: StorageKey,
    /// Filename stem from the first upload.
    pub original_name: String,
    /// Extension from the first upload.
    pub extension: String,
    /// Content size in bytes.
    pub size_bytes: u64,
    /// Principal who first uploaded the content.
    pub uploader_id: PrincipalId,
    /// Instant of first ingestion (UTC).
    pub uploaded_at: Timestamp,
    /// Processing parameters from the first upload.
    pub parameters: Option<String>,
    /// Remark from the first upload.
    pub remark: String,
}

impl StoredObject {
    /// Filename to present on download: the original stem plus extension.
    pub fn display_name(&self) -> String {
        format!("{}{}", self.original_name, self.extension)
    }
}
