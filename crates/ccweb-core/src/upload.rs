//! # Upload Metadata
//!
//! Normalization of the client-supplied filename and the free-text fields
//! that accompany an upload. Everything here runs before a single byte is
//! committed, so rejected metadata never leaves scratch files or catalog
//! rows behind.
//!
//! ## Filename Rules
//!
//! - Path separators become spaces, runs of whitespace collapse into a
//!   single `_`, and every character outside `[A-Za-z0-9._-]` is dropped.
//! - Leading and trailing `.` and `_` are stripped, so `../../etc/passwd`
//!   becomes `etc_passwd` and can never escape the storage directory.
//! - The extension is everything from the last `.` (kept, with its dot);
//!   a name without a dot has an empty extension.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Maximum extension length including the leading dot.
pub const MAX_EXTENSION_LEN: usize = 64;

/// Maximum sanitized filename length in bytes.
pub const MAX_NAME_LEN: usize = 255;

/// Maximum size of the `parameters` and `remark` fields in bytes.
pub const MAX_TEXT_FIELD_LEN: usize = 4096;

/// A sanitized client filename split into stem and extension.
///
/// Serialized as the joined filename; deserializing runs [`UploadName::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UploadName {
    stem: String,
    extension: String,
}

impl UploadName {
    /// Sanitize and split a raw client filename.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let sanitized = sanitize(raw);
        if sanitized.is_empty() {
            return Err(ValidationError::EmptyFileName(raw.to_string()));
        }
        if sanitized.len() > MAX_NAME_LEN {
            return Err(ValidationError::FieldTooLong {
                field: "file name",
                len: sanitized.len(),
                max: MAX_NAME_LEN,
            });
        }

        let (stem, extension) = match sanitized.rfind('.') {
            Some(idx) if idx > 0 => {
                let (s, e) = sanitized.split_at(idx);
                (s.to_string(), e.to_string())
            }
            _ => (sanitized, String::new()),
        };

        if extension.len() > MAX_EXTENSION_LEN {
            return Err(ValidationError::ExtensionTooLong {
                len: extension.len(),
                max: MAX_EXTENSION_LEN,
            });
        }

        Ok(Self { stem, extension })
    }

    /// Filename without its extension.
    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Extension including the leading dot, or empty.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Split into `(stem, extension)`.
    pub fn into_parts(self) -> (String, String) {
        (self.stem, self.extension)
    }
}

impl std::fmt::Display for UploadName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.stem, self.extension)
    }
}

impl TryFrom<String> for UploadName {
    type Error = ValidationError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<UploadName> for String {
    fn from(name: UploadName) -> Self {
        name.to_string()
    }
}

fn sanitize(raw: &str) -> String {
    let spaced: String = raw
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Free-text fields submitted alongside an upload.
///
/// `remark` is required by the catalog schema but may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadMetadata {
    /// Processing parameters requested by the uploader.
    pub parameters: Option<String>,
    /// Free-form note from the uploader.
    pub remark: String,
}

impl UploadMetadata {
    /// Build validated metadata.
    pub fn new(parameters: Option<String>, remark: impl Into<String>) -> Result<Self, ValidationError> {
        let meta = Self {
            parameters,
            remark: remark.into(),
        };
        meta.validate()?;
        Ok(meta)
    }

    /// Check field size limits.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(p) = &self.parameters {
            if p.len() > MAX_TEXT_FIELD_LEN {
                return Err(ValidationError::FieldTooLong {
                    field: "parameters",
                    len: p.len(),
                    max: MAX_TEXT_FIELD_LEN,
                });
            }
        }
        if self.remark.len() > MAX_TEXT_FIELD_LEN {
            return Err(ValidationError::FieldTooLong {
                field: "remark",
                len: self.remark.len(),
                max: MAX_TEXT_FIELD_LEN,
            });
        }
        Ok(())
    }
}
