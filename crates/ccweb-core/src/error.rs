//! # Validation Errors
//!
//! Structured errors for domain primitives, built with `thiserror`.
//! Each variant carries the offending input or a short diagnostic so that
//! a rejected upload can be explained to the caller without guesswork.

use thiserror::Error;

/// Validation errors for domain primitive newtypes and upload metadata.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Fingerprint is not 64 hex characters.
    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    /// Principal identifier is not a UUID.
    #[error("invalid principal id \"{0}\" (expected a UUID)")]
    InvalidPrincipal(String),

    /// Nothing usable remained after sanitizing the client filename.
    #[error("file name \"{0}\" is empty after sanitization")]
    EmptyFileName(String),

    /// Extension exceeds the catalog column width.
    #[error("file extension is {len} chars (max {max})")]
    ExtensionTooLong {
        /// Actual extension length, including the leading dot.
        len: usize,
        /// Maximum permitted length.
        max: usize,
    },

    /// A free-text field exceeds its size limit.
    #[error("{field} is {len} bytes (max {max})")]
    FieldTooLong {
        /// Name of the offending field.
        field: &'static str,
        /// Actual size in bytes.
        len: usize,
        /// Maximum permitted size in bytes.
        max: usize,
    },
}
