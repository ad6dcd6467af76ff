#![deny(missing_docs)]

//! # ccweb-core — Foundational Types for ccweb
//!
//! This crate defines the types every other crate in the workspace depends
//! on. It has no internal crate dependencies, only `serde`, `serde_json`,
//! `thiserror`, `chrono`, `uuid`, and `sha2` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **[`Fingerprint`] is the identity of stored content.** It is computed
//!    by streaming the bytes through SHA-256 in [`CHUNK_SIZE`] chunks, so
//!    memory use never depends on upload size.
//!
//! 2. **Newtype wrappers for identifiers.** A [`PrincipalId`] cannot be
//!    passed where a [`FileId`] is expected.
//!
//! 3. **UTC-only timestamps.** [`Timestamp`] normalizes local capture time
//!    to UTC and treats naive input as UTC.
//!
//! 4. **Validated upload names.** [`UploadName`] strips path components and
//!    unsafe characters before a client filename touches storage or the
//!    catalog.

pub mod digest;
pub mod error;
pub mod identity;
pub mod object;
pub mod temporal;
pub mod upload;

// Re-export primary types at crate root for ergonomic imports.
pub use digest::{fingerprint_reader, sha256_bytes, Fingerprint, Sha256Accumulator, CHUNK_SIZE};
pub use error::ValidationError;
pub use identity::{FileId, PrincipalId};
pub use object::{NewObject, StorageKey, StoredObject};
pub use temporal::Timestamp;
pub use upload::{UploadMetadata, UploadName};
