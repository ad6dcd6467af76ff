//! Ingestion error taxonomy.
//!
//! Duplicate content is not an error; it is reported through
//! [`Ingested::is_new_content`](crate::Ingested). A lost uniqueness race is
//! absorbed inside the engine and never reaches this type.

use ccweb_core::{StorageKey, ValidationError};
use thiserror::Error;

use crate::catalog::CatalogError;

/// Failure of an ingestion or access-ledger operation.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The source bytes could not be fully read. Nothing was persisted and
    /// the scratch file has been removed.
    #[error("failed to read upload stream: {0}")]
    StreamRead(#[source] std::io::Error),

    /// Promoting scratch bytes to permanent storage failed after the
    /// catalog row was committed. The row exists but its blob does not.
    #[error("failed to commit blob {key} to permanent storage: {source}")]
    StorageWrite {
        /// Key the blob should have been stored under.
        key: StorageKey,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A committed blob could not be read back.
    #[error("failed to read blob {key}: {source}")]
    StorageRead {
        /// Key of the blob being read.
        key: StorageKey,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The catalog rejected or failed an operation.
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Upload metadata was rejected before any bytes were committed.
    #[error("invalid upload: {0}")]
    Validation(#[from] ValidationError),
}
