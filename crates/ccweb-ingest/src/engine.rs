//! # Ingestion Engine
//!
//! Fingerprints scratch bytes, decides whether the content is already
//! cataloged, and commits novel content under its content-addressed key.
//!
//! ## Commit Ordering
//!
//! ```text
//! scratch ─▶ fingerprint ─▶ find ──found──▶ remove scratch, duplicate
//!                             │
//!                          missing
//!                             ▼
//!                    insert catalog row ──UniqueViolation──▶ re-find, duplicate
//!                             │
//!                             ▼
//!                  rename scratch → {fingerprint}{extension}
//! ```
//!
//! The catalog row is committed before the rename and no transaction spans
//! both steps. A crash or rename failure in between leaves a row whose blob
//! is missing. The engine reports it as [`IngestError::StorageWrite`] and
//! does not repair it; later duplicate hits on such a row log a warning.
//!
//! ## Concurrent Uploads
//!
//! Two uploads of the same novel content may both miss on `find`. The
//! catalog's uniqueness check lets exactly one insert win; the loser
//! re-reads the winner's row and takes the duplicate path. The race is
//! never surfaced to the caller.
//!
//! ## Scratch Lifetime
//!
//! A private scratch guard owns the scratch handle for the whole call and removes
//! it on every exit that does not end in a successful rename.

use std::io::Read;

use ccweb_core::{
    fingerprint_reader, NewObject, PrincipalId, StorageKey, StoredObject, Timestamp, UploadMetadata,
    UploadName,
};

use crate::blob::{BlobStore, ScratchHandle};
use crate::catalog::{CatalogError, ObjectCatalog};
use crate::error::IngestError;

/// Everything the caller knows about an upload besides its bytes.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Sanitized client filename.
    pub name: UploadName,
    /// The authenticated principal performing the upload.
    pub principal: PrincipalId,
    /// Free-text fields captured on first ingestion only.
    pub metadata: UploadMetadata,
}

/// Outcome of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ingested {
    /// The cataloged object, either freshly created or pre-existing.
    pub object: StoredObject,
    /// `false` when the content was already cataloged.
    pub is_new_content: bool,
}

/// Deduplicating, content-addressed ingestion over a catalog and a blob
/// store.
#[derive(Debug, Clone)]
pub struct IngestionEngine<C, B> {
    catalog: C,
    blobs: B,
}

impl<C: ObjectCatalog, B: BlobStore> IngestionEngine<C, B> {
    /// Create an engine over the given collaborators.
    pub fn new(catalog: C, blobs: B) -> Self {
        Self { catalog, blobs }
    }

    /// The catalog this engine commits to.
    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// The blob store this engine commits to.
    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    /// Spool `source` into scratch storage, then [`ingest`](Self::ingest) it.
    ///
    /// Metadata is validated before any bytes are written.
    pub fn ingest_reader(&self, source: &mut dyn Read, request: IngestRequest) -> Result<Ingested, IngestError> {
        request.metadata.validate()?;
        let scratch = self.blobs.write_scratch(source).map_err(IngestError::StreamRead)?;
        self.ingest(scratch, request)
    }

    /// Ingest bytes already present in scratch storage.
    ///
    /// Takes ownership of `scratch`: on return it has either been renamed
    /// to its permanent key or removed.
    pub fn ingest(&self, scratch: ScratchHandle, request: IngestRequest) -> Result<Ingested, IngestError> {
        let guard = ScratchGuard::new(&self.blobs, scratch);
        request.metadata.validate()?;

        let reader = self.blobs.open_scratch(guard.handle()).map_err(IngestError::StreamRead)?;
        let (fingerprint, hashed_len) = fingerprint_reader(reader).map_err(IngestError::StreamRead)?;
        let size_bytes = self.blobs.size_of(guard.handle()).map_err(IngestError::StreamRead)?;
        if size_bytes != hashed_len {
            return Err(IngestError::StreamRead(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("scratch size {size_bytes} does not match {hashed_len} hashed bytes"),
            )));
        }

        if let Some(existing) = self.catalog.find_by_fingerprint(&fingerprint)? {
            return Ok(self.duplicate(existing, request.principal));
        }

        let (original_name, extension) = request.name.into_parts();
        let new = NewObject {
            fingerprint,
            original_name,
            extension,
            size_bytes,
            uploader_id: request.principal,
            uploaded_at: Timestamp::now(),
            parameters: request.metadata.parameters,
            remark: request.metadata.remark,
        };
        let key = new.storage_key();

        let object = match self.catalog.insert(new) {
            Ok(object) => object,
            Err(CatalogError::UniqueViolation(fp)) => {
                tracing::debug!(
                    fingerprint = %fp,
                    principal = %request.principal,
                    "lost insert race; falling back to duplicate path"
                );
                let existing = self
                    .catalog
                    .find_by_fingerprint(&fp)?
                    .ok_or(CatalogError::NotFound(fp))?;
                return Ok(self.duplicate(existing, request.principal));
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(source) = guard.promote(&key) {
            tracing::error!(
                fingerprint = %object.fingerprint,
                storage_key = %key,
                error = %source,
                "catalog row committed but blob rename failed"
            );
            return Err(IngestError::StorageWrite { key, source });
        }

        tracing::info!(
            fingerprint = %object.fingerprint,
            principal = %request.principal,
            size_bytes = object.size_bytes,
            is_new_content = true,
            "ingested new content"
        );
        Ok(Ingested {
            object,
            is_new_content: true,
        })
    }

    fn duplicate(&self, existing: StoredObject, principal: PrincipalId) -> Ingested {
        match self.blobs.contains(&existing.storage_key) {
            Ok(true) => {}
            Ok(false) => tracing::warn!(
                fingerprint = %existing.fingerprint,
                storage_key = %existing.storage_key,
                "cataloged object has no blob"
            ),
            Err(e) => tracing::warn!(
                storage_key = %existing.storage_key,
                error = %e,
                "could not check blob presence"
            ),
        }
        tracing::info!(
            fingerprint = %existing.fingerprint,
            principal = %principal,
            size_bytes = existing.size_bytes,
            is_new_content = false,
            "ingested duplicate content"
        );
        Ingested {
            object: existing,
            is_new_content: false,
        }
    }
}

// ---------------------------------------------------------------------------
// ScratchGuard
// ---------------------------------------------------------------------------

/// Removes the scratch file on drop unless it was promoted.
struct ScratchGuard<'a, B: BlobStore> {
    blobs: &'a B,
    handle: ScratchHandle,
    armed: bool,
}

impl<'a, B: BlobStore> ScratchGuard<'a, B> {
    fn new(blobs: &'a B, handle: ScratchHandle) -> Self {
        Self {
            blobs,
            handle,
            armed: true,
        }
    }

    fn handle(&self) -> &ScratchHandle {
        &self.handle
    }

    fn promote(mut self, key: &StorageKey) -> std::io::Result<()> {
        self.blobs.rename(&self.handle, key)?;
        self.armed = false;
        Ok(())
    }
}

impl<B: BlobStore> Drop for ScratchGuard<'_, B> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = self.blobs.remove(&self.handle) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(scratch = %self.handle, error = %e, "failed to remove scratch file");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
