//! # File Service
//!
//! The upload path a request handler calls. Every successful ingestion,
//! new or duplicate, ends with a grant for the acting principal, so
//! deduplication never hides content from the person who uploaded it.

use std::io::Read;

use ccweb_core::{Fingerprint, PrincipalId, StoredObject};

use crate::blob::{BlobStore, ScratchHandle};
use crate::catalog::ObjectCatalog;
use crate::engine::{IngestRequest, Ingested, IngestionEngine};
use crate::error::IngestError;
use crate::ledger::AccessLedger;

/// Ingestion plus access grants over one catalog and blob store.
#[derive(Debug, Clone)]
pub struct FileService<C, B> {
    engine: IngestionEngine<C, B>,
    ledger: AccessLedger<C>,
}

impl<C: ObjectCatalog + Clone, B: BlobStore> FileService<C, B> {
    /// Create a service. The engine and ledger share `catalog`.
    pub fn new(catalog: C, blobs: B) -> Self {
        Self {
            ledger: AccessLedger::new(catalog.clone()),
            engine: IngestionEngine::new(catalog, blobs),
        }
    }

    /// The ingestion engine.
    pub fn engine(&self) -> &IngestionEngine<C, B> {
        &self.engine
    }

    /// The access ledger.
    pub fn ledger(&self) -> &AccessLedger<C> {
        &self.ledger
    }

    /// The blob store.
    pub fn blobs(&self) -> &B {
        self.engine.blobs()
    }

    /// Ingest scratch bytes and grant the uploader access.
    pub fn accept_upload(&self, scratch: ScratchHandle, request: IngestRequest) -> Result<Ingested, IngestError> {
        let principal = request.principal;
        let ingested = self.engine.ingest(scratch, request)?;
        self.ledger.grant_access(principal, &ingested.object.fingerprint)?;
        Ok(ingested)
    }

    /// Spool `source` to scratch, ingest it, and grant the uploader access.
    pub fn accept_reader(&self, source: &mut dyn Read, request: IngestRequest) -> Result<Ingested, IngestError> {
        let principal = request.principal;
        let ingested = self.engine.ingest_reader(source, request)?;
        self.ledger.grant_access(principal, &ingested.object.fingerprint)?;
        Ok(ingested)
    }

    /// Objects `principal` may retrieve, newest first.
    pub fn list_accessible(&self, principal: PrincipalId) -> Result<Vec<StoredObject>, IngestError> {
        self.ledger.list_accessible(principal)
    }

    /// The object if `principal` may retrieve it.
    pub fn accessible_object(
        &self,
        principal: PrincipalId,
        fingerprint: &Fingerprint,
    ) -> Result<Option<StoredObject>, IngestError> {
        self.ledger.accessible_object(principal, fingerprint)
    }

    /// Open the blob of an object `principal` may retrieve.
    ///
    /// `Ok(None)` covers unknown objects, missing grants, and cataloged
    /// objects whose blob is missing.
    pub fn open_accessible(
        &self,
        principal: PrincipalId,
        fingerprint: &Fingerprint,
    ) -> Result<Option<(StoredObject, B::BlobReader)>, IngestError> {
        let Some(object) = self.accessible_object(principal, fingerprint)? else {
            return Ok(None);
        };
        match self.blobs().open(&object.storage_key) {
            Ok(Some(reader)) => Ok(Some((object, reader))),
            Ok(None) => {
                tracing::warn!(
                    fingerprint = %object.fingerprint,
                    storage_key = %object.storage_key,
                    "granted object has no blob"
                );
                Ok(None)
            }
            Err(e) => Err(IngestError::StorageRead {
                key: object.storage_key,
                source: e,
            }),
        }
    }
}
