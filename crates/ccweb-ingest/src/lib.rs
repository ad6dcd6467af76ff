//! # ccweb-ingest — Content-Addressed Upload Ingestion
//!
//! Turns an uploaded byte stream into a deduplicated, content-addressed
//! blob plus a catalog record, and records which principals may retrieve
//! it.
//!
//! ```text
//! upload handler ─▶ IngestionEngine ─▶ BlobStore (scratch → permanent)
//!                         │
//!                         └──────────▶ ObjectCatalog ◀── AccessLedger
//! ```
//!
//! - [`blob`] — durable storage boundary: scratch files and permanent blobs.
//! - [`catalog`] — relational persistence boundary for stored objects and
//!   access grants, with an in-memory implementation.
//! - [`engine`] — fingerprinting, duplicate detection, and commit ordering.
//! - [`ledger`] — idempotent access grants keyed by fingerprint.
//! - [`service`] — the upload path a request handler calls: ingest, then
//!   grant the acting principal.
//!
//! ## Execution Model
//!
//! Every operation is synchronous and request-scoped. Nothing here spawns
//! background work. Async callers run the service on a blocking worker.

pub mod blob;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod service;

pub use blob::{BlobStore, FsBlobStore, ScratchHandle};
pub use catalog::{CatalogError, MemoryCatalog, ObjectCatalog};
pub use engine::{IngestRequest, Ingested, IngestionEngine};
pub use error::IngestError;
pub use ledger::AccessLedger;
pub use service::FileService;
