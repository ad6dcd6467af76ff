//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! ## Architecture
//!
//! AppState holds:
//! - **Files** — the [`FileService`] (ingestion engine + access ledger)
//!   over the configured catalog and the filesystem blob store
//! - **Config** — runtime configuration (port, storage paths, limits, auth)
//! - **Database pool** — present when `DATABASE_URL` is set
//!
//! The ingestion core is synchronous. Handlers run every catalog or blob
//! operation on a blocking worker, which is also what lets [`PgCatalog`]
//! drive its queries with `Handle::block_on`.

use std::path::PathBuf;
use std::sync::Arc;

use ccweb_core::{Fingerprint, NewObject, PrincipalId, StoredObject};
use ccweb_ingest::{CatalogError, FileService, FsBlobStore, MemoryCatalog, ObjectCatalog};
use sqlx::PgPool;

use crate::db::PgCatalog;

// -- Configuration ------------------------------------------------------------

/// Deployment profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Profile {
    /// Human-readable logs, auth optional.
    #[default]
    Development,
    /// JSON logs, auth token required.
    Production,
    /// Like development, for a single workstation.
    Local,
}

impl Profile {
    /// Whether logs should be emitted as JSON.
    pub fn json_logs(self) -> bool {
        matches!(self, Self::Production)
    }

    /// Whether startup requires an auth token.
    pub fn requires_auth(self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Default upload size limit: 512 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// Application configuration.
///
/// Custom `Debug` redacts the auth token.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Directory for permanent content-addressed blobs.
    pub storage_dir: PathBuf,
    /// Directory for in-flight uploads. Defaults to `{storage_dir}/tmp`.
    pub scratch_dir: Option<PathBuf>,
    /// Largest accepted request body for uploads.
    pub max_upload_bytes: usize,
    /// Deployment profile.
    pub profile: Profile,
    /// Shared secret for bearer tokens. If `None`, the secret part of the
    /// token is not checked.
    pub auth_token: Option<String>,
}

impl AppConfig {
    /// Build the blob store described by this configuration.
    pub fn blob_store(&self) -> FsBlobStore {
        match &self.scratch_dir {
            Some(scratch) => FsBlobStore::new(&self.storage_dir, scratch),
            None => FsBlobStore::with_default_scratch(&self.storage_dir),
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("storage_dir", &self.storage_dir)
            .field("scratch_dir", &self.scratch_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("profile", &self.profile)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            storage_dir: PathBuf::from("files"),
            scratch_dir: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            profile: Profile::default(),
            auth_token: None,
        }
    }
}

// -- Catalog Backend ----------------------------------------------------------

/// The catalog selected at startup.
#[derive(Debug, Clone)]
pub enum CatalogBackend {
    /// In-memory catalog; state is lost on restart.
    Memory(MemoryCatalog),
    /// PostgreSQL catalog.
    Postgres(PgCatalog),
}

impl ObjectCatalog for CatalogBackend {
    fn find_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Option<StoredObject>, CatalogError> {
        match self {
            Self::Memory(c) => c.find_by_fingerprint(fingerprint),
            Self::Postgres(c) => c.find_by_fingerprint(fingerprint),
        }
    }

    fn insert(&self, object: NewObject) -> Result<StoredObject, CatalogError> {
        match self {
            Self::Memory(c) => c.insert(object),
            Self::Postgres(c) => c.insert(object),
        }
    }

    fn grant(&self, principal: PrincipalId, fingerprint: &Fingerprint) -> Result<bool, CatalogError> {
        match self {
            Self::Memory(c) => c.grant(principal, fingerprint),
            Self::Postgres(c) => c.grant(principal, fingerprint),
        }
    }

    fn has_grant(&self, principal: PrincipalId, fingerprint: &Fingerprint) -> Result<bool, CatalogError> {
        match self {
            Self::Memory(c) => c.has_grant(principal, fingerprint),
            Self::Postgres(c) => c.has_grant(principal, fingerprint),
        }
    }

    fn list_for_principal(&self, principal: PrincipalId) -> Result<Vec<StoredObject>, CatalogError> {
        match self {
            Self::Memory(c) => c.list_for_principal(principal),
            Self::Postgres(c) => c.list_for_principal(principal),
        }
    }
}

/// The file service as wired by the API.
pub type Files = FileService<CatalogBackend, FsBlobStore>;

// -- AppState -----------------------------------------------------------------

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub files: Arc<Files>,
    pub config: Arc<AppConfig>,
    pub db_pool: Option<PgPool>,
}

impl AppState {
    /// State with an in-memory catalog.
    pub fn new(config: AppConfig) -> Self {
        Self::with_catalog(config, CatalogBackend::Memory(MemoryCatalog::new()), None)
    }

    /// State backed by `pool` if present, otherwise in memory.
    ///
    /// Must be called from within the Tokio runtime the pool runs on.
    pub fn with_pool(config: AppConfig, pool: Option<PgPool>) -> Self {
        match pool {
            Some(pool) => {
                let catalog = PgCatalog::new(pool.clone(), tokio::runtime::Handle::current());
                Self::with_catalog(config, CatalogBackend::Postgres(catalog), Some(pool))
            }
            None => Self::new(config),
        }
    }

    fn with_catalog(config: AppConfig, catalog: CatalogBackend, db_pool: Option<PgPool>) -> Self {
        let files = FileService::new(catalog, config.blob_store());
        Self {
            files: Arc::new(files),
            config: Arc::new(config),
            db_pool,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_debug_redacts_token() {
        let config = AppConfig {
            auth_token: Some("super-secret".into()),
            ..AppConfig::default()
        };
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn default_scratch_is_under_storage() {
        let config = AppConfig {
            storage_dir: PathBuf::from("/srv/files"),
            ..AppConfig::default()
        };
        let store = config.blob_store();
        assert_eq!(store.scratch_dir(), PathBuf::from("/srv/files/tmp"));
    }

    #[test]
    fn explicit_scratch_dir_is_used() {
        let config = AppConfig {
            storage_dir: PathBuf::from("/srv/files"),
            scratch_dir: Some(PathBuf::from("/srv/scratch")),
            ..AppConfig::default()
        };
        assert_eq!(config.blob_store().scratch_dir(), PathBuf::from("/srv/scratch"));
    }

    #[test]
    fn only_production_requires_auth() {
        assert!(Profile::Production.requires_auth());
        assert!(Profile::Production.json_logs());
        assert!(!Profile::Development.requires_auth());
        assert!(!Profile::Local.json_logs());
    }

    #[test]
    fn memory_state_has_no_pool() {
        let state = AppState::new(AppConfig::default());
        assert!(state.db_pool.is_none());
        assert!(matches!(state.files.engine().catalog(), CatalogBackend::Memory(_)));
    }
}
