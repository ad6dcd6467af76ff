//! Uploaded-file and access-grant persistence operations.
//!
//! The async functions take a `&PgPool` and operate on the
//! `uploaded_files` and `file_access` tables. [`PgCatalog`] adapts them to
//! the synchronous [`ObjectCatalog`] contract the ingestion engine uses.

use chrono::{DateTime, Utc};
use ccweb_core::{FileId, Fingerprint, NewObject, PrincipalId, StorageKey, StoredObject, Timestamp};
use ccweb_ingest::{CatalogError, ObjectCatalog};
use sqlx::PgPool;
use tokio::runtime::Handle;
use uuid::Uuid;

const FILE_COLUMNS: &str = "id, original_name, extension, hash, filename, size, \
     original_uploader, upload_timestamp, parameters, remark";

/// Insert a new file row, returning it as stored.
///
/// Fails with a unique violation if the hash is already present.
pub async fn insert(pool: &PgPool, object: &NewObject) -> Result<FileRow, sqlx::Error> {
    let size = i64::try_from(object.size_bytes).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
    sqlx::query_as::<_, FileRow>(&format!(
        "INSERT INTO uploaded_files (original_name, extension, hash, filename, size,
         original_uploader, upload_timestamp, parameters, remark)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         RETURNING {FILE_COLUMNS}"
    ))
    .bind(&object.original_name)
    .bind(&object.extension)
    .bind(object.fingerprint.to_hex())
    .bind(object.storage_key().as_str())
    .bind(size)
    .bind(object.uploader_id.as_uuid())
    .bind(object.uploaded_at.as_datetime())
    .bind(&object.parameters)
    .bind(&object.remark)
    .fetch_one(pool)
    .await
}

/// Fetch a file by content hash.
pub async fn get_by_hash(pool: &PgPool, hash: &str) -> Result<Option<FileRow>, sqlx::Error> {
    sqlx::query_as::<_, FileRow>(&format!(
        "SELECT {FILE_COLUMNS} FROM uploaded_files WHERE hash = $1"
    ))
    .bind(hash)
    .fetch_optional(pool)
    .await
}

/// Insert a grant if absent. Returns `true` if a row was created.
pub async fn grant(pool: &PgPool, principal: Uuid, file_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO file_access (principal_id, file_id) VALUES ($1, $2)
         ON CONFLICT (principal_id, file_id) DO NOTHING",
    )
    .bind(principal)
    .bind(file_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Whether `principal` holds a grant for the file with `hash`.
pub async fn has_grant(pool: &PgPool, principal: Uuid, hash: &str) -> Result<bool, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT f.id FROM file_access a
         JOIN uploaded_files f ON f.id = a.file_id
         WHERE a.principal_id = $1 AND f.hash = $2",
    )
    .bind(principal)
    .bind(hash)
    .fetch_optional(pool)
    .await?;

    Ok(row.is_some())
}

/// List files granted to `principal`, newest upload first.
pub async fn list_for_principal(pool: &PgPool, principal: Uuid) -> Result<Vec<FileRow>, sqlx::Error> {
    sqlx::query_as::<_, FileRow>(
        "SELECT f.id, f.original_name, f.extension, f.hash, f.filename, f.size,
         f.original_uploader, f.upload_timestamp, f.parameters, f.remark
         FROM uploaded_files f
         JOIN file_access a ON a.file_id = f.id
         WHERE a.principal_id = $1
         ORDER BY f.upload_timestamp DESC, f.id DESC",
    )
    .bind(principal)
    .fetch_all(pool)
    .await
}

/// Row type for SQLx mapping.
#[derive(Debug, sqlx::FromRow)]
pub struct FileRow {
    id: i64,
    original_name: String,
    extension: String,
    hash: String,
    filename: String,
    size: i64,
    original_uploader: Uuid,
    upload_timestamp: DateTime<Utc>,
    parameters: Option<String>,
    remark: String,
}

impl FileRow {
    fn into_object(self) -> Result<StoredObject, CatalogError> {
        let fingerprint = Fingerprint::from_hex(self.hash.trim())
            .map_err(|e| CatalogError::Backend(format!("row {}: {e}", self.id)))?;
        let size_bytes = u64::try_from(self.size)
            .map_err(|_| CatalogError::Backend(format!("row {}: negative size {}", self.id, self.size)))?;
        Ok(StoredObject {
            id: FileId::new(self.id),
            fingerprint,
            storage_key: StorageKey::from_stored(self.filename),
            original_name: self.original_name,
            extension: self.extension,
            size_bytes,
            uploader_id: PrincipalId::from_uuid(self.original_uploader),
            uploaded_at: Timestamp::from_datetime(self.upload_timestamp),
            parameters: self.parameters,
            remark: self.remark,
        })
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn backend(err: sqlx::Error) -> CatalogError {
    CatalogError::Backend(err.to_string())
}

// -- PgCatalog ----------------------------------------------------------------

/// PostgreSQL-backed [`ObjectCatalog`].
///
/// Each method drives the async query to completion on the runtime
/// `Handle`, so it must be called from a blocking worker
/// (`tokio::task::spawn_blocking`), never from an async task.
#[derive(Debug, Clone)]
pub struct PgCatalog {
    pool: PgPool,
    handle: Handle,
}

impl PgCatalog {
    /// Wrap a pool. `handle` is the runtime the pool was created on.
    pub fn new(pool: PgPool, handle: Handle) -> Self {
        Self { pool, handle }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl ObjectCatalog for PgCatalog {
    fn find_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Option<StoredObject>, CatalogError> {
        self.handle
            .block_on(get_by_hash(&self.pool, &fingerprint.to_hex()))
            .map_err(backend)?
            .map(FileRow::into_object)
            .transpose()
    }

    fn insert(&self, object: NewObject) -> Result<StoredObject, CatalogError> {
        match self.handle.block_on(insert(&self.pool, &object)) {
            Ok(row) => row.into_object(),
            Err(e) if is_unique_violation(&e) => Err(CatalogError::UniqueViolation(object.fingerprint)),
            Err(e) => Err(backend(e)),
        }
    }

    fn grant(&self, principal: PrincipalId, fingerprint: &Fingerprint) -> Result<bool, CatalogError> {
        self.handle.block_on(async {
            let row = get_by_hash(&self.pool, &fingerprint.to_hex())
                .await
                .map_err(backend)?
                .ok_or(CatalogError::NotFound(*fingerprint))?;
            grant(&self.pool, *principal.as_uuid(), row.id).await.map_err(backend)
        })
    }

    fn has_grant(&self, principal: PrincipalId, fingerprint: &Fingerprint) -> Result<bool, CatalogError> {
        self.handle
            .block_on(has_grant(&self.pool, *principal.as_uuid(), &fingerprint.to_hex()))
            .map_err(backend)
    }

    fn list_for_principal(&self, principal: PrincipalId) -> Result<Vec<StoredObject>, CatalogError> {
        self.handle
            .block_on(list_for_principal(&self.pool, *principal.as_uuid()))
            .map_err(backend)?
            .into_iter()
            .map(FileRow::into_object)
            .collect()
    }
}
