//! # Files API
//!
//! Authenticated upload, listing and download of content-addressed files.
//!
//! Uploads are multipart: the `file` part is streamed chunk by chunk into
//! a scratch file, never buffered whole, and ingestion then runs on a
//! blocking worker. Lookups answer 404 both for unknown fingerprints and
//! for objects the caller holds no grant for.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ccweb_core::{Fingerprint, StoredObject, UploadMetadata, UploadName, CHUNK_SIZE};
use ccweb_ingest::{FsBlobStore, IngestRequest, ScratchHandle};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio_stream::wrappers::ReceiverStream;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{require_principal, Session};
use crate::error::AppError;
use crate::state::AppState;

// -- DTOs ---------------------------------------------------------------------

/// A stored file as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileRecord {
    /// Catalog row identifier.
    pub id: i64,
    /// Hex SHA-256 of the content.
    pub fingerprint: String,
    /// Permanent blob name (`fingerprint + extension`).
    pub storage_key: String,
    /// Filename stem from the first upload.
    pub original_name: String,
    /// Extension from the first upload, with its dot.
    pub extension: String,
    pub size_bytes: u64,
    /// Principal who first uploaded the content.
    pub uploader_id: Uuid,
    pub uploaded_at: DateTime<Utc>,
    pub parameters: Option<String>,
    pub remark: String,
}

impl From<StoredObject> for FileRecord {
    fn from(obj: StoredObject) -> Self {
        Self {
            id: obj.id.get(),
            fingerprint: obj.fingerprint.to_hex(),
            storage_key: obj.storage_key.as_str().to_string(),
            original_name: obj.original_name,
            extension: obj.extension,
            size_bytes: obj.size_bytes,
            uploader_id: *obj.uploader_id.as_uuid(),
            uploaded_at: *obj.uploaded_at.as_datetime(),
            parameters: obj.parameters,
            remark: obj.remark,
        }
    }
}

/// Result of an upload.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub file: FileRecord,
    /// `false` when identical content was already stored; the caller has
    /// been granted access to the existing file.
    pub is_new_content: bool,
}

/// Multipart form accepted by `POST /v1/files`.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    /// The file content. Its filename is sanitized before use.
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
    /// Processing parameters (optional).
    parameters: Option<String>,
    /// Free-form remark (optional, may be empty).
    remark: Option<String>,
}

/// Build the files router.
///
/// `max_upload_bytes` caps the request body of uploads only.
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/v1/files",
            post(upload_file)
                .layer(DefaultBodyLimit::max(max_upload_bytes))
                .get(list_files),
        )
        .route("/v1/files/{fingerprint}", get(get_file))
        .route("/v1/files/{fingerprint}/content", get(download_file))
}

// -- Scratch spooling ---------------------------------------------------------

/// A scratch file being written by a request; removed on drop unless handed
/// to the ingestion engine.
struct Spool {
    path: PathBuf,
    handle: Option<ScratchHandle>,
}

impl Spool {
    fn into_handle(mut self) -> Option<ScratchHandle> {
        self.handle.take()
    }
}

impl Drop for Spool {
    fn drop(&mut self) {
        if self.handle.is_none() {
            return;
        }
        // One unlink, done inline so the file is gone before the error
        // response is sent.
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove spooled upload");
            }
        }
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(err.body_text())
    }
}

async fn spool_field(blobs: &FsBlobStore, mut field: Field<'_>) -> Result<Spool, AppError> {
    tokio::fs::create_dir_all(blobs.scratch_dir())
        .await
        .map_err(|e| AppError::Internal(format!("cannot create scratch dir: {e}")))?;

    let handle = ScratchHandle::new();
    let spool = Spool {
        path: blobs.scratch_path(&handle),
        handle: Some(handle),
    };
    // Opened without an await so a dropped request cannot leave a file the
    // guard never saw.
    let file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&spool.path)
        .map_err(|e| AppError::Internal(format!("cannot create scratch file: {e}")))?;
    let mut file = tokio::fs::File::from_std(file);

    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        file.write_all(&chunk)
            .await
            .map_err(|e| AppError::Internal(format!("scratch write failed: {e}")))?;
    }
    file.flush()
        .await
        .map_err(|e| AppError::Internal(format!("scratch flush failed: {e}")))?;

    Ok(spool)
}

fn parse_fingerprint(raw: &str) -> Result<Fingerprint, AppError> {
    Ok(Fingerprint::from_hex(raw)?)
}

// -- Handlers -----------------------------------------------------------------

/// POST /v1/files — Upload a file.
#[utoipa::path(
    post,
    path = "/v1/files",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "New content stored", body = UploadResponse),
        (status = 200, description = "Content already stored; access granted", body = UploadResponse),
        (status = 400, description = "Malformed upload", body = crate::error::ErrorBody),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorBody),
        (status = 413, description = "Upload too large", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid filename or metadata", body = crate::error::ErrorBody),
    ),
    tag = "files"
)]
pub async fn upload_file(
    State(state): State<AppState>,
    session: Session,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let principal = require_principal(&session)?;
    let blobs = state.files.blobs().clone();

    let mut upload: Option<(UploadName, Spool)> = None;
    let mut parameters: Option<String> = None;
    let mut remark = String::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("file") => {
                if upload.is_some() {
                    return Err(AppError::BadRequest("only one file part is allowed".into()));
                }
                let raw_name = field
                    .file_name()
                    .ok_or_else(|| AppError::BadRequest("file part has no filename".into()))?
                    .to_string();
                let name = UploadName::parse(&raw_name)?;
                let spool = spool_field(&blobs, field).await?;
                upload = Some((name, spool));
            }
            Some("parameters") => {
                let text = field.text().await.map_err(multipart_error)?;
                parameters = (!text.is_empty()).then_some(text);
            }
            Some("remark") => {
                remark = field.text().await.map_err(multipart_error)?;
            }
            _ => {}
        }
    }

    let (name, spool) = upload.ok_or_else(|| AppError::BadRequest("missing file part".into()))?;
    let metadata = UploadMetadata::new(parameters, remark)?;
    let scratch = spool
        .into_handle()
        .ok_or_else(|| AppError::Internal("spooled upload lost its scratch handle".into()))?;
    let request = IngestRequest {
        name,
        principal,
        metadata,
    };

    let files = Arc::clone(&state.files);
    let ingested = tokio::task::spawn_blocking(move || files.accept_upload(scratch, request)).await??;

    let status = if ingested.is_new_content {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(UploadResponse {
            file: ingested.object.into(),
            is_new_content: ingested.is_new_content,
        }),
    ))
}

/// GET /v1/files — List files the caller may retrieve.
#[utoipa::path(
    get,
    path = "/v1/files",
    responses(
        (status = 200, description = "Accessible files, newest first", body = Vec<FileRecord>),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorBody),
    ),
    tag = "files"
)]
pub async fn list_files(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<FileRecord>>, AppError> {
    let principal = require_principal(&session)?;
    let files = Arc::clone(&state.files);
    let objects = tokio::task::spawn_blocking(move || files.list_accessible(principal)).await??;
    Ok(Json(objects.into_iter().map(FileRecord::from).collect()))
}

/// GET /v1/files/{fingerprint} — Get file metadata.
#[utoipa::path(
    get,
    path = "/v1/files/{fingerprint}",
    params(("fingerprint" = String, Path, description = "Hex SHA-256 of the content")),
    responses(
        (status = 200, description = "File found", body = FileRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "files"
)]
pub async fn get_file(
    State(state): State<AppState>,
    session: Session,
    Path(fingerprint): Path<String>,
) -> Result<Json<FileRecord>, AppError> {
    let principal = require_principal(&session)?;
    let fp = parse_fingerprint(&fingerprint)?;
    let files = Arc::clone(&state.files);
    let object = tokio::task::spawn_blocking(move || files.accessible_object(principal, &fp))
        .await??
        .ok_or_else(|| AppError::NotFound(format!("file {fingerprint} not found")))?;
    Ok(Json(object.into()))
}

/// GET /v1/files/{fingerprint}/content — Download file content.
#[utoipa::path(
    get,
    path = "/v1/files/{fingerprint}/content",
    params(("fingerprint" = String, Path, description = "Hex SHA-256 of the content")),
    responses(
        (status = 200, description = "File bytes as an attachment"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "files"
)]
pub async fn download_file(
    State(state): State<AppState>,
    session: Session,
    Path(fingerprint): Path<String>,
) -> Result<Response, AppError> {
    let principal = require_principal(&session)?;
    let fp = parse_fingerprint(&fingerprint)?;
    let files = Arc::clone(&state.files);
    let (object, reader) = tokio::task::spawn_blocking(move || files.open_accessible(principal, &fp))
        .await??
        .ok_or_else(|| AppError::NotFound(format!("file {fingerprint} not found")))?;

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", object.display_name()))
        .map_err(|e| AppError::Internal(format!("bad content-disposition: {e}")))?;

    let body = Body::from_stream(ReceiverStream::new(stream_blob(reader)));
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/octet-stream")),
            (header::CONTENT_LENGTH, HeaderValue::from(object.size_bytes)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

/// Read `reader` on a blocking worker, forwarding chunks over a channel.
fn stream_blob<R: Read + Send + 'static>(
    mut reader: R,
) -> tokio::sync::mpsc::Receiver<Result<Bytes, std::io::Error>> {
    let (tx, rx) = tokio::sync::mpsc::channel(4);
    tokio::task::spawn_blocking(move || {
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.blocking_send(Ok(Bytes::copy_from_slice(&buf[..n]))).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "blob read failed mid-download");
                    let _ = tx.blocking_send(Err(e));
                    break;
                }
            }
        }
    });
    rx
}
