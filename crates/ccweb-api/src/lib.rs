//! # ccweb-api — Axum API for Content-Addressed Uploads
//!
//! HTTP surface over the ingestion core in `ccweb-ingest`. Every upload is
//! fingerprinted, deduplicated against the catalog, and granted to the
//! uploading principal.
//!
//! ## API Surface
//!
//! | Method | Path                               | Handler                           |
//! |--------|------------------------------------|-----------------------------------|
//! | POST   | `/v1/files`                        | [`routes::files::upload_file`]    |
//! | GET    | `/v1/files`                        | [`routes::files::list_files`]     |
//! | GET    | `/v1/files/{fingerprint}`          | [`routes::files::get_file`]       |
//! | GET    | `/v1/files/{fingerprint}/content`  | [`routes::files::download_file`]  |
//! | GET    | `/openapi.json`                    | [`openapi`]                       |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → AuthMiddleware → Handler
//! ```

pub mod auth;
pub mod db;
pub mod error;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::routing::get;
use axum::Router;

use crate::auth::AuthConfig;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes (`/health/*`) are mounted outside the auth middleware
/// so they remain accessible without credentials.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };

    let api = Router::new()
        .merge(routes::files::router(state.config.max_upload_bytes))
        .merge(openapi::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(middleware::tracing_layer::layer())
        .layer(axum::Extension(auth_config))
        .with_state(state.clone());

    let health = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .with_state(state);

    Router::new().merge(health).merge(api)
}

/// Liveness probe. Always 200 while the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: 200 when the storage directory is present and the
/// database (if configured) answers.
async fn readiness(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if tokio::fs::metadata(state.files.blobs().blob_dir()).await.is_err() {
        tracing::warn!("readiness: storage directory missing");
        return (StatusCode::SERVICE_UNAVAILABLE, "storage unavailable");
    }
    if let Some(pool) = &state.db_pool {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!(error = %e, "readiness: database ping failed");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unavailable");
        }
    }
    (StatusCode::OK, "ready")
}
