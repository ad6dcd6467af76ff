//! # OpenAPI Specification Assembly
//!
//! Assembles the utoipa-documented routes into a single OpenAPI spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "ccweb API",
        version = "0.1.0",
        description = "Content-addressed file upload with deduplication and per-principal access grants.",
        license(name = "AGPL-3.0-or-later")
    ),
    paths(
        crate::routes::files::upload_file,
        crate::routes::files::list_files,
        crate::routes::files::get_file,
        crate::routes::files::download_file,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::files::FileRecord,
        crate::routes::files::UploadResponse,
        crate::routes::files::UploadForm,
    )),
    tags(
        (name = "files", description = "Upload, list and download content-addressed files"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json — Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_file_routes() {
        let spec = ApiDoc::openapi();
        let paths: Vec<&String> = spec.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/v1/files"));
        assert!(paths.iter().any(|p| p.as_str() == "/v1/files/{fingerprint}"));
        assert!(paths.iter().any(|p| p.as_str() == "/v1/files/{fingerprint}/content"));
    }
}
