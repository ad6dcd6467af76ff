//! # Integration Tests for ccweb-api
//!
//! Drives the full router with `tower::ServiceExt::oneshot`: health probes,
//! authentication, multipart upload with deduplication, per-principal
//! listing, metadata lookup, blob download and OpenAPI generation.

use axum::body::{Body, Bytes};
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use tokio_stream::StreamExt;
use tower::ServiceExt;

use ccweb_api::state::{AppConfig, AppState};
use ccweb_core::PrincipalId;

const BOUNDARY: &str = "ccweb-test-boundary";
const SHA256_X: &str = "4b68ab3847feda7d6c62c1fbcbeebfa35eab7351ed5e78f4ddadea5df64b8015";

struct TestApp {
    _dir: tempfile::TempDir,
    state: AppState,
    router: axum::Router,
}

impl TestApp {
    fn with_config(f: impl FnOnce(&mut AppConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig {
            storage_dir: dir.path().join("files"),
            ..AppConfig::default()
        };
        f(&mut config);
        let state = AppState::new(config);
        state.files.blobs().ensure_dirs().unwrap();
        let router = ccweb_api::app(state.clone());
        Self {
            _dir: dir,
            state,
            router,
        }
    }

    fn new() -> Self {
        Self::with_config(|_| {})
    }

    async fn send(&self, request: Request<Body>) -> axum::http::Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    fn scratch_is_empty(&self) -> bool {
        std::fs::read_dir(self.state.files.blobs().scratch_dir())
            .unwrap()
            .next()
            .is_none()
    }
}

fn bearer(principal: PrincipalId) -> String {
    format!("Bearer {principal}")
}

fn multipart_body(filename: Option<&str>, content: &[u8], remark: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(name) = filename {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    if let Some(remark) = remark {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"remark\"\r\n\r\n{remark}\r\n").as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(auth: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/v1/files")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"));
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::from(body)).unwrap()
}

fn get_request(uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_bytes(response: axum::http::Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn body_json(response: axum::http::Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

async fn upload(app: &TestApp, principal: PrincipalId, name: &str, content: &[u8]) -> (StatusCode, serde_json::Value) {
    let response = app
        .send(upload_request(
            Some(&bearer(principal)),
            multipart_body(Some(name), content, Some("")),
        ))
        .await;
    let status = response.status();
    (status, body_json(response).await)
}

// -- Health Probes ------------------------------------------------------------

#[tokio::test]
async fn test_liveness_probe() {
    let app = TestApp::new();
    let response = app.send(get_request("/health/liveness", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"ok");
}

#[tokio::test]
async fn test_readiness_probe() {
    let app = TestApp::new();
    let response = app.send(get_request("/health/readiness", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"ready");
}

#[tokio::test]
async fn test_readiness_fails_without_storage() {
    let app = TestApp::new();
    std::fs::remove_dir_all(app.state.files.blobs().blob_dir()).unwrap();
    let response = app.send(get_request("/health/readiness", None)).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// -- Upload & Deduplication ---------------------------------------------------

#[tokio::test]
async fn test_upload_new_content_returns_201() {
    let app = TestApp::new();
    let u1 = PrincipalId::new();
    let (status, body) = upload(&app, u1, "a.srt", b"X").await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["is_new_content"], true);
    assert_eq!(body["file"]["fingerprint"], SHA256_X);
    assert_eq!(body["file"]["storage_key"], format!("{SHA256_X}.srt"));
    assert_eq!(body["file"]["original_name"], "a");
    assert_eq!(body["file"]["extension"], ".srt");
    assert_eq!(body["file"]["size_bytes"], 1);
    assert_eq!(body["file"]["uploader_id"], u1.to_string());

    let blob = app.state.files.blobs().blob_dir().join(format!("{SHA256_X}.srt"));
    assert_eq!(std::fs::read(blob).unwrap(), b"X");
    assert!(app.scratch_is_empty());
}

#[tokio::test]
async fn test_duplicate_upload_grants_access_without_new_object() {
    let app = TestApp::new();
    let u1 = PrincipalId::new();
    let u2 = PrincipalId::new();

    let (status, _) = upload(&app, u1, "a.srt", b"X").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = upload(&app, u2, "b.srt", b"X").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_new_content"], false);
    assert_eq!(body["file"]["original_name"], "a");
    assert_eq!(body["file"]["uploader_id"], u1.to_string());

    let response = app.send(get_request("/v1/files", Some(&bearer(u2)))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let list = body_json(response).await;
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["fingerprint"], SHA256_X);
    assert!(app.scratch_is_empty());
}

#[tokio::test]
async fn test_list_is_scoped_to_caller() {
    let app = TestApp::new();
    let u1 = PrincipalId::new();
    let u2 = PrincipalId::new();
    upload(&app, u1, "one.txt", b"first").await;
    upload(&app, u1, "two.txt", b"second").await;
    upload(&app, u2, "three.txt", b"third").await;

    let response = app.send(get_request("/v1/files", Some(&bearer(u1)))).await;
    let list = body_json(response).await;
    assert_eq!(list.as_array().unwrap().len(), 2);

    let response = app.send(get_request("/v1/files", Some(&bearer(PrincipalId::new())))).await;
    let list = body_json(response).await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_requires_authentication() {
    let app = TestApp::new();
    let response = app
        .send(upload_request(None, multipart_body(Some("a.srt"), b"X", None)))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_upload_without_file_part_is_bad_request() {
    let app = TestApp::new();
    let response = app
        .send(upload_request(
            Some(&bearer(PrincipalId::new())),
            multipart_body(None, b"", Some("just a remark")),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unusable_filename_is_rejected() {
    let app = TestApp::new();
    let response = app
        .send(upload_request(
            Some(&bearer(PrincipalId::new())),
            multipart_body(Some("../.."), b"X", None),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(app.scratch_is_empty());
}

#[tokio::test]
async fn test_path_components_are_stripped_from_filename() {
    let app = TestApp::new();
    let (status, body) = upload(&app, PrincipalId::new(), "../../etc/passwd", b"root").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["file"]["original_name"], "etc_passwd");
    assert_eq!(body["file"]["extension"], "");
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let app = TestApp::with_config(|c| c.max_upload_bytes = 256);
    let response = app
        .send(upload_request(
            Some(&bearer(PrincipalId::new())),
            multipart_body(Some("big.bin"), &vec![7u8; 4096], None),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(app.scratch_is_empty());
}

/// Multipart prefix that opens the `file` part and sends some content but
/// never reaches the closing boundary.
fn truncated_upload_head() -> Bytes {
    let mut head = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"part.bin\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    head.extend_from_slice(&[1u8; 1024]);
    Bytes::from(head)
}

fn streaming_upload_request<S>(principal: PrincipalId, stream: S) -> Request<Body>
where
    S: tokio_stream::Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static,
{
    Request::builder()
        .method("POST")
        .uri("/v1/files")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .header(header::AUTHORIZATION, bearer(principal))
        .body(Body::from_stream(stream))
        .unwrap()
}

#[tokio::test]
async fn test_broken_upload_stream_leaves_no_scratch() {
    let app = TestApp::new();
    let stream = tokio_stream::iter(vec![
        Ok(truncated_upload_head()),
        Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "client went away")),
    ]);
    let response = app.send(streaming_upload_request(PrincipalId::new(), stream)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.scratch_is_empty());

    let response = app.send(get_request("/v1/files", Some(&bearer(PrincipalId::new())))).await;
    assert!(body_json(response).await.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_abandoned_upload_removes_scratch() {
    let app = TestApp::new();
    let stream = tokio_stream::iter(vec![Ok::<_, std::io::Error>(truncated_upload_head())]).chain(tokio_stream::pending());
    let request = streaming_upload_request(PrincipalId::new(), stream);
    let router = app.router.clone();
    let task = tokio::spawn(async move { router.oneshot(request).await });

    // Wait until the handler has started spooling.
    let scratch_dir = app.state.files.blobs().scratch_dir().to_path_buf();
    let started = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while std::fs::read_dir(&scratch_dir).unwrap().next().is_none() {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(started.is_ok(), "upload never reached the scratch directory");

    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());
    assert!(app.scratch_is_empty());
}

// -- Lookup & Download --------------------------------------------------------

#[tokio::test]
async fn test_get_file_is_hidden_from_non_grantees() {
    let app = TestApp::new();
    let owner = PrincipalId::new();
    upload(&app, owner, "a.srt", b"X").await;
    let uri = format!("/v1/files/{SHA256_X}");

    let response = app.send(get_request(&uri, Some(&bearer(owner)))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["fingerprint"], SHA256_X);

    let response = app.send(get_request(&uri, Some(&bearer(PrincipalId::new())))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_unknown_file_is_not_found() {
    let app = TestApp::new();
    let uri = format!("/v1/files/{}", "0".repeat(64));
    let response = app.send(get_request(&uri, Some(&bearer(PrincipalId::new())))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_fingerprint_is_rejected() {
    let app = TestApp::new();
    let response = app
        .send(get_request("/v1/files/not-a-hash", Some(&bearer(PrincipalId::new()))))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_download_streams_blob_with_original_name() {
    let app = TestApp::new();
    let owner = PrincipalId::new();
    let content = b"1\n00:00:01,000 --> 00:00:02,000\nhello\n";
    let (_, body) = upload(&app, owner, "movie.srt", content).await;
    let fingerprint = body["file"]["fingerprint"].as_str().unwrap().to_string();

    let response = app
        .send(get_request(&format!("/v1/files/{fingerprint}/content"), Some(&bearer(owner))))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"movie.srt\""
    );
    assert_eq!(body_bytes(response).await, content);

    let response = app
        .send(get_request(
            &format!("/v1/files/{fingerprint}/content"),
            Some(&bearer(PrincipalId::new())),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// -- Authentication with a configured secret ----------------------------------

#[tokio::test]
async fn test_configured_secret_is_enforced() {
    let app = TestApp::with_config(|c| c.auth_token = Some("s3cret".into()));
    let p = PrincipalId::new();

    let response = app.send(get_request("/v1/files", Some(&format!("Bearer {p}:s3cret")))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.send(get_request("/v1/files", Some(&format!("Bearer {p}:wrong")))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.send(get_request("/v1/files", Some(&format!("Bearer {p}")))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// -- OpenAPI ------------------------------------------------------------------

#[tokio::test]
async fn test_openapi_spec_is_served() {
    let app = TestApp::new();
    let response = app.send(get_request("/openapi.json", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let doc = body_json(response).await;
    assert!(doc["paths"]["/v1/files"].is_object());
    assert_eq!(doc["info"]["title"], "ccweb API");
}
