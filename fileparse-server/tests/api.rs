//! HTTP status mapping for every endpoint, driven through the router.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use fileparse::{EngineSettings, JobEngine, MemoryRepository, UploadStorage};
use fileparse_server::{router, AppState};

const BOUNDARY: &str = "fileparse-test-boundary";

struct TestApp {
    _dir: TempDir,
    engine: Arc<JobEngine>,
    app: Router,
}

impl TestApp {
    fn new() -> Self {
        Self::with_limit(10 * 1024 * 1024)
    }

    fn with_limit(max_upload_bytes: u64) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(JobEngine::new(
            Arc::new(MemoryRepository::new()),
            Arc::new(UploadStorage::new(dir.path())),
            EngineSettings {
                workers: 2,
                ..EngineSettings::default()
            },
        ));
        let app = router(AppState::new(Arc::clone(&engine), max_upload_bytes));
        Self {
            _dir: dir,
            engine,
            app,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method(Method::DELETE)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    async fn upload(&self, field: &str, filename: &str, content: &[u8]) -> (StatusCode, Value) {
        self.send(multipart_request(field, filename, content)).await
    }

    /// Uploads a file and waits until its job is terminal.
    async fn upload_and_wait(&self, filename: &str, content: &[u8]) -> String {
        let (status, body) = self.upload("file", filename, content).await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        self.engine.drain();
        body["job_id"].as_str().unwrap().to_string()
    }
}

fn multipart_request(field: &str, filename: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/files")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let app = TestApp::new();
    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn upload_returns_created_with_job_id() {
    let app = TestApp::new();
    let (status, body) = app.upload("file", "people.csv", b"name\nAda\n").await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(body["job_id"].is_string());
    let job_status = body["status"].as_str().unwrap();
    assert!(
        ["processing", "ready"].contains(&job_status),
        "{}",
        job_status
    );
}

#[tokio::test]
async fn upload_without_file_field_is_bad_request() {
    let app = TestApp::new();
    let (status, body) = app.upload("attachment", "people.csv", b"name\nAda\n").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("file"));
    assert!(app.engine.list().unwrap().is_empty());
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let app = TestApp::with_limit(64);
    let (status, _body) = app.upload("file", "big.csv", &[b'a'; 4096]).await;
    assert!(status.is_client_error(), "{}", status);
}

#[tokio::test]
async fn progress_result_and_list_for_ready_job() {
    let app = TestApp::new();
    let id = app.upload_and_wait("people.csv", b"name,age\nAda,36\n").await;

    let (status, body) = app.get(&format!("/files/{}/progress", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "id": id, "status": "ready", "progress": 100 }));

    let (status, body) = app.get(&format!("/files/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.as_str());
    assert_eq!(body["filename"], "people.csv");
    assert_eq!(body["parsed_content"], json!([{ "name": "Ada", "age": 36 }]));

    let (status, body) = app.get("/files").await;
    assert_eq!(status, StatusCode::OK);
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["id"], id.as_str());
    assert!(entries[0].get("parsed_content").is_none());
    assert!(entries[0]["created_at"].is_string());
}

#[tokio::test]
async fn unsupported_upload_has_note() {
    let app = TestApp::new();
    let id = app.upload_and_wait("notes.xyz", b"whatever").await;

    let (status, body) = app.get(&format!("/files/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["parsed_content"], json!({ "note": "unsupported file type" }));
}

#[tokio::test]
async fn failed_job_result_is_accepted_not_ok() {
    let app = TestApp::new();
    let id = app.upload_and_wait("bad.csv", b"a,b\n1,2,3\n").await;

    let (status, body) = app.get(&format!("/files/{}/progress", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "failed");
    assert_eq!(body["progress"], 0);

    let (status, body) = app.get(&format!("/files/{}", id)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "failed");
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn uploading_job_result_is_accepted() {
    let app = TestApp::new();
    let record = app.engine.create("pending.csv").unwrap();

    let (status, body) = app.get(&format!("/files/{}", record.id)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "uploading");
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let app = TestApp::new();

    for uri in ["/files/missing", "/files/missing/progress"] {
        let (status, body) = app.get(uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert!(body["error"].is_string());
    }

    let (status, _) = app.delete("/files/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_then_everything_is_not_found() {
    let app = TestApp::new();
    let id = app.upload_and_wait("people.csv", b"name\nAda\n").await;

    let (status, body) = app.delete(&format!("/files/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "deleted": true }));

    let (status, _) = app.get(&format!("/files/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get(&format!("/files/{}/progress", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete(&format!("/files/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app.get("/files").await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn upload_after_shutdown_is_unavailable() {
    let app = TestApp::new();
    app.engine.shutdown();

    let (status, _) = app.upload("file", "late.csv", b"a\n1\n").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
