//! End-to-end scenarios against the HTTP router with a scripted engine
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use typeset_core::domain::job::{JobId, JobStatus};
use typeset_server::{
    api,
    config::RendererConfig,
    renderer::{RenderInvoker, RenderPool},
    repository::{MemoryStatusStore, StatusStore},
    service::{QueryService, SubmissionService},
    state::AppState,
    storage::JobDirectoryStore,
};

const BOUNDARY: &str = "typeset-test-boundary";

struct Part {
    field: &'static str,
    file_name: &'static str,
    content: Vec<u8>,
}

fn part(field: &'static str, file_name: &'static str, content: impl AsRef<[u8]>) -> Part {
    Part {
        field,
        file_name,
        content: content.as_ref().to_vec(),
    }
}

/// Copies the source to the artifact unless it asks to fail
const ENGINE: &str = r#"#!/bin/sh
grep -q 'FAIL' "$1" && exit 1
cp "$1" main.pdf
"#;

/// Same as `ENGINE`, but stays in `processing` long enough to be observed
const SLOW_ENGINE: &str = r#"#!/bin/sh
sleep 0.3
cp "$1" main.pdf
"#;

const BODY_LIMIT: usize = 1024 * 1024;

struct TestApp {
    router: Router,
    statuses: Arc<MemoryStatusStore>,
    jobs_root: PathBuf,
    _tmp: TempDir,
}

impl TestApp {
    fn new() -> Self {
        Self::with(ENGINE, BODY_LIMIT)
    }

    fn with(script: &str, body_limit: usize) -> Self {
        let tmp = TempDir::new().unwrap();
        let engine = tmp.path().join("engine.sh");
        std::fs::write(&engine, script).unwrap();
        std::fs::set_permissions(&engine, std::fs::Permissions::from_mode(0o755)).unwrap();

        let statuses = Arc::new(MemoryStatusStore::new());
        let directories = JobDirectoryStore::new(tmp.path().join("jobs")).unwrap();
        let renderer = RendererConfig {
            program: engine,
            timeout: Some(Duration::from_secs(10)),
            ..RendererConfig::default()
        };

        let invoker = Arc::new(RenderInvoker::new(
            statuses.clone(),
            directories.clone(),
            renderer.clone(),
        ));
        let (pool, _dispatcher) = RenderPool::start(invoker, 2, 16);

        let state = AppState::new(
            SubmissionService::new(statuses.clone(), directories.clone(), pool),
            QueryService::new(statuses.clone(), directories.clone(), renderer.artifact_file),
        );

        Self {
            router: api::create_router(state, body_limit),
            statuses,
            jobs_root: directories.root().to_path_buf(),
            _tmp: tmp,
        }
    }

    async fn get(&self, uri: &str) -> (StatusCode, Vec<u8>, axum::http::HeaderMap) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec(), headers)
    }

    async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let (status, body, _) = self.get(uri).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn submit(&self, parts: &[Part], webhook: Option<&str>) -> (StatusCode, Value) {
        self.submit_raw(multipart_body(parts), webhook).await
    }

    /// Post `body` as-is under the test boundary
    async fn submit_raw(&self, body: Vec<u8>, webhook: Option<&str>) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method("POST")
            .uri("/document")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            );
        if let Some(url) = webhook {
            request = request.header("x-webhook-url", url);
        }
        let request = request.body(Body::from(body)).unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    /// Poll the state endpoint until the job leaves pending/processing
    async fn wait_settled(&self, job_id: &str) -> String {
        let states = self.poll_states(job_id, Duration::from_millis(10)).await;
        states.last().cloned().unwrap()
    }

    /// Every state read while polling, in order, ending with the settled one
    async fn poll_states(&self, job_id: &str, interval: Duration) -> Vec<String> {
        let mut states = Vec::new();
        for _ in 0..1000 {
            let (_, body) = self.get_json(&format!("/state/{}", job_id)).await;
            let state = body["state"].as_str().unwrap().to_string();
            let settled = state != "pending" && state != "processing";
            states.push(state);
            if settled {
                return states;
            }
            tokio::time::sleep(interval).await;
        }
        panic!("job {} did not settle: {:?}", job_id, states);
    }
}

fn multipart_body(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for Part {
        field,
        file_name,
        content,
    } in parts
    {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                field, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();

    let (status, body) = app.get_json("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({"message": "OK"}));
}

#[tokio::test]
async fn test_valid_document_renders_and_downloads() {
    let app = TestApp::new();
    let source = b"\\documentclass{article}\\begin{document}Hi\\end{document}";

    let (status, body) = app
        .submit(
            &[
                part("document", "main.tex", source),
                part("image", "figure.png", b"\x89PNG"),
            ],
            None,
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["message"], "Document received");
    let job_id = body["job_id"].as_str().unwrap().to_string();

    // Visible right after acknowledgement
    let (_, state) = app.get_json(&format!("/state/{}", job_id)).await;
    assert_ne!(state["state"], "non-existent");

    assert_eq!(app.wait_settled(&job_id).await, "success");

    let (status, pdf, headers) = app.get(&format!("/document/{}", job_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pdf, source.as_slice());
    assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        format!("attachment; filename=\"{}.pdf\"", job_id).as_str()
    );

    let dir = app.jobs_root.join(&job_id);
    assert_eq!(std::fs::read(dir.join("figure.png")).unwrap(), b"\x89PNG");
}

#[tokio::test]
async fn test_missing_source_fails_without_processing() {
    let app = TestApp::new();

    let (status, body) = app
        .submit(&[part("image", "figure.png", b"\x89PNG")], None)
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = body["job_id"].as_str().unwrap().to_string();

    assert_eq!(app.wait_settled(&job_id).await, "failed-no-source");

    let (status, body) = app.get_json(&format!("/document/{}", job_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body,
        serde_json::json!({"job_id": job_id, "state": "failed-no-source"})
    );
}

#[tokio::test]
async fn test_engine_rejection_is_render_error() {
    let app = TestApp::new();

    let (status, body) = app
        .submit(&[part("document", "main.tex", b"FAIL \\undefined")], None)
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = body["job_id"].as_str().unwrap().to_string();

    assert_eq!(app.wait_settled(&job_id).await, "failed-render-error");

    let (status, body) = app.get_json(&format!("/document/{}", job_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["state"], "failed-render-error");
}

#[tokio::test]
async fn test_fabricated_ids_are_non_existent() {
    let app = TestApp::new();
    let fabricated = JobId::generate().to_string();

    for id in [fabricated.as_str(), "definitely-not-a-job"] {
        let (status, body) = app.get_json(&format!("/state/{}", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"job_id": id, "state": "non-existent"}));

        let (status, body) = app.get_json(&format!("/document/{}", id)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["state"], "non-existent");
    }
}

#[tokio::test]
async fn test_in_flight_job_is_not_ready() {
    let app = TestApp::new();
    let id = JobId::generate();
    app.statuses.set(id, JobStatus::Processing).await.unwrap();

    let (status, body) = app.get_json(&format!("/document/{}", id)).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(
        body,
        serde_json::json!({"job_id": id.to_string(), "state": "processing"})
    );
}

#[tokio::test]
async fn test_success_without_artifact_is_server_error() {
    let app = TestApp::new();
    let id = JobId::generate();
    app.statuses.set(id, JobStatus::Success).await.unwrap();

    let (status, body) = app.get_json(&format!("/document/{}", id)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        serde_json::json!({
            "job_id": id.to_string(),
            "state": "error",
            "detail": "Output file not found."
        })
    );
}

#[tokio::test]
async fn test_webhook_and_unexpected_fields_are_accepted() {
    let app = TestApp::new();

    let (status, body) = app
        .submit(
            &[
                part("notes", "notes.txt", b"ignored"),
                part("document", "main.tex", b"\\relax"),
            ],
            Some("https://hooks.example.com/done"),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = body["job_id"].as_str().unwrap().to_string();

    assert_eq!(app.wait_settled(&job_id).await, "success");
    assert!(!app.jobs_root.join(&job_id).join("notes.txt").exists());
}

#[tokio::test]
async fn test_concurrent_jobs_are_isolated() {
    let app = TestApp::new();

    let mut jobs = Vec::new();
    for n in 0..4 {
        let source = format!("document {}", n);
        let (status, body) = app
            .submit(&[part("document", "main.tex", &source)], None)
            .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        jobs.push((body["job_id"].as_str().unwrap().to_string(), source));
    }

    let ids: std::collections::HashSet<_> = jobs.iter().map(|(id, _)| id.clone()).collect();
    assert_eq!(ids.len(), jobs.len());

    for (job_id, source) in jobs {
        assert_eq!(app.wait_settled(&job_id).await, "success");
        let (status, pdf, _) = app.get(&format!("/document/{}", job_id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(pdf, source.as_bytes());
    }
}

#[tokio::test]
async fn test_state_only_moves_forward_while_polled() {
    let app = TestApp::with(SLOW_ENGINE, BODY_LIMIT);

    let (status, body) = app
        .submit(&[part("document", "main.tex", b"\\relax")], None)
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let states = app.poll_states(&job_id, Duration::from_millis(5)).await;

    let rank = |state: &str| match state {
        "pending" => 0,
        "processing" => 1,
        "success" | "failed-no-source" | "failed-render-error" => 2,
        other => panic!("unexpected state {} in {:?}", other, states),
    };
    let ranks: Vec<_> = states.iter().map(|s| rank(s.as_str())).collect();
    assert!(
        ranks.windows(2).all(|pair| pair[0] <= pair[1]),
        "state went backwards: {:?}",
        states
    );
    assert!(states.iter().any(|s| s == "processing"), "{:?}", states);
    assert_eq!(states.last().map(String::as_str), Some("success"));
}

#[tokio::test]
async fn test_upload_over_body_limit_still_settles() {
    let app = TestApp::with(ENGINE, 1024);

    let (status, body) = app
        .submit(&[part("document", "main.tex", vec![b'x'; 4096])], None)
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["message"], "Document received");
    let job_id = body["job_id"].as_str().unwrap().to_string();

    assert_eq!(app.wait_settled(&job_id).await, "failed-no-source");
    assert!(!app.jobs_root.join(&job_id).join("main.tex").exists());
}

#[tokio::test]
async fn test_malformed_multipart_still_settles() {
    let app = TestApp::new();

    let (status, body) = app
        .submit_raw(b"garbage without boundary".to_vec(), None)
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = body["job_id"].as_str().unwrap().to_string();

    assert_eq!(app.wait_settled(&job_id).await, "failed-no-source");
    assert!(!app.jobs_root.join(&job_id).join("main.tex").exists());
}
