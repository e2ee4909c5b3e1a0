#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

mod common;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use local_rag::server::router;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "local-rag-test-boundary";

const OWNERSHIP_PAGE: &str = "Ownership rules in Rust say that each value has exactly one owner and the value is dropped when the owner goes out of scope";
const CARGO_PAGE: &str = "Cargo is the package manager that downloads dependencies compiles crates and runs the test suite for a workspace";

struct Part<'a> {
    name: &'a str,
    filename: Option<&'a str>,
    content_type: Option<&'a str>,
    data: &'a [u8],
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part.filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    part.name, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n", part.name).as_bytes(),
            ),
        }
        if let Some(content_type) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/v1/documents")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .expect("request should build")
}

fn pdf_upload(filename: &str, pdf: &[u8]) -> Request<Body> {
    upload_request(&[Part {
        name: "file",
        filename: Some(filename),
        content_type: Some("application/pdf"),
        data: pdf,
    }])
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request should build")
}

fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, request).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body should be JSON")
    };
    (status, value)
}

fn setup() -> (TempDir, Router) {
    common::init_test_tracing();
    let temp_dir = TempDir::new().expect("temp dir");
    let ctx = common::offline_context(&temp_dir);
    (temp_dir, router(ctx))
}

#[tokio::test]
async fn health_endpoints_report_service_state() {
    let (_temp_dir, app) = setup();

    let (status, body) = send_json(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send_json(&app, get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Local RAG");

    let (status, body) = send_json(&app, get("/api/v1/health/detailed")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["services"]["rag"]["status"], "uninitialized");
    assert_eq!(body["services"]["rag"]["indexed_documents"], 0);
    assert_eq!(body["services"]["documents"]["total_documents"], 0);

    let (status, body) = send_json(&app, get("/api/v1/health/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["documents_count"], 0);
}

#[tokio::test]
async fn upload_indexes_pdf_and_records_metadata() {
    let (_temp_dir, app) = setup();
    let pdf = common::build_pdf(&[OWNERSHIP_PAGE, CARGO_PAGE]);

    let request = upload_request(&[
        Part {
            name: "file",
            filename: Some("rust-notes.pdf"),
            content_type: Some("application/pdf"),
            data: &pdf,
        },
        Part {
            name: "title",
            filename: None,
            content_type: None,
            data: b"Rust Notes",
        },
        Part {
            name: "tags",
            filename: None,
            content_type: None,
            data: b"rust, memory",
        },
    ]);
    let (status, body) = send_json(&app, request).await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["filename"], "rust-notes.pdf");
    assert_eq!(body["title"], "Rust Notes");
    assert_eq!(body["tags"], json!(["rust", "memory"]));
    assert_eq!(body["indexed"], true);
    assert_eq!(body["pages"], 2);
    assert_eq!(body["file_size"], pdf.len());
    assert!(body["chunk_count"].as_u64().is_some_and(|n| n >= 2));

    let (_, status_body) = send_json(&app, get("/api/v1/health/status")).await;
    assert_eq!(status_body["rag_status"], "ready");
    assert_eq!(status_body["documents_count"], 1);
}

#[tokio::test]
async fn upload_rejects_invalid_files() {
    let (_temp_dir, app) = setup();

    let (status, body) = send_json(
        &app,
        upload_request(&[Part {
            name: "file",
            filename: Some("notes.txt"),
            content_type: Some("text/plain"),
            data: b"plain text",
        }]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some());

    let (status, _) = send_json(&app, pdf_upload("empty.pdf", b"")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send_json(&app, pdf_upload("broken.pdf", b"definitely not a pdf")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send_json(
        &app,
        upload_request(&[Part {
            name: "title",
            filename: None,
            content_type: None,
            data: b"No file here",
        }]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file provided");

    let (_, list) = send_json(&app, get("/api/v1/documents")).await;
    assert_eq!(list["total"], 0);
}

#[tokio::test]
async fn document_lifecycle() {
    let (_temp_dir, app) = setup();
    let pdf = common::build_pdf(&[OWNERSHIP_PAGE]);

    let (_, first) = send_json(&app, pdf_upload("ownership.pdf", &pdf)).await;
    let (_, second) = send_json(
        &app,
        pdf_upload("cargo.pdf", &common::build_pdf(&[CARGO_PAGE])),
    )
    .await;
    let id = first["id"].as_str().expect("id").to_string();

    let (status, list) = send_json(&app, get("/api/v1/documents?limit=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total"], 2);
    assert_eq!(list["per_page"], 1);
    assert_eq!(list["documents"].as_array().map(Vec::len), Some(1));

    let (_, list) = send_json(&app, get("/api/v1/documents?search=cargo")).await;
    assert_eq!(list["total"], 1);
    assert_eq!(list["documents"][0]["id"], second["id"]);

    let (status, body) = send_json(&app, get(&format!("/api/v1/documents/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["filename"], "ownership.pdf");

    let (status, body) = send_json(
        &app,
        json_request(
            Method::PUT,
            &format!("/api/v1/documents/{}", id),
            &json!({ "title": "Ownership", "tags": ["borrowing"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Ownership");
    assert_eq!(body["tags"], json!(["borrowing"]));

    let response = app
        .clone()
        .oneshot(get(&format!("/api/v1/documents/{}/download", id)))
        .await
        .expect("router is infallible");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).map(|v| v.as_bytes()),
        Some(b"application/pdf".as_slice())
    );
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok()),
        Some("attachment; filename=\"ownership.pdf\"")
    );
    let downloaded = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    assert_eq!(downloaded.as_ref(), pdf.as_slice());

    let (_, stats) = send_json(&app, get("/api/v1/documents/stats/summary")).await;
    assert_eq!(stats["total_documents"], 2);

    let delete = Request::builder()
        .method(Method::DELETE)
        .uri(format!("/api/v1/documents/{}", id))
        .body(Body::empty())
        .expect("request should build");
    let (status, body) = send(&app, delete).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());

    let (status, body) = send_json(&app, get(&format!("/api/v1/documents/{}", id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().is_some_and(|e| e.contains(&id)));

    let (_, index) = send_json(&app, get("/api/v1/query/stats/index")).await;
    assert_eq!(index["total_documents"], 1);
}

#[tokio::test]
async fn unknown_and_malformed_ids() {
    let (_temp_dir, app) = setup();

    let (status, _) = send_json(
        &app,
        get("/api/v1/documents/00000000-0000-0000-0000-000000000000"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, get("/api/v1/documents/not-a-uuid")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn query_before_any_upload_reports_no_documents() {
    let (_temp_dir, app) = setup();

    let (status, body) = send_json(
        &app,
        json_request(
            Method::POST,
            "/api/v1/query",
            &json!({ "query": "What is ownership?" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(
        body["answer"]
            .as_str()
            .is_some_and(|a| a.starts_with("No documents have been indexed"))
    );
    assert_eq!(body["sources"], json!([]));
    assert_eq!(body["confidence"], 0.0);
    assert_eq!(body["tokens_used"], 0);
}

#[tokio::test]
async fn query_returns_matching_sources() {
    let (_temp_dir, app) = setup();
    let pdf = common::build_pdf(&[OWNERSHIP_PAGE, CARGO_PAGE]);
    let (status, uploaded) = send_json(&app, pdf_upload("rust.pdf", &pdf)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send_json(
        &app,
        json_request(
            Method::POST,
            "/api/v1/query",
            &json!({
                "query": "each value has exactly one owner and the value is dropped",
                "top_k": 2,
                "similarity_threshold": 0.3,
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    let sources = body["sources"].as_array().expect("sources");
    assert!(!sources.is_empty());
    assert_eq!(sources[0]["document_id"], uploaded["id"]);
    assert_eq!(sources[0]["document_title"], "rust.pdf");
    assert_eq!(sources[0]["page_number"], 1);
    assert!(
        body["answer"]
            .as_str()
            .is_some_and(|a| a.contains("**Source 1 (page 1):**"))
    );
    assert!(body["processing_time"].as_f64().is_some_and(|t| t >= 0.0));
}

#[tokio::test]
async fn query_accepts_form_bodies() {
    let (_temp_dir, app) = setup();
    send_json(
        &app,
        pdf_upload("cargo.pdf", &common::build_pdf(&[CARGO_PAGE])),
    )
    .await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/query")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(
            "query=package+manager+that+downloads+dependencies&top_k=1&similarity_threshold=0.2",
        ))
        .expect("request should build");
    let (status, body) = send_json(&app, request).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["sources"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["confidence"], 1.0);
}

#[tokio::test]
async fn query_validation_errors() {
    let (_temp_dir, app) = setup();

    for body in [
        json!({ "query": "   " }),
        json!({ "query": "x".repeat(1001) }),
        json!({ "query": "hello", "top_k": 0 }),
        json!({ "query": "hello", "top_k": 21 }),
        json!({ "query": "hello", "similarity_threshold": 1.5 }),
    ] {
        let (status, response) = send_json(
            &app,
            json_request(Method::POST, "/api/v1/query", &body),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert!(response["error"].as_str().is_some());
    }

    let (status, _) = send(
        &app,
        json_request(Method::POST, "/api/v1/query", &json!({ "top_k": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reset_clears_documents_and_index() {
    let (_temp_dir, app) = setup();
    send_json(
        &app,
        pdf_upload("ownership.pdf", &common::build_pdf(&[OWNERSHIP_PAGE])),
    )
    .await;

    let (_, before) = send_json(&app, get("/api/v1/query/stats/index")).await;
    assert_eq!(before["total_documents"], 1);
    assert!(before["total_chunks"].as_u64().is_some_and(|n| n > 0));

    let reset = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/documents/reset")
        .body(Body::empty())
        .expect("request should build");
    let (status, body) = send_json(&app, reset).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], 1);

    let (_, after) = send_json(&app, get("/api/v1/query/stats/index")).await;
    assert_eq!(after["total_documents"], 0);
    assert_eq!(after["total_chunks"], 0);

    let (_, list) = send_json(&app, get("/api/v1/documents")).await;
    assert_eq!(list["total"], 0);

    let (status, body) = send_json(
        &app,
        json_request(
            Method::POST,
            "/api/v1/query",
            &json!({ "query": "each value has exactly one owner" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        body["answer"]
            .as_str()
            .is_some_and(|a| a.starts_with("No documents have been indexed"))
    );

    let (_, health) = send_json(&app, get("/api/v1/health/status")).await;
    assert_eq!(health["rag_status"], "uninitialized");
}
