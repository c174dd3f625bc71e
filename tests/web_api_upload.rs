//! Web API Upload Tests
//!
//! Integration tests for the upload, download and health endpoints.

mod common;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use chrono::Duration;
use serde_json::Value;

use docrelay::config::WebConfig;

use common::{
    disabled_server, disabled_server_with, document_bytes, failing_server, file_form, split_link, FailAt, TestApp,
    DOCX_MIME, DOC_MIME, MB, PUBLIC_URL,
};

// ============================================================================
// POST /upload
// ============================================================================

#[tokio::test]
async fn test_upload_docx_under_owner() {
    let app = TestApp::new();
    let content = document_bytes(2 * MB);

    let form = file_form("report.docx", DOCX_MIME, content.clone()).add_text("userId", "alice");
    let response = app.server.post("/upload").multipart(form).await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "File uploaded successfully");

    let file = &json["file"];
    assert_eq!(file["originalName"], "report.docx");
    assert_eq!(file["size"], content.len() as u64);
    assert_eq!(file["mimeType"], DOCX_MIME);
    assert_eq!(file["expiresIn"], 3600);

    let filename = file["filename"].as_str().unwrap();
    assert!(filename.ends_with(".docx"));
    assert_eq!(file["path"], format!("users/alice/{filename}"));

    let url = file["downloadUrl"].as_str().unwrap();
    assert!(url.starts_with(&format!("{PUBLIC_URL}/files/users/alice/")));
    assert!(url.contains("signature="));

    assert_eq!(app.object_count(), 1);
}

#[tokio::test]
async fn test_upload_owner_from_query() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/upload")
        .add_query_param("userId", "bob")
        .multipart(file_form("notes.doc", DOC_MIME, document_bytes(1024)))
        .await;

    response.assert_status_ok();
    let json: Value = response.json();
    let path = json["file"]["path"].as_str().unwrap();
    assert!(path.starts_with("users/bob/"));
    assert!(path.ends_with(".doc"));
}

#[tokio::test]
async fn test_upload_body_owner_wins_over_query() {
    let app = TestApp::new();

    let form = file_form("a.docx", DOCX_MIME, document_bytes(64)).add_text("userId", "from-body");
    let response = app
        .server
        .post("/upload")
        .add_query_param("userId", "from-query")
        .multipart(form)
        .await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert!(json["file"]["path"]
        .as_str()
        .unwrap()
        .starts_with("users/from-body/"));
}

#[tokio::test]
async fn test_upload_without_owner_uses_default() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/upload")
        .multipart(file_form("a.docx", DOCX_MIME, document_bytes(64)))
        .await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert!(json["file"]["path"]
        .as_str()
        .unwrap()
        .starts_with("users/default/"));
}

#[tokio::test]
async fn test_upload_generic_content_type_replaced() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/upload")
        .multipart(file_form(
            "legacy.doc",
            "application/octet-stream",
            document_bytes(128),
        ))
        .await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["file"]["mimeType"], DOC_MIME);
}

#[tokio::test]
async fn test_upload_same_name_twice_gets_distinct_keys() {
    let app = TestApp::new();

    let mut filenames = Vec::new();
    for _ in 0..2 {
        let response = app
            .server
            .post("/upload")
            .multipart(file_form("same.docx", DOCX_MIME, document_bytes(32)))
            .await;
        response.assert_status_ok();
        let json: Value = response.json();
        filenames.push(json["file"]["filename"].as_str().unwrap().to_string());
    }

    assert_ne!(filenames[0], filenames[1]);
    assert_eq!(app.object_count(), 2);
}

#[tokio::test]
async fn test_upload_rejects_image() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/upload")
        .multipart(file_form("photo.png", "image/png", document_bytes(1024)))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let json: Value = response.json();
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["code"], "INVALID_FILE_TYPE");
    assert_eq!(
        json["error"]["details"],
        "Only .doc and .docx files are allowed"
    );
    assert_eq!(app.object_count(), 0);
}

#[tokio::test]
async fn test_upload_rejects_mismatched_content_type() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/upload")
        .multipart(file_form("report.docx", "image/png", document_bytes(1024)))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let json: Value = response.json();
    assert_eq!(json["error"]["code"], "INVALID_FILE_TYPE");
    assert_eq!(app.object_count(), 0);
}

#[tokio::test]
async fn test_upload_rejects_content_type_of_other_word_format() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/upload")
        .multipart(file_form("legacy.doc", DOCX_MIME, document_bytes(1024)))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let json: Value = response.json();
    assert_eq!(json["error"]["code"], "INVALID_FILE_TYPE");
    assert_eq!(app.object_count(), 0);
}

#[tokio::test]
async fn test_upload_rejects_file_over_limit() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/upload")
        .multipart(file_form("big.docx", DOCX_MIME, document_bytes(10 * MB + 1)))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let json: Value = response.json();
    assert_eq!(json["error"]["code"], "FILE_TOO_LARGE");
    assert_eq!(
        json["error"]["details"],
        "File size must be less than 10MB"
    );
    assert_eq!(app.object_count(), 0);
}

#[tokio::test]
async fn test_upload_accepts_file_at_limit() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/upload")
        .multipart(file_form("exact.docx", DOCX_MIME, document_bytes(10 * MB)))
        .await;

    response.assert_status_ok();
    assert_eq!(app.object_count(), 1);
}

#[tokio::test]
async fn test_upload_body_over_transport_cap() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/upload")
        .multipart(file_form("huge.docx", DOCX_MIME, document_bytes(11 * MB)))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let json: Value = response.json();
    assert_eq!(json["error"]["code"], "FILE_TOO_LARGE");
    assert_eq!(app.object_count(), 0);
}

#[tokio::test]
async fn test_upload_without_file() {
    let app = TestApp::new();

    let form = MultipartForm::new().add_text("userId", "alice");
    let response = app.server.post("/upload").multipart(form).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let json: Value = response.json();
    assert_eq!(json["error"]["code"], "NO_FILE");
    assert_eq!(json["error"]["message"], "No file uploaded");
}

#[tokio::test]
async fn test_upload_rejects_second_file() {
    let app = TestApp::new();

    let form = file_form("one.docx", DOCX_MIME, document_bytes(16)).add_part(
        "file",
        Part::bytes(document_bytes(16))
            .file_name("two.docx")
            .mime_type(DOCX_MIME),
    );
    let response = app.server.post("/upload").multipart(form).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(app.object_count(), 0);
}

#[tokio::test]
async fn test_upload_rejects_invalid_owner() {
    let app = TestApp::new();

    let form = file_form("a.docx", DOCX_MIME, document_bytes(16)).add_text("userId", "../etc");
    let response = app.server.post("/upload").multipart(form).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let json: Value = response.json();
    assert_eq!(json["error"]["code"], "INVALID_OWNER");
    assert_eq!(app.object_count(), 0);
}

#[tokio::test]
async fn test_upload_requires_owner_when_configured() {
    let app = TestApp::with_state(|mut state| {
        state.upload.require_owner = true;
        state
    });

    let response = app
        .server
        .post("/upload")
        .multipart(file_form("a.docx", DOCX_MIME, document_bytes(16)))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let json: Value = response.json();
    assert_eq!(json["error"]["code"], "OWNER_REQUIRED");
    assert_eq!(app.object_count(), 0);
}

#[tokio::test]
async fn test_upload_with_storage_disabled() {
    let server = disabled_server("missing bucket");

    let response = server
        .post("/upload")
        .multipart(file_form("a.docx", DOCX_MIME, document_bytes(16)))
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let json: Value = response.json();
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["code"], "STORAGE_NOT_CONFIGURED");
    assert!(json["error"]["details"].is_string());
}

#[tokio::test]
async fn test_upload_validation_precedes_storage_check() {
    let server = disabled_server("missing bucket");

    let response = server
        .post("/upload")
        .multipart(file_form("photo.png", "image/png", document_bytes(16)))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let json: Value = response.json();
    assert_eq!(json["error"]["code"], "INVALID_FILE_TYPE");
}

// ============================================================================
// Storage failures
// ============================================================================

#[tokio::test]
async fn test_upload_write_failure_hides_details_in_production() {
    let (server, store) = failing_server(FailAt::Put, false);

    let response = server
        .post("/upload")
        .multipart(file_form("a.docx", DOCX_MIME, document_bytes(16)))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let json: Value = response.json();
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["code"], "UPLOAD_FAILED");
    assert_eq!(json["error"]["message"], "Failed to upload file to storage");
    assert!(json["error"].get("details").is_none());
    assert_eq!(store.puts(), 0);
}

#[tokio::test]
async fn test_upload_write_failure_details_in_development() {
    let (server, _store) = failing_server(FailAt::Put, true);

    let response = server
        .post("/upload")
        .multipart(file_form("a.docx", DOCX_MIME, document_bytes(16)))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let json: Value = response.json();
    assert_eq!(json["error"]["code"], "UPLOAD_FAILED");
    let details = json["error"]["details"].as_str().unwrap();
    assert!(details.contains("bucket docs is read-only"));
}

#[tokio::test]
async fn test_upload_link_failure_hides_details_in_production() {
    let (server, store) = failing_server(FailAt::SignedUrl, false);

    let response = server
        .post("/upload")
        .multipart(file_form("a.docx", DOCX_MIME, document_bytes(16)))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let json: Value = response.json();
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["code"], "LINK_GENERATION_FAILED");
    assert_eq!(
        json["error"]["message"],
        "File uploaded but failed to generate download URL"
    );
    assert!(json["error"].get("details").is_none());
    // The object stays written; only the link failed.
    assert_eq!(store.puts(), 1);
}

#[tokio::test]
async fn test_upload_link_failure_details_in_development() {
    let (server, store) = failing_server(FailAt::SignedUrl, true);

    let response = server
        .post("/upload-word")
        .multipart(file_form("memo.doc", DOC_MIME, document_bytes(16)))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let json: Value = response.json();
    assert_eq!(json["error"]["code"], "LINK_GENERATION_FAILED");
    let details = json["error"]["details"].as_str().unwrap();
    assert!(details.contains("presigning key revoked"));
    assert_eq!(store.puts(), 1);
}

#[tokio::test]
async fn test_upload_out_of_range_expiry_fails_cleanly() {
    let app = TestApp::with_state(|mut state| {
        state.upload.link_expiry_secs = u64::MAX;
        state
    });

    let response = app
        .server
        .post("/upload")
        .multipart(file_form("a.docx", DOCX_MIME, document_bytes(16)))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let json: Value = response.json();
    assert_eq!(json["error"]["code"], "LINK_GENERATION_FAILED");
}

// ============================================================================
// Rate limiting
// ============================================================================

async fn upload_as(server: &axum_test::TestServer, forwarded_for: &str) -> StatusCode {
    server
        .post("/upload")
        .add_header(
            HeaderName::from_static("x-forwarded-for"),
            HeaderValue::from_str(forwarded_for).unwrap(),
        )
        .multipart(file_form("a.docx", DOCX_MIME, document_bytes(16)))
        .await
        .status_code()
}

#[tokio::test]
async fn test_rate_limit_ignores_forwarded_for_from_untrusted_clients() {
    let server = disabled_server_with(
        "missing bucket",
        &WebConfig {
            upload_rate_limit: 2,
            ..WebConfig::default()
        },
    );

    assert_eq!(upload_as(&server, "203.0.113.1").await, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(upload_as(&server, "203.0.113.2").await, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(upload_as(&server, "203.0.113.3").await, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_rate_limit_keys_on_forwarded_for_behind_trusted_proxy() {
    let server = disabled_server_with(
        "missing bucket",
        &WebConfig {
            upload_rate_limit: 1,
            trust_proxy: true,
            ..WebConfig::default()
        },
    );

    assert_eq!(upload_as(&server, "203.0.113.1").await, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(upload_as(&server, "203.0.113.1").await, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(upload_as(&server, "203.0.113.2").await, StatusCode::SERVICE_UNAVAILABLE);
}

// ============================================================================
// POST /upload-word
// ============================================================================

#[tokio::test]
async fn test_upload_word_flat_layout() {
    let app = TestApp::new();

    let form = file_form("memo.docx", DOCX_MIME, document_bytes(4096)).add_text("userId", "alice");
    let response = app.server.post("/upload-word").multipart(form).await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["success"], true);
    assert_eq!(json["originalName"], "memo.docx");
    assert_eq!(json["size"], 4096);
    assert_eq!(json["expiresIn"], 7 * 24 * 3600);

    let filename = json["filename"].as_str().unwrap();
    assert!(!filename.contains('/'));
    let url = json["url"].as_str().unwrap();
    assert!(url.starts_with(&format!("{PUBLIC_URL}/files/{filename}?")));
}

#[tokio::test]
async fn test_upload_word_ignores_required_owner() {
    let app = TestApp::with_state(|mut state| {
        state.upload.require_owner = true;
        state
    });

    let response = app
        .server
        .post("/upload-word")
        .multipart(file_form("memo.doc", DOC_MIME, document_bytes(16)))
        .await;

    response.assert_status_ok();
}

// ============================================================================
// GET /files/*path
// ============================================================================

async fn upload_and_link(app: &TestApp, name: &str, content: Vec<u8>) -> String {
    let response = app
        .server
        .post("/upload")
        .multipart(file_form(name, DOCX_MIME, content).add_text("userId", "alice"))
        .await;
    response.assert_status_ok();
    let json: Value = response.json();
    json["file"]["downloadUrl"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_download_serves_content() {
    let app = TestApp::new();
    let content = document_bytes(300 * 1024);
    let url = upload_and_link(&app, "report.docx", content.clone()).await;

    let (path, query) = split_link(&url);
    let mut request = app.server.get(&path);
    for (key, value) in &query {
        request = request.add_query_param(key, value);
    }
    let response = request.await;

    response.assert_status_ok();
    assert_eq!(response.header("content-type"), DOCX_MIME);
    assert_eq!(
        response.header("content-disposition"),
        "attachment; filename=\"report.docx\""
    );
    assert_eq!(response.header("cache-control"), "private, max-age=0");
    assert_eq!(&response.as_bytes()[..], &content[..]);
}

#[tokio::test]
async fn test_download_expired_link() {
    let app = TestApp::new();
    let url = upload_and_link(&app, "report.docx", document_bytes(64)).await;

    app.clock.advance(Duration::seconds(3600));

    let (path, query) = split_link(&url);
    let mut request = app.server.get(&path);
    for (key, value) in &query {
        request = request.add_query_param(key, value);
    }
    let response = request.await;

    response.assert_status(StatusCode::FORBIDDEN);
    let json: Value = response.json();
    assert_eq!(json["error"]["code"], "LINK_EXPIRED");
}

#[tokio::test]
async fn test_download_valid_until_expiry() {
    let app = TestApp::new();
    let url = upload_and_link(&app, "report.docx", document_bytes(64)).await;

    app.clock.advance(Duration::seconds(3599));

    let (path, query) = split_link(&url);
    let mut request = app.server.get(&path);
    for (key, value) in &query {
        request = request.add_query_param(key, value);
    }
    request.await.assert_status_ok();
}

#[tokio::test]
async fn test_download_tampered_signature() {
    let app = TestApp::new();
    let url = upload_and_link(&app, "report.docx", document_bytes(64)).await;

    let (path, query) = split_link(&url);
    let mut request = app.server.get(&path);
    for (key, value) in &query {
        if key == "expires" {
            let extended = value.parse::<i64>().unwrap() + 86_400;
            request = request.add_query_param(key, extended);
        } else {
            request = request.add_query_param(key, value);
        }
    }
    let response = request.await;

    response.assert_status(StatusCode::FORBIDDEN);
    let json: Value = response.json();
    assert_eq!(json["error"]["code"], "INVALID_SIGNATURE");
}

#[tokio::test]
async fn test_download_without_signature() {
    let app = TestApp::new();
    let url = upload_and_link(&app, "report.docx", document_bytes(64)).await;

    let (path, _) = split_link(&url);
    let response = app.server.get(&path).await;

    response.assert_status(StatusCode::FORBIDDEN);
    let json: Value = response.json();
    assert_eq!(json["error"]["code"], "INVALID_SIGNATURE");
}

#[tokio::test]
async fn test_download_on_disabled_backend() {
    let server = disabled_server("none");

    let response = server
        .get("/files/users/alice/x.docx")
        .add_query_param("expires", 0)
        .add_query_param("signature", "abc")
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
}

// ============================================================================
// Health and documentation
// ============================================================================

#[tokio::test]
async fn test_root_and_health() {
    let app = TestApp::new();

    let response = app.server.get("/").await;
    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["message"], "docrelay API running");
    assert!(json["timestamp"].is_string());

    let response = app.server.get("/health").await;
    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["message"], "Upload server running");
}

#[tokio::test]
async fn test_upload_health_reports_provider() {
    let app = TestApp::new();
    let json: Value = app.server.get("/upload/health").await.json();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["provider"], "local");

    let server = disabled_server("missing bucket");
    let json: Value = server.get("/upload/health").await.json();
    assert_eq!(json["message"], "Upload service not configured");
    assert_eq!(json["provider"], "disabled");
}

#[tokio::test]
async fn test_security_headers_on_responses() {
    let app = TestApp::new();
    let response = app.server.get("/health").await;

    assert_eq!(response.header("x-content-type-options"), "nosniff");
    assert_eq!(response.header("x-frame-options"), "DENY");
}

#[tokio::test]
async fn test_openapi_document() {
    let app = TestApp::new();

    let response = app.server.get("/api-docs/openapi.json").await;
    response.assert_status_ok();
    let json: Value = response.json();
    assert!(json["paths"]["/upload"].is_object());
    assert!(json["paths"]["/upload-word"].is_object());
    assert!(json["components"]["schemas"]["UploadResponse"].is_object());
}
