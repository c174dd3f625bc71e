//! Liveness checks.

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::web::dto::HealthResponse;
use crate::web::handlers::AppState;

/// GET / - Service banner with server time.
#[utoipa::path(
    get,
    path = "/",
    tag = "health",
    responses(
        (status = 200, description = "Service is running", body = HealthResponse)
    )
)]
pub async fn root(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let mut response = HealthResponse::ok("docrelay API running");
    response.timestamp = Some(state.clock.now());
    Json(response)
}

/// GET /health - Liveness check.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is running", body = HealthResponse)
    )
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok("Upload server running"))
}

/// GET /upload/health - Upload service check naming the storage backend.
///
/// Answers 200 even when storage is disabled; the provider field says so.
#[utoipa::path(
    get,
    path = "/upload/health",
    tag = "health",
    responses(
        (status = 200, description = "Upload service status", body = HealthResponse)
    )
)]
pub async fn upload_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let store = state.backend.store();
    let message = if store.is_some() {
        "Upload service ready"
    } else {
        "Upload service not configured"
    };

    let mut response = HealthResponse::ok(message);
    response.provider = Some(state.backend.provider().to_string());
    response.bucket = store.and_then(|s| s.bucket().map(str::to_string));
    Json(response)
}
