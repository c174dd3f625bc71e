//! Router configuration for the relay.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use super::handlers::{
    download_file, health, root, upload_file, upload_health, upload_word, AppState,
};
use super::middleware::{create_cors_layer, security_headers, upload_rate_limit, RateLimitState};
use super::openapi::ApiDoc;
use crate::config::WebConfig;

/// Room for multipart boundaries and the text fields on top of the file size
/// limit.
pub const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the main router.
pub fn create_router(app_state: Arc<AppState>, web_config: &WebConfig) -> Router {
    let body_limit = usize::try_from(app_state.policy.max_size())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    let mut upload_routes = Router::new()
        .route("/upload", post(upload_file))
        .route("/upload-word", post(upload_word))
        .layer(DefaultBodyLimit::max(body_limit));

    let rate_limit = Arc::new(RateLimitState::new(
        web_config.upload_rate_limit,
        web_config.trust_proxy,
    ));
    if rate_limit.is_enabled() {
        rate_limit.clone().start_cleanup_task();
        upload_routes = upload_routes.route_layer(middleware::from_fn(move |req, next| {
            let state = rate_limit.clone();
            upload_rate_limit(state, req, next)
        }));
    }

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/upload/health", get(upload_health))
        .route("/files/*path", get(download_file))
        .merge(upload_routes)
        .merge(create_openapi_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(&web_config.cors_origins))
                .layer(middleware::from_fn(security_headers))
                .layer(CompressionLayer::new()),
        )
        .with_state(app_state)
}

/// Create the router serving the OpenAPI document.
pub fn create_openapi_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}
