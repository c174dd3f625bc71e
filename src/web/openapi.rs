//! OpenAPI document for the relay.

use utoipa::OpenApi;

use super::dto::{HealthResponse, UploadResponse, UploadedFile, WordUploadResponse};
use super::error::{ErrorBody, ErrorCode, ErrorDetail};
use super::handlers;

/// OpenAPI document.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "docrelay",
        description = "Word document upload relay with signed download links"
    ),
    paths(
        handlers::upload::upload_file,
        handlers::upload::upload_word,
        handlers::download::download_file,
        handlers::health::root,
        handlers::health::health,
        handlers::health::upload_health,
    ),
    components(schemas(
        UploadResponse,
        UploadedFile,
        WordUploadResponse,
        HealthResponse,
        ErrorBody,
        ErrorCode,
        ErrorDetail,
    )),
    tags(
        (name = "upload", description = "Document uploads"),
        (name = "files", description = "Signed downloads (local storage)"),
        (name = "health", description = "Liveness checks")
    )
)]
pub struct ApiDoc;
