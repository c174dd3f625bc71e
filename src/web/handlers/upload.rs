//! Upload handlers.
//!
//! `POST /upload` stores under `users/{owner}/{key}` with a short-lived link,
//! `POST /upload-word` stores at the bucket root with a week-long link. Both
//! share one validation and error contract.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{multipart::MultipartError, Multipart, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::storage::{Backend, ObjectMetadata, PutObject};
use crate::upload::{
    generate_key, is_valid_owner_id, ObjectLayout, SignedDownloadLink, StoredObject,
    UploadRequest, FILE_FIELD, OWNER_FIELD,
};
use crate::web::dto::{UploadResponse, WordUploadResponse};
use crate::web::error::{ApiError, ErrorCode, StorageStage};
use crate::web::handlers::AppState;

/// Query parameters accepted by the upload routes.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct UploadQuery {
    /// Owner namespace; a `userId` form field takes precedence.
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// POST /upload - Upload a document into the owner's namespace.
///
/// Request body: multipart/form-data with a "file" field and an optional
/// "userId" field.
#[utoipa::path(
    post,
    path = "/upload",
    tag = "upload",
    params(UploadQuery),
    responses(
        (status = 200, description = "File stored", body = UploadResponse),
        (status = 400, description = "No file, invalid type, too large or invalid owner"),
        (status = 429, description = "Rate limit exceeded"),
        (status = 500, description = "Storage write or link generation failed"),
        (status = 503, description = "Storage not configured")
    )
)]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UploadQuery>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let request = read_upload(multipart, query.user_id).await?;
    let (object, link) = store_upload(
        &state,
        request,
        ObjectLayout::OwnerNamespaced,
        state.link_expiry(),
    )
    .await?;

    Ok(Json(UploadResponse::new(object, link)))
}

/// POST /upload-word - Upload a Word document and get a week-long link.
#[utoipa::path(
    post,
    path = "/upload-word",
    tag = "upload",
    params(UploadQuery),
    responses(
        (status = 200, description = "File stored", body = WordUploadResponse),
        (status = 400, description = "No file, invalid type or too large"),
        (status = 429, description = "Rate limit exceeded"),
        (status = 500, description = "Storage write or link generation failed"),
        (status = 503, description = "Storage not configured")
    )
)]
pub async fn upload_word(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UploadQuery>,
    multipart: Multipart,
) -> Result<Json<WordUploadResponse>, ApiError> {
    let request = read_upload(multipart, query.user_id).await?;
    let (object, link) = store_upload(
        &state,
        request,
        ObjectLayout::Flat,
        state.word_link_expiry(),
    )
    .await?;

    Ok(Json(WordUploadResponse::new(object, link)))
}

/// Collect the file and owner fields from a multipart body.
async fn read_upload(
    mut multipart: Multipart,
    query_owner: Option<String>,
) -> Result<UploadRequest, ApiError> {
    let mut file: Option<(String, Option<String>, bytes::Bytes)> = None;
    let mut owner_id: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            FILE_FIELD => {
                if file.is_some() {
                    return Err(ApiError::bad_request("Only one file may be uploaded per request"));
                }
                let Some(filename) = field.file_name().map(|s| s.to_string()) else {
                    continue;
                };
                let content_type = field.content_type().map(|s| s.to_string());
                let content = field.bytes().await.map_err(multipart_error)?;
                file = Some((filename, content_type, content));
            }
            OWNER_FIELD => {
                owner_id = Some(field.text().await.map_err(multipart_error)?);
            }
            _ => {}
        }
    }

    let (original_name, content_type, bytes) = file.ok_or_else(ApiError::no_file)?;

    Ok(UploadRequest {
        bytes,
        original_name,
        content_type,
        owner_id: owner_id.or(query_owner),
    })
}

/// Map a multipart read failure, reporting a body over the transport cap
/// the same way as a file over the size limit.
fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        tracing::warn!("Upload rejected by body limit: {}", err.body_text());
        return ApiError::new(ErrorCode::FileTooLarge, "File too large");
    }
    tracing::warn!("Failed to read multipart body: {}", err.body_text());
    ApiError::bad_request("Invalid multipart data")
}

/// Resolve the owner namespace for an upload.
fn resolve_owner(
    state: &AppState,
    requested: Option<String>,
    layout: ObjectLayout,
) -> Result<String, ApiError> {
    let requested = requested
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    match requested {
        Some(owner) if is_valid_owner_id(&owner) => Ok(owner),
        Some(_) => Err(ApiError::new(ErrorCode::InvalidOwner, "Invalid user id").with_details(
            "User id may only contain letters, digits, '-' and '_' (1-128 characters)",
        )),
        None if layout == ObjectLayout::Flat => Ok(state.upload.default_owner.clone()),
        None if state.upload.require_owner => Err(ApiError::new(
            ErrorCode::OwnerRequired,
            "User id is required",
        )),
        None => {
            tracing::warn!(
                default_owner = %state.upload.default_owner,
                "Upload without user id, storing under default owner"
            );
            Ok(state.upload.default_owner.clone())
        }
    }
}

/// Validate, store and sign one upload.
///
/// Nothing is written unless every check passes.
async fn store_upload(
    state: &AppState,
    request: UploadRequest,
    layout: ObjectLayout,
    expires_in: Duration,
) -> Result<(StoredObject, SignedDownloadLink), ApiError> {
    let size = request.size();
    let accepted = state
        .policy
        .check(&request.original_name, request.content_type.as_deref(), size)
        .map_err(|violation| {
            tracing::info!(
                filename = %request.original_name,
                size,
                "Upload rejected: {}",
                violation
            );
            ApiError::from(violation)
        })?;

    let owner = resolve_owner(state, request.owner_id, layout)?;

    let store = match state.backend.store() {
        Some(store) => store,
        None => {
            let reason = match &state.backend {
                Backend::Disabled { reason } => reason.clone(),
                _ => "storage backend unavailable".to_string(),
            };
            return Err(ApiError::storage_not_configured(&reason));
        }
    };

    let key = generate_key(&request.original_name);
    let path = layout.path_for(&owner, &key);
    let uploaded_at = state.clock.now();

    store
        .put(PutObject {
            path: path.clone(),
            bytes: request.bytes,
            metadata: ObjectMetadata {
                content_type: accepted.content_type.clone(),
                original_name: request.original_name.clone(),
                uploaded_at,
            },
        })
        .await
        .map_err(|e| ApiError::from_storage(&e, StorageStage::Write, state.expose_details))?;

    let link = store
        .signed_url(&path, expires_in)
        .await
        .map_err(|e| ApiError::from_storage(&e, StorageStage::Link, state.expose_details))?;

    tracing::info!(
        provider = %store.provider(),
        path = %path,
        size,
        original_name = %request.original_name,
        "File uploaded"
    );

    Ok((
        StoredObject {
            key,
            path,
            size,
            content_type: accepted.content_type,
            original_name: request.original_name,
            uploaded_at,
        },
        link,
    ))
}
