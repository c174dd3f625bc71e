//! Signed download handler for the local provider.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::header,
    response::Response,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::storage::{LinkRejection, StorageError};
use crate::web::error::{ApiError, ErrorCode};
use crate::web::handlers::AppState;

/// Query parameters of a signed link.
#[derive(Debug, Deserialize, IntoParams)]
pub struct SignedLinkQuery {
    /// Expiry as a Unix timestamp in seconds.
    pub expires: Option<i64>,
    /// URL-safe base64 HMAC signature.
    pub signature: Option<String>,
}

/// Generate a safe Content-Disposition header value for file downloads.
///
/// Control characters are removed, quotes and backslashes replaced, and
/// non-ASCII names carried in an RFC 5987 `filename*` parameter.
fn content_disposition_header(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            _ => c,
        })
        .collect();

    if filename.is_ascii() && sanitized == filename {
        return format!("attachment; filename=\"{}\"", filename);
    }

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized,
        urlencoding::encode(filename)
    )
}

/// GET /files/{path} - Serve a stored object through a signed link.
#[utoipa::path(
    get,
    path = "/files/{path}",
    tag = "files",
    params(
        ("path" = String, Path, description = "Object path"),
        SignedLinkQuery
    ),
    responses(
        (status = 200, description = "File content"),
        (status = 403, description = "Invalid signature or expired link"),
        (status = 404, description = "File not found")
    )
)]
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    Query(query): Query<SignedLinkQuery>,
) -> Result<Response, ApiError> {
    let store = state
        .backend
        .local()
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    let (Some(expires), Some(signature)) = (query.expires, query.signature.as_deref()) else {
        return Err(ApiError::new(
            ErrorCode::InvalidSignature,
            "Missing link signature",
        ));
    };

    store
        .verify_link(&path, expires, signature)
        .map_err(|rejection| match rejection {
            LinkRejection::InvalidSignature => {
                tracing::warn!(path = %path, "Download with invalid signature");
                ApiError::new(ErrorCode::InvalidSignature, "Invalid link signature")
            }
            LinkRejection::Expired => {
                ApiError::new(ErrorCode::LinkExpired, "Download link has expired")
            }
        })?;

    let (content, metadata) = store.load(&path).await.map_err(|e| match e {
        StorageError::NotFound(_) | StorageError::InvalidPath(_) => {
            ApiError::not_found("File not found")
        }
        other => {
            tracing::error!(path = %path, "Failed to read file: {}", other);
            ApiError::internal("Failed to read file")
        }
    })?;

    let response = Response::builder()
        .header(header::CONTENT_TYPE, &metadata.content_type)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_header(&metadata.original_name),
        )
        .header(header::CONTENT_LENGTH, content.len())
        .header(header::CACHE_CONTROL, "private, max-age=0")
        .body(Body::from(content))
        .map_err(|e| {
            tracing::error!("Failed to build response: {}", e);
            ApiError::internal("Failed to build response")
        })?;

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_header_simple_ascii() {
        let result = content_disposition_header("report.docx");
        assert_eq!(result, "attachment; filename=\"report.docx\"");
    }

    #[test]
    fn test_content_disposition_header_with_spaces() {
        let result = content_disposition_header("quarterly report.doc");
        assert_eq!(result, "attachment; filename=\"quarterly report.doc\"");
    }

    #[test]
    fn test_content_disposition_header_non_ascii() {
        let result = content_disposition_header("議事録.docx");
        assert!(result.starts_with("attachment; filename=\""));
        assert!(result.contains("filename*=UTF-8''"));
        assert!(result.contains("%E8%AD%B0%E4%BA%8B%E9%8C%B2"));
    }

    #[test]
    fn test_content_disposition_header_double_quote() {
        let result = content_disposition_header("a\"b.docx");
        assert!(result.contains("filename=\"a_b.docx\""));
        assert!(result.contains("filename*=UTF-8''a%22b.docx"));
    }

    #[test]
    fn test_content_disposition_header_crlf_injection() {
        let result = content_disposition_header("evil\r\nSet-Cookie: x.docx");
        assert!(!result.contains('\r'));
        assert!(!result.contains('\n'));
        assert!(result.contains("filename=\"evilSet-Cookie: x.docx\""));
    }
}
