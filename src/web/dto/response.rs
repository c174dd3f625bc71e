//! Response DTOs for the upload API.
//!
//! The same types are decoded by [`crate::client::UploadClient`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::upload::{SignedDownloadLink, StoredObject};

/// Response for `POST /upload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    /// Always `true`.
    pub success: bool,
    /// Human-readable message.
    pub message: String,
    /// Stored file details.
    pub file: UploadedFile,
}

/// Stored file details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    /// Filename as sent by the client.
    pub original_name: String,
    /// Generated key.
    pub filename: String,
    /// Path inside the bucket.
    pub path: String,
    /// Size in bytes.
    pub size: u64,
    /// Content type the object was stored with.
    pub mime_type: String,
    /// Signed download link.
    pub download_url: String,
    /// Link validity in seconds.
    pub expires_in: u64,
    /// Link expiry (RFC 3339).
    pub expires_at: DateTime<Utc>,
}

impl UploadResponse {
    /// Build the response for a stored object and its link.
    pub fn new(object: StoredObject, link: SignedDownloadLink) -> Self {
        Self {
            success: true,
            message: "File uploaded successfully".to_string(),
            file: UploadedFile {
                original_name: object.original_name,
                filename: object.key,
                path: object.path,
                size: object.size,
                mime_type: object.content_type,
                download_url: link.url,
                expires_in: link.expires_in,
                expires_at: link.expires_at,
            },
        }
    }
}

/// Response for `POST /upload-word`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WordUploadResponse {
    /// Always `true`.
    pub success: bool,
    /// Signed download link.
    pub url: String,
    /// Generated key.
    pub filename: String,
    /// Filename as sent by the client.
    pub original_name: String,
    /// Size in bytes.
    pub size: u64,
    /// Link validity in seconds.
    pub expires_in: u64,
}

impl WordUploadResponse {
    /// Build the response for a stored object and its link.
    pub fn new(object: StoredObject, link: SignedDownloadLink) -> Self {
        Self {
            success: true,
            url: link.url,
            filename: object.key,
            original_name: object.original_name,
            size: object.size,
            expires_in: link.expires_in,
        }
    }
}

/// Liveness check response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Always `"ok"`.
    pub status: String,
    /// Human-readable message.
    pub message: String,
    /// Server time, on `/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Storage provider, on `/upload/health`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Bucket name, on `/upload/health`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
}

impl HealthResponse {
    /// Plain liveness response.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
            timestamp: None,
            provider: None,
            bucket: None,
        }
    }
}
