//! Upload data model shared by the relay server and the upload client.
//!
//! - [`UploadRequest`]: a file received by the endpoint, alive for one request
//! - [`StoredObject`]: what was written to the blob store
//! - [`SignedDownloadLink`]: a time-limited read link for a stored object
//! - [`UploadProgress`]: transfer progress reported by the client

mod policy;

pub use policy::{
    AcceptedFile, DocumentType, PolicyViolation, UploadPolicy, DOCX_MIME, DOC_MIME, GENERIC_MIME,
};

use std::path::Path;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Multipart field carrying the file.
pub const FILE_FIELD: &str = "file";

/// Multipart field / query parameter carrying the owner identifier.
pub const OWNER_FIELD: &str = "userId";

/// Maximum length for an owner identifier (in characters).
pub const MAX_OWNER_ID_LENGTH: usize = 128;

/// Default maximum file size (10MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// A file received by the upload endpoint.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// File content.
    pub bytes: Bytes,
    /// Filename as sent by the client.
    pub original_name: String,
    /// Content type declared by the client.
    pub content_type: Option<String>,
    /// Owner namespace requested by the client.
    pub owner_id: Option<String>,
}

impl UploadRequest {
    /// Size of the received content in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// How stored objects are laid out in the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectLayout {
    /// `users/{owner}/{key}`.
    OwnerNamespaced,
    /// `{key}` at the bucket root.
    Flat,
}

impl ObjectLayout {
    /// Build the storage path for a key.
    pub fn path_for(&self, owner_id: &str, key: &str) -> String {
        match self {
            ObjectLayout::OwnerNamespaced => format!("users/{owner_id}/{key}"),
            ObjectLayout::Flat => key.to_string(),
        }
    }
}

/// An object written to the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredObject {
    /// Generated unique name (`{uuid}.{ext}`).
    pub key: String,
    /// Full path inside the bucket.
    pub path: String,
    /// Size in bytes.
    pub size: u64,
    /// Content type recorded with the object.
    pub content_type: String,
    /// Filename as sent by the client.
    pub original_name: String,
    /// When the object was written.
    pub uploaded_at: DateTime<Utc>,
}

/// A signed, read-only link to a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedDownloadLink {
    /// The URL.
    pub url: String,
    /// When the link stops working.
    pub expires_at: DateTime<Utc>,
    /// Validity granted at creation, in seconds.
    pub expires_in: u64,
}

/// Transfer progress of one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadProgress {
    /// Bytes sent so far.
    pub loaded: u64,
    /// Total bytes to send.
    pub total: u64,
    /// Rounded percentage, 0 to 100.
    pub percentage: u8,
}

impl UploadProgress {
    /// Compute progress for `loaded` out of `total` bytes.
    pub fn new(loaded: u64, total: u64) -> Self {
        let loaded = loaded.min(total);
        let percentage = if total == 0 {
            100
        } else {
            ((loaded as f64 / total as f64) * 100.0).round() as u8
        };
        Self {
            loaded,
            total,
            percentage,
        }
    }

    /// Whether every byte has been sent.
    pub fn is_complete(&self) -> bool {
        self.loaded == self.total
    }
}

/// Generate a unique object key preserving the original extension.
///
/// The extension is lower-cased; files without one get `bin`.
pub fn generate_key(original_name: &str) -> String {
    let ext = Path::new(original_name)
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_else(|| "bin".to_string());
    format!("{}.{}", Uuid::new_v4(), ext)
}

/// Check an owner identifier: 1 to 128 ASCII letters, digits, `-` or `_`.
pub fn is_valid_owner_id(owner_id: &str) -> bool {
    !owner_id.is_empty()
        && owner_id.len() <= MAX_OWNER_ID_LENGTH
        && owner_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Format a byte count for display.
pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;

    if bytes < KB {
        format!("{bytes} B")
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    }
}
