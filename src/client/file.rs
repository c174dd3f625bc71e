//! Files picked for upload.

use std::path::Path;

use bytes::Bytes;

use super::{UploadError, UploadErrorKind};
use crate::upload::{AcceptedFile, UploadPolicy};

/// A file read into memory, ready to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// File name sent to the relay.
    pub name: String,
    /// Declared content type.
    pub content_type: String,
    /// Content.
    pub bytes: Bytes,
}

impl LocalFile {
    /// Create a file from parts.
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, guessing its content type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, UploadError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                UploadError::new(UploadErrorKind::Validation, "Invalid file path")
                    .with_details(path.display().to_string())
            })?
            .to_string();

        let content = tokio::fs::read(path).await.map_err(|e| {
            UploadError::new(UploadErrorKind::Validation, "Failed to read file")
                .with_details(format!("{}: {}", path.display(), e))
        })?;

        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self::new(name, content_type, content))
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Check a file against the upload policy without touching the network.
pub fn validate_file(policy: &UploadPolicy, file: &LocalFile) -> Result<AcceptedFile, UploadError> {
    policy
        .check(&file.name, Some(&file.content_type), file.size())
        .map_err(UploadError::from)
}
