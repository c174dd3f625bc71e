//! Allow-list and size limit for uploaded documents.
//!
//! The same policy runs on the server before any storage write and in the
//! client before any network request.

use std::path::Path;

use thiserror::Error;

use super::DEFAULT_MAX_FILE_SIZE;

/// MIME type of legacy `.doc` files.
pub const DOC_MIME: &str = "application/msword";

/// MIME type of `.docx` files.
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Generic binary type some clients send for any file.
pub const GENERIC_MIME: &str = "application/octet-stream";

/// Accepted document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentType {
    /// Word 97-2003 (`.doc`).
    Doc,
    /// Office Open XML (`.docx`).
    Docx,
}

impl DocumentType {
    /// Look up a document type by file extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "doc" => Some(DocumentType::Doc),
            "docx" => Some(DocumentType::Docx),
            _ => None,
        }
    }

    /// Look up a document type by MIME type. Parameters are ignored.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim();
        if essence.eq_ignore_ascii_case(DOC_MIME) {
            Some(DocumentType::Doc)
        } else if essence.eq_ignore_ascii_case(DOCX_MIME) {
            Some(DocumentType::Docx)
        } else {
            None
        }
    }

    /// The canonical MIME type.
    pub fn mime_type(&self) -> &'static str {
        match self {
            DocumentType::Doc => DOC_MIME,
            DocumentType::Docx => DOCX_MIME,
        }
    }

    /// The file extension (without the dot).
    pub fn extension(&self) -> &'static str {
        match self {
            DocumentType::Doc => "doc",
            DocumentType::Docx => "docx",
        }
    }
}

/// Why a file was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    /// Extension or declared type is not on the allow-list.
    #[error("Invalid file type")]
    InvalidFileType,

    /// File exceeds the size limit.
    #[error("File too large")]
    FileTooLarge {
        /// Size of the offered file.
        size: u64,
        /// Configured limit.
        max: u64,
    },
}

impl PolicyViolation {
    /// Human readable explanation.
    pub fn details(&self) -> String {
        match self {
            PolicyViolation::InvalidFileType => {
                "Only .doc and .docx files are allowed".to_string()
            }
            PolicyViolation::FileTooLarge { max, .. } => {
                format!("File size must be less than {}MB", max / 1024 / 1024)
            }
        }
    }
}

/// A file that passed the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedFile {
    /// Detected document format.
    pub document_type: DocumentType,
    /// Content type to store the object with.
    pub content_type: String,
}

/// Upload acceptance rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    max_size: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl UploadPolicy {
    /// Create a policy with the given size limit in bytes.
    pub fn new(max_size: u64) -> Self {
        Self { max_size }
    }

    /// Size limit in bytes.
    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Check a file's metadata against the policy.
    ///
    /// The type is checked before the size. A missing or generic content type
    /// is replaced by the type implied by the extension; a declared Word type
    /// must agree with the extension.
    pub fn check(
        &self,
        filename: &str,
        content_type: Option<&str>,
        size: u64,
    ) -> Result<AcceptedFile, PolicyViolation> {
        let document_type = Path::new(filename)
            .extension()
            .and_then(|s| s.to_str())
            .and_then(DocumentType::from_extension)
            .ok_or(PolicyViolation::InvalidFileType)?;

        let content_type = match content_type.map(str::trim).filter(|s| !s.is_empty()) {
            None => document_type.mime_type().to_string(),
            Some(declared) if declared.eq_ignore_ascii_case(GENERIC_MIME) => {
                document_type.mime_type().to_string()
            }
            Some(declared) => match DocumentType::from_mime(declared) {
                Some(declared_type) if declared_type == document_type => declared.to_string(),
                _ => return Err(PolicyViolation::InvalidFileType),
            },
        };

        if size > self.max_size {
            return Err(PolicyViolation::FileTooLarge {
                size,
                max: self.max_size,
            });
        }

        Ok(AcceptedFile {
            document_type,
            content_type,
        })
    }
}
