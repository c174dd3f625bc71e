//! Upload client errors.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::upload::PolicyViolation;
use crate::web::error::{ErrorBody, ErrorCode};

/// Category of an upload failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadErrorKind {
    /// Rejected by local pre-flight checks or a 4xx response.
    Validation,
    /// The relay has no storage configured (503).
    Configuration,
    /// The relay failed to store the file or create a link (other 5xx).
    Storage,
    /// The request did not complete.
    Network,
    /// The caller cancelled the upload.
    Cancelled,
    /// A 2xx response whose body could not be decoded.
    Decode,
}

/// An upload failure, shaped like the relay's error body.
#[derive(Debug, Clone, Error)]
#[error("{error}")]
pub struct UploadError {
    /// Failure category.
    pub kind: UploadErrorKind,
    /// Short message.
    pub error: String,
    /// Longer explanation, when available.
    pub details: Option<String>,
    /// Relay error code, when the relay sent one.
    pub code: Option<ErrorCode>,
    /// HTTP status, when a response was received.
    pub status: Option<u16>,
}

/// Error bodies the client understands: the relay's own shape, and the flat
/// `{error, details}` shape of older relays and proxies.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireError {
    Structured(ErrorBody),
    Flat {
        error: String,
        #[serde(default)]
        details: Option<String>,
        #[serde(default)]
        instructions: Option<String>,
    },
}

impl UploadError {
    /// Create an error of the given kind.
    pub fn new(kind: UploadErrorKind, error: impl Into<String>) -> Self {
        Self {
            kind,
            error: error.into(),
            details: None,
            code: None,
            status: None,
        }
    }

    /// Attach an explanation.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Error raised when the caller cancels.
    pub fn cancelled() -> Self {
        Self::new(UploadErrorKind::Cancelled, "Upload cancelled").with_details("Upload was aborted")
    }

    pub(crate) fn network(err: reqwest::Error) -> Self {
        Self::new(UploadErrorKind::Network, "Network error")
            .with_details(format!("Failed to connect to server: {err}"))
    }

    pub(crate) fn decode(err: impl std::fmt::Display) -> Self {
        Self::new(UploadErrorKind::Decode, "Failed to parse response").with_details(err.to_string())
    }

    /// Build an error from a non-2xx response.
    pub fn from_response(status: StatusCode, body: &[u8]) -> Self {
        let kind = match status {
            StatusCode::SERVICE_UNAVAILABLE => UploadErrorKind::Configuration,
            s if s.is_client_error() => UploadErrorKind::Validation,
            _ => UploadErrorKind::Storage,
        };

        let mut error = match serde_json::from_slice::<WireError>(body) {
            Ok(WireError::Structured(body)) => Self {
                kind,
                error: body.error.message,
                details: body.error.details,
                code: Some(body.error.code),
                status: None,
            },
            Ok(WireError::Flat {
                error,
                details,
                instructions,
            }) => Self {
                kind,
                error,
                details: details.or(instructions),
                code: None,
                status: None,
            },
            Err(_) => Self::new(kind, "Upload failed")
                .with_details(format!("Server returned status {}", status.as_u16())),
        };
        error.status = Some(status.as_u16());
        error
    }
}

impl From<PolicyViolation> for UploadError {
    fn from(violation: PolicyViolation) -> Self {
        let code = match violation {
            PolicyViolation::InvalidFileType => ErrorCode::InvalidFileType,
            PolicyViolation::FileTooLarge { .. } => ErrorCode::FileTooLarge,
        };
        Self {
            kind: UploadErrorKind::Validation,
            error: violation.to_string(),
            details: Some(violation.details()),
            code: Some(code),
            status: None,
        }
    }
}
