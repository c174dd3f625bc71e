//! API error handling for the relay.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::StorageError;
use crate::upload::PolicyViolation;

/// API error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed request (400).
    BadRequest,
    /// No file in the request (400).
    NoFile,
    /// File type not on the allow-list (400).
    InvalidFileType,
    /// File exceeds the size limit (400).
    FileTooLarge,
    /// Owner identifier has invalid characters or length (400).
    InvalidOwner,
    /// Owner identifier missing while required (400).
    OwnerRequired,
    /// Download link signature mismatch (403).
    InvalidSignature,
    /// Download link past its expiry (403).
    LinkExpired,
    /// Not found (404).
    NotFound,
    /// Rate limit exceeded (429).
    TooManyRequests,
    /// Storage write failed (500).
    UploadFailed,
    /// Object written but link generation failed (500).
    LinkGenerationFailed,
    /// Internal server error (500).
    InternalError,
    /// Storage backend not configured (503).
    StorageNotConfigured,
}

impl ErrorCode {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest
            | ErrorCode::NoFile
            | ErrorCode::InvalidFileType
            | ErrorCode::FileTooLarge
            | ErrorCode::InvalidOwner
            | ErrorCode::OwnerRequired => StatusCode::BAD_REQUEST,
            ErrorCode::InvalidSignature | ErrorCode::LinkExpired => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::UploadFailed
            | ErrorCode::LinkGenerationFailed
            | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::StorageNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// API error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Always `false`.
    pub success: bool,
    /// Error details.
    pub error: ErrorDetail,
}

/// Error detail.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Additional explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Stage of an upload at which storage failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageStage {
    /// Writing the object.
    Write,
    /// Creating the download link after a successful write.
    Link,
}

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
    details: Option<String>,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Attach an explanation.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Create a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Create a "no file uploaded" error.
    pub fn no_file() -> Self {
        Self::new(ErrorCode::NoFile, "No file uploaded")
    }

    /// Create a rate limit error.
    pub fn too_many_requests() -> Self {
        Self::new(
            ErrorCode::TooManyRequests,
            "Too many uploads. Please try again later.",
        )
    }

    /// Create an internal server error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Create a "storage not configured" error with setup instructions.
    pub fn storage_not_configured(reason: &str) -> Self {
        Self::new(
            ErrorCode::StorageNotConfigured,
            "File upload service not configured",
        )
        .with_details(format!(
            "{reason}. Set storage.provider and its settings in config.toml \
             (or STORAGE_PROVIDER and the matching environment variables)."
        ))
    }

    /// Map a storage failure, logging it.
    ///
    /// Internal details are only included when `expose_details` is set
    /// (development mode).
    pub fn from_storage(err: &StorageError, stage: StorageStage, expose_details: bool) -> Self {
        let api_error = match (err, stage) {
            (StorageError::NotConfigured(reason), _) => {
                return Self::storage_not_configured(reason);
            }
            (_, StorageStage::Write) => {
                tracing::error!(error = %err, "Upload to storage failed");
                Self::new(ErrorCode::UploadFailed, "Failed to upload file to storage")
            }
            (_, StorageStage::Link) => {
                tracing::error!(error = %err, "Signed URL generation failed");
                Self::new(
                    ErrorCode::LinkGenerationFailed,
                    "File uploaded but failed to generate download URL",
                )
            }
        };

        if expose_details {
            api_error.with_details(err.to_string())
        } else {
            api_error
        }
    }
}

impl From<PolicyViolation> for ApiError {
    fn from(violation: PolicyViolation) -> Self {
        let code = match violation {
            PolicyViolation::InvalidFileType => ErrorCode::InvalidFileType,
            PolicyViolation::FileTooLarge { .. } => ErrorCode::FileTooLarge,
        };
        let details = violation.details();
        Self::new(code, violation.to_string()).with_details(details)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status_code();
        let body = ErrorBody {
            success: false,
            error: ErrorDetail {
                code: self.code,
                message: self.message,
                details: self.details,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}
