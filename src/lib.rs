//! docrelay - Word document upload relay
//!
//! An HTTP service that accepts one `.doc`/`.docx` file per request, stores it
//! in a blob store under a generated key and answers with a time-limited
//! signed download link, plus the client side: an upload client with
//! pre-flight validation, progress and cancellation, and an upload widget
//! state machine.

pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod storage;
pub mod upload;
pub mod web;
pub mod widget;

pub use client::{LocalFile, UploadClient, UploadError, UploadErrorKind, UploadOptions};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{Config, StorageProvider};
pub use error::{RelayError, Result};
pub use storage::{Backend, BlobStore, StorageError};
pub use upload::{
    format_file_size, ObjectLayout, SignedDownloadLink, StoredObject, UploadPolicy, UploadProgress,
    UploadRequest,
};
pub use web::{create_router, AppState, UploadServer};
pub use widget::{UploadWidget, WidgetError, WidgetState};
