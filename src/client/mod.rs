//! HTTP client for the relay's upload routes.
//!
//! Files are checked against the same [`UploadPolicy`] the relay enforces
//! before anything is sent. The multipart body is streamed in fixed-size
//! chunks and every chunk pulled by the transport is reported as progress.
//!
//! ```no_run
//! # async fn demo() -> Result<(), docrelay::client::UploadError> {
//! use docrelay::client::{LocalFile, UploadClient, UploadOptions};
//!
//! let client = UploadClient::new("http://localhost:3001")?;
//! let file = LocalFile::from_path("report.docx").await?;
//! let response = client
//!     .upload(&file, UploadOptions::default().with_owner("alice"))
//!     .await?;
//! println!("{}", response.file.download_url);
//! # Ok(())
//! # }
//! ```

mod error;
mod file;

pub use error::{UploadError, UploadErrorKind};
pub use file::{validate_file, LocalFile};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{stream, Stream, StreamExt};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::upload::{UploadPolicy, UploadProgress, FILE_FIELD, OWNER_FIELD};
use crate::web::dto::{UploadResponse, WordUploadResponse};

/// Size of the chunks the body is streamed in.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Progress callback.
pub type ProgressCallback = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// Per-upload options.
#[derive(Clone, Default)]
pub struct UploadOptions {
    /// Owner namespace sent as `userId`.
    pub owner_id: Option<String>,
    /// Called for every chunk sent.
    pub on_progress: Option<ProgressCallback>,
    /// Cancels the upload when fired.
    pub cancel: Option<CancellationToken>,
}

impl std::fmt::Debug for UploadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadOptions")
            .field("owner_id", &self.owner_id)
            .field("on_progress", &self.on_progress.is_some())
            .field("cancel", &self.cancel)
            .finish()
    }
}

impl UploadOptions {
    /// Set the owner namespace.
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    /// Set the progress callback.
    pub fn with_progress<F>(mut self, on_progress: F) -> Self
    where
        F: Fn(UploadProgress) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(on_progress));
        self
    }

    /// Set the cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Client for one relay.
#[derive(Debug, Clone)]
pub struct UploadClient {
    http: reqwest::Client,
    base_url: String,
    policy: UploadPolicy,
    chunk_size: usize,
}

impl UploadClient {
    /// Create a client for the relay at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, UploadError> {
        let base_url = base_url.into();
        url::Url::parse(&base_url).map_err(|e| {
            UploadError::new(UploadErrorKind::Validation, "Invalid relay URL")
                .with_details(format!("{base_url}: {e}"))
        })?;

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                UploadError::new(UploadErrorKind::Network, "Failed to create HTTP client")
                    .with_details(e.to_string())
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            policy: UploadPolicy::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Use a different upload policy for pre-flight checks.
    pub fn with_policy(mut self, policy: UploadPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Use a different chunk size (at least one byte).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Relay base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Policy used for pre-flight checks.
    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Upload to `POST /upload`.
    pub async fn upload(
        &self,
        file: &LocalFile,
        options: UploadOptions,
    ) -> Result<UploadResponse, UploadError> {
        self.send("/upload", file, options).await
    }

    /// Upload to `POST /upload-word`.
    pub async fn upload_word(
        &self,
        file: &LocalFile,
        options: UploadOptions,
    ) -> Result<WordUploadResponse, UploadError> {
        self.send("/upload-word", file, options).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        route: &str,
        file: &LocalFile,
        options: UploadOptions,
    ) -> Result<T, UploadError> {
        validate_file(&self.policy, file)?;

        let tracker = Arc::new(ProgressTracker::new(file.size(), options.on_progress));
        let body = reqwest::Body::wrap_stream(chunked(
            file.bytes.clone(),
            self.chunk_size,
            tracker.clone(),
        ));

        let part = Part::stream_with_length(body, file.size())
            .file_name(file.name.clone())
            .mime_str(&file.content_type)
            .map_err(|e| {
                UploadError::new(UploadErrorKind::Validation, "Invalid content type")
                    .with_details(e.to_string())
            })?;

        let mut form = Form::new().part(FILE_FIELD, part);
        if let Some(owner_id) = options.owner_id {
            form = form.text(OWNER_FIELD, owner_id);
        }

        let url = format!("{}{}", self.base_url, route);
        tracing::debug!(url = %url, file = %file.name, size = file.size(), "Starting upload");

        let exchange = async {
            let response = self
                .http
                .post(&url)
                .multipart(form)
                .send()
                .await
                .map_err(UploadError::network)?;
            let status = response.status();
            let body = response.bytes().await.map_err(UploadError::network)?;
            Ok::<_, UploadError>((status, body))
        };

        let (status, body) = match options.cancel {
            Some(cancel) => tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(file = %file.name, "Upload cancelled");
                    return Err(UploadError::cancelled());
                }
                result = exchange => result?,
            },
            None => exchange.await?,
        };

        if !status.is_success() {
            let err = UploadError::from_response(status, &body);
            tracing::warn!(status = status.as_u16(), "Upload rejected: {}", err);
            return Err(err);
        }

        let parsed = serde_json::from_slice::<T>(&body).map_err(UploadError::decode)?;
        tracker.finish();
        Ok(parsed)
    }
}

/// Reports monotonic progress for one body.
struct ProgressTracker {
    total: u64,
    loaded: AtomicU64,
    reported: AtomicBool,
    callback: Option<ProgressCallback>,
}

impl ProgressTracker {
    fn new(total: u64, callback: Option<ProgressCallback>) -> Self {
        Self {
            total,
            loaded: AtomicU64::new(0),
            reported: AtomicBool::new(false),
            callback,
        }
    }

    fn advance(&self, n: u64) {
        let loaded = self.loaded.fetch_add(n, Ordering::SeqCst) + n;
        self.report(loaded);
    }

    /// Emit a final `loaded == total` tick unless one was already sent.
    fn finish(&self) {
        let loaded = self.loaded.load(Ordering::SeqCst);
        if loaded < self.total || !self.reported.load(Ordering::SeqCst) {
            self.report(self.total);
        }
    }

    fn report(&self, loaded: u64) {
        self.reported.store(true, Ordering::SeqCst);
        if let Some(callback) = &self.callback {
            callback(UploadProgress::new(loaded, self.total));
        }
    }
}

/// Split `bytes` into a stream of chunks, reporting each as it is pulled.
fn chunked(
    bytes: Bytes,
    chunk_size: usize,
    tracker: Arc<ProgressTracker>,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
    let len = bytes.len();
    let chunks: Vec<Bytes> = (0..len)
        .step_by(chunk_size)
        .map(|start| bytes.slice(start..(start + chunk_size).min(len)))
        .collect();

    stream::iter(chunks).map(move |chunk| {
        tracker.advance(chunk.len() as u64);
        Ok(chunk)
    })
}
