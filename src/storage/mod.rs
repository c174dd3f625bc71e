//! Blob storage for uploaded documents.
//!
//! Every provider implements [`BlobStore`]; which one serves the relay is a
//! configuration decision made once in [`connect`].

mod local;
mod s3;
mod signing;
mod supabase;

pub use local::{LinkRejection, LocalBlobStore, FILES_ROUTE_PREFIX};
pub use s3::S3BlobStore;
pub use signing::UrlSigner;
pub use supabase::SupabaseBlobStore;

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::SharedClock;
use crate::config::{StorageConfig, StorageProvider};
use crate::upload::SignedDownloadLink;

/// Storage error.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The backend is missing required settings.
    #[error("storage not configured: {0}")]
    NotConfigured(String),

    /// Writing the object failed.
    #[error("failed to write object: {0}")]
    Write(String),

    /// The object was written but no link could be produced.
    #[error("failed to create download link: {0}")]
    Link(String),

    /// The key is already taken.
    #[error("object already exists: {0}")]
    AlreadyExists(String),

    /// Object or path not found.
    #[error("{0} not found")]
    NotFound(String),

    /// The path is not a valid object path.
    #[error("invalid object path: {0}")]
    InvalidPath(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Metadata recorded alongside each object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    /// Content type.
    pub content_type: String,
    /// Filename as sent by the client.
    pub original_name: String,
    /// When the object was written.
    pub uploaded_at: DateTime<Utc>,
}

/// An object about to be written.
#[derive(Debug, Clone)]
pub struct PutObject {
    /// Path inside the bucket.
    pub path: String,
    /// Content.
    pub bytes: Bytes,
    /// Metadata written with the object.
    pub metadata: ObjectMetadata,
}

/// A blob store that can write objects and hand out signed read links.
///
/// Objects are never overwritten, updated or deleted through this trait.
#[async_trait]
pub trait BlobStore: Send + Sync + Debug {
    /// Which provider this is.
    fn provider(&self) -> StorageProvider;

    /// Bucket name, where the provider has one.
    fn bucket(&self) -> Option<&str> {
        None
    }

    /// Write an object in one request.
    async fn put(&self, object: PutObject) -> StorageResult<()>;

    /// Create a read-only link valid for `expires_in`.
    async fn signed_url(&self, path: &str, expires_in: Duration)
        -> StorageResult<SignedDownloadLink>;
}

/// Shared blob store handle.
pub type SharedBlobStore = Arc<dyn BlobStore>;

/// The storage backend chosen by configuration.
#[derive(Debug, Clone)]
pub enum Backend {
    /// No usable backend; uploads are refused.
    Disabled {
        /// Why the backend is unavailable.
        reason: String,
    },
    /// Local filesystem, links served by the relay.
    Local(Arc<LocalBlobStore>),
    /// A remote provider.
    Remote(SharedBlobStore),
}

impl Backend {
    /// The store to write to, if any.
    pub fn store(&self) -> Option<SharedBlobStore> {
        match self {
            Backend::Disabled { .. } => None,
            Backend::Local(local) => Some(local.clone() as SharedBlobStore),
            Backend::Remote(store) => Some(store.clone()),
        }
    }

    /// The local store, when links are served by the relay.
    pub fn local(&self) -> Option<&Arc<LocalBlobStore>> {
        match self {
            Backend::Local(local) => Some(local),
            _ => None,
        }
    }

    /// Provider name for health output.
    pub fn provider(&self) -> StorageProvider {
        match self {
            Backend::Disabled { .. } => StorageProvider::Disabled,
            Backend::Local(_) => StorageProvider::Local,
            Backend::Remote(store) => store.provider(),
        }
    }
}

/// Build the configured backend.
///
/// Missing settings or a failing initialisation leave the relay running with
/// uploads disabled.
pub async fn connect(config: &StorageConfig, public_url: &str, clock: SharedClock) -> Backend {
    if let Some(reason) = config.missing_settings() {
        tracing::warn!(provider = %config.provider, "Storage not configured: {}", reason);
        return Backend::Disabled { reason };
    }

    let result: StorageResult<Backend> = match config.provider {
        StorageProvider::Local => {
            let signer = if config.local.signing_secret.is_empty() {
                tracing::warn!(
                    "No signing secret configured; download links will not survive a restart"
                );
                UrlSigner::random()
            } else {
                UrlSigner::new(config.local.signing_secret.as_bytes())
            };
            LocalBlobStore::new(&config.local.path, public_url, signer, clock)
                .map(|store| Backend::Local(Arc::new(store)))
        }
        StorageProvider::S3 => S3BlobStore::from_config(&config.s3, clock)
            .await
            .map(|store| Backend::Remote(Arc::new(store))),
        StorageProvider::Supabase => SupabaseBlobStore::from_config(&config.supabase, clock)
            .map(|store| Backend::Remote(Arc::new(store))),
        StorageProvider::Disabled => Err(StorageError::NotConfigured(
            "storage provider is disabled".to_string(),
        )),
    };

    match result {
        Ok(backend) => {
            tracing::info!(provider = %config.provider, "Storage backend initialized");
            backend
        }
        Err(e) => {
            tracing::warn!(
                provider = %config.provider,
                "Failed to initialize storage: {}. Uploads will be disabled.",
                e
            );
            Backend::Disabled {
                reason: e.to_string(),
            }
        }
    }
}

/// Expiry timestamp for a link created at `now`.
pub(crate) fn expiry_after(
    now: DateTime<Utc>,
    expires_in: Duration,
) -> StorageResult<DateTime<Utc>> {
    i64::try_from(expires_in.as_secs())
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or_else(|| {
            StorageError::Link(format!(
                "link expiry of {}s is out of range",
                expires_in.as_secs()
            ))
        })
}
