//! S3-compatible blob store.
//!
//! Works with AWS S3, MinIO and Google Cloud Storage in interoperability mode
//! (HMAC keys against `https://storage.googleapis.com`).

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use serde::Deserialize;

use super::{expiry_after, BlobStore, PutObject, StorageError, StorageResult};
use crate::clock::SharedClock;
use crate::config::{S3StorageConfig, StorageProvider};
use crate::upload::SignedDownloadLink;

/// Longest validity S3 accepts for a presigned URL.
pub const MAX_PRESIGN_EXPIRY: Duration = Duration::from_secs(7 * 24 * 3600);

/// Contents of the key file referenced by `storage.s3.key_file`.
#[derive(Debug, Deserialize)]
struct KeyFile {
    access_key_id: String,
    secret_access_key: String,
}

/// S3-backed blob store.
#[derive(Debug, Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
    clock: SharedClock,
}

impl S3BlobStore {
    /// Wrap an existing client.
    pub fn new(client: Client, bucket: impl Into<String>, clock: SharedClock) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            clock,
        }
    }

    /// Build a client from configuration.
    ///
    /// With a key file the static credentials in it are used, otherwise the
    /// default AWS credential chain.
    pub async fn from_config(config: &S3StorageConfig, clock: SharedClock) -> StorageResult<Self> {
        let region = Region::new(config.region.clone());

        let mut builder = match &config.key_file {
            Some(key_file) => {
                let raw = tokio::fs::read(key_file).await.map_err(|e| {
                    StorageError::NotConfigured(format!("cannot read key file {key_file}: {e}"))
                })?;
                let keys: KeyFile = serde_json::from_slice(&raw).map_err(|e| {
                    StorageError::NotConfigured(format!("invalid key file {key_file}: {e}"))
                })?;
                aws_sdk_s3::config::Builder::new()
                    .behavior_version(BehaviorVersion::latest())
                    .region(region)
                    .credentials_provider(Credentials::new(
                        keys.access_key_id,
                        keys.secret_access_key,
                        None,
                        None,
                        "docrelay-key-file",
                    ))
            }
            None => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
            }
        };

        builder = builder.force_path_style(config.force_path_style);

        if let Some(endpoint) = &config.endpoint {
            let endpoint_url = if endpoint.starts_with("http") {
                endpoint.clone()
            } else {
                format!("https://{}", endpoint)
            };
            builder = builder.endpoint_url(endpoint_url);
        }

        if let Some(project) = &config.project_id {
            tracing::info!(project = %project, bucket = %config.bucket, "Using S3-compatible storage");
        }

        Ok(Self::new(
            Client::from_conf(builder.build()),
            config.bucket.clone(),
            clock,
        ))
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    fn provider(&self) -> StorageProvider {
        StorageProvider::S3
    }

    fn bucket(&self) -> Option<&str> {
        Some(&self.bucket)
    }

    async fn put(&self, object: PutObject) -> StorageResult<()> {
        let size = object.bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object.path)
            .body(ByteStream::from(object.bytes))
            .content_type(&object.metadata.content_type)
            .metadata(
                "original-name",
                urlencoding::encode(&object.metadata.original_name),
            )
            .metadata("uploaded-at", object.metadata.uploaded_at.to_rfc3339())
            .send()
            .await
            .map_err(|e| StorageError::Write(format!("{}", DisplayErrorContext(&e))))?;

        tracing::debug!(bucket = %self.bucket, path = %object.path, size, "Stored object in S3");
        Ok(())
    }

    async fn signed_url(
        &self,
        path: &str,
        expires_in: Duration,
    ) -> StorageResult<SignedDownloadLink> {
        let expires_in = expires_in.min(MAX_PRESIGN_EXPIRY);
        let now = self.clock.now();
        let expires_at = expiry_after(now, expires_in)?;

        let presigning = PresigningConfig::builder()
            .start_time(SystemTime::from(now))
            .expires_in(expires_in)
            .build()
            .map_err(|e| StorageError::Link(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Link(format!("{}", DisplayErrorContext(&e))))?;

        Ok(SignedDownloadLink {
            url: request.uri().to_string(),
            expires_at,
            expires_in: expires_in.as_secs(),
        })
    }
}
