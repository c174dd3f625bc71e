//! Supabase Storage blob store (REST API).

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::json;

use super::{expiry_after, BlobStore, PutObject, StorageError, StorageResult};
use crate::clock::SharedClock;
use crate::config::{StorageProvider, SupabaseStorageConfig};
use crate::upload::SignedDownloadLink;

#[derive(Debug, Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Supabase-backed blob store.
#[derive(Debug, Clone)]
pub struct SupabaseBlobStore {
    http: reqwest::Client,
    base_url: String,
    key: String,
    bucket: String,
    clock: SharedClock,
}

impl SupabaseBlobStore {
    /// Create a store for a Supabase project.
    pub fn new(
        base_url: &str,
        key: impl Into<String>,
        bucket: impl Into<String>,
        clock: SharedClock,
    ) -> StorageResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| StorageError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            key: key.into(),
            bucket: bucket.into(),
            clock,
        })
    }

    /// Create a store from configuration.
    pub fn from_config(config: &SupabaseStorageConfig, clock: SharedClock) -> StorageResult<Self> {
        url::Url::parse(&config.url)
            .map_err(|e| StorageError::NotConfigured(format!("invalid Supabase URL: {e}")))?;
        Self::new(&config.url, config.key.clone(), config.bucket.clone(), clock)
    }

    fn object_url(&self, action: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object{}/{}/{}",
            self.base_url, action, self.bucket, path
        )
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header(AUTHORIZATION, format!("Bearer {}", self.key))
            .header("apikey", &self.key)
    }

    async fn failure_message(response: reqwest::Response) -> String {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .ok()
            .and_then(|e| e.message.or(e.error))
            .unwrap_or(body);
        format!("{status}: {message}")
    }
}

#[async_trait]
impl BlobStore for SupabaseBlobStore {
    fn provider(&self) -> StorageProvider {
        StorageProvider::Supabase
    }

    fn bucket(&self) -> Option<&str> {
        Some(&self.bucket)
    }

    async fn put(&self, object: PutObject) -> StorageResult<()> {
        // Storage keeps user metadata from a base64 JSON header on binary uploads
        let metadata = serde_json::to_vec(&object.metadata)
            .map_err(|e| StorageError::Write(format!("metadata encoding failed: {e}")))?;

        let response = self
            .authorized(self.http.post(self.object_url("", &object.path)))
            .header(CONTENT_TYPE, &object.metadata.content_type)
            .header(CACHE_CONTROL, "max-age=3600")
            .header("x-upsert", "false")
            .header("x-metadata", STANDARD.encode(metadata))
            .body(object.bytes)
            .send()
            .await
            .map_err(|e| StorageError::Write(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StorageError::Write(Self::failure_message(response).await));
        }

        tracing::debug!(bucket = %self.bucket, path = %object.path, "Stored object in Supabase");
        Ok(())
    }

    async fn signed_url(
        &self,
        path: &str,
        expires_in: Duration,
    ) -> StorageResult<SignedDownloadLink> {
        let expires_at = expiry_after(self.clock.now(), expires_in)?;
        let response = self
            .authorized(self.http.post(self.object_url("/sign", path)))
            .json(&json!({ "expiresIn": expires_in.as_secs() }))
            .send()
            .await
            .map_err(|e| StorageError::Link(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StorageError::Link(Self::failure_message(response).await));
        }

        let signed: SignResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Link(format!("unexpected sign response: {e}")))?;

        let url = if signed.signed_url.starts_with("http") {
            signed.signed_url
        } else {
            format!("{}/storage/v1{}", self.base_url, signed.signed_url)
        };

        Ok(SignedDownloadLink {
            url,
            expires_at,
            expires_in: expires_in.as_secs(),
        })
    }
}
