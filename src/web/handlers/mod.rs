//! API handlers for the relay.

pub mod download;
pub mod health;
pub mod upload;

pub use download::*;
pub use health::*;
pub use upload::*;

use std::time::Duration;

use crate::clock::SharedClock;
use crate::config::{Config, UploadConfig};
use crate::storage::Backend;
use crate::upload::UploadPolicy;

/// Application state shared across handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Configured storage backend.
    pub backend: Backend,
    /// Upload acceptance rules.
    pub policy: UploadPolicy,
    /// Owner and link expiry settings.
    pub upload: UploadConfig,
    /// Time source for timestamps and link expiry.
    pub clock: SharedClock,
    /// Include internal error details in responses.
    pub expose_details: bool,
}

impl AppState {
    /// Create a new application state with default upload settings.
    pub fn new(backend: Backend, clock: SharedClock) -> Self {
        Self {
            backend,
            policy: UploadPolicy::default(),
            upload: UploadConfig::default(),
            clock,
            expose_details: false,
        }
    }

    /// Create application state from configuration.
    pub fn from_config(config: &Config, backend: Backend, clock: SharedClock) -> Self {
        Self::new(backend, clock)
            .with_policy(UploadPolicy::new(config.files.max_upload_bytes()))
            .with_upload_config(config.upload.clone())
            .with_expose_details(config.server.is_development())
    }

    /// Set the upload policy.
    pub fn with_policy(mut self, policy: UploadPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set owner and link expiry settings.
    pub fn with_upload_config(mut self, upload: UploadConfig) -> Self {
        self.upload = upload;
        self
    }

    /// Set whether internal error details are returned to clients.
    pub fn with_expose_details(mut self, expose: bool) -> Self {
        self.expose_details = expose;
        self
    }

    /// Link validity for `POST /upload`.
    pub fn link_expiry(&self) -> Duration {
        Duration::from_secs(self.upload.link_expiry_secs)
    }

    /// Link validity for `POST /upload-word`.
    pub fn word_link_expiry(&self) -> Duration {
        Duration::from_secs(self.upload.word_link_expiry_secs)
    }
}
