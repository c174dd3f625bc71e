//! Test helpers for relay integration tests.
//!
//! Provides a router backed by a temporary local store and a manual clock,
//! plus builders for multipart bodies and document payloads.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use docrelay::config::{Config, StorageProvider, WebConfig};
use docrelay::storage::{Backend, LocalBlobStore, PutObject, StorageError, StorageResult, UrlSigner};
use docrelay::upload::SignedDownloadLink;
use docrelay::{create_router, AppState, BlobStore, ManualClock, SharedClock, UploadServer};

pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const DOC_MIME: &str = "application/msword";
pub const MB: usize = 1024 * 1024;

/// Public URL the local store builds links against.
pub const PUBLIC_URL: &str = "http://relay.test";

/// A router over a temporary local store.
pub struct TestApp {
    pub server: TestServer,
    pub clock: Arc<ManualClock>,
    pub store: Arc<LocalBlobStore>,
    _dir: TempDir,
}

impl TestApp {
    /// Relay with default settings and rate limiting disabled.
    pub fn new() -> Self {
        Self::with_state(|state| state)
    }

    /// Relay whose state is adjusted before the router is built.
    pub fn with_state<F>(adjust: F) -> Self
    where
        F: FnOnce(AppState) -> AppState,
    {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap(),
        ));
        let shared: SharedClock = clock.clone();
        let store = Arc::new(
            LocalBlobStore::new(
                dir.path(),
                PUBLIC_URL,
                UrlSigner::new(b"integration-secret"),
                shared.clone(),
            )
            .expect("Failed to create local store"),
        );

        let state = adjust(AppState::new(Backend::Local(store.clone()), shared));
        let router = create_router(Arc::new(state), &test_web_config());
        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            clock,
            store,
            _dir: dir,
        }
    }

    /// Number of objects written to the store, metadata sidecars excluded.
    pub fn object_count(&self) -> usize {
        count_objects(self.store.base_path())
    }
}

/// Router whose storage backend is unavailable.
pub fn disabled_server(reason: &str) -> TestServer {
    disabled_server_with(reason, &test_web_config())
}

/// Router without a storage backend, built with the given web settings.
pub fn disabled_server_with(reason: &str, web_config: &WebConfig) -> TestServer {
    let clock: SharedClock = Arc::new(ManualClock::new(Utc::now()));
    let state = AppState::new(
        Backend::Disabled {
            reason: reason.to_string(),
        },
        clock,
    );
    TestServer::new(create_router(Arc::new(state), web_config))
        .expect("Failed to create test server")
}

/// Which remote call a [`FailingStore`] refuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Put,
    SignedUrl,
}

/// Remote store double that fails one stage of an upload.
#[derive(Debug)]
pub struct FailingStore {
    fail_at: FailAt,
    puts: AtomicUsize,
}

impl FailingStore {
    pub fn new(fail_at: FailAt) -> Self {
        Self {
            fail_at,
            puts: AtomicUsize::new(0),
        }
    }

    /// Number of accepted writes.
    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for FailingStore {
    fn provider(&self) -> StorageProvider {
        StorageProvider::S3
    }

    fn bucket(&self) -> Option<&str> {
        Some("docs")
    }

    async fn put(&self, _object: PutObject) -> StorageResult<()> {
        if self.fail_at == FailAt::Put {
            return Err(StorageError::Write("bucket docs is read-only".to_string()));
        }
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn signed_url(
        &self,
        _path: &str,
        _expires_in: Duration,
    ) -> StorageResult<SignedDownloadLink> {
        Err(StorageError::Link("presigning key revoked".to_string()))
    }
}

/// Router over a [`FailingStore`], with internal details exposed or hidden.
pub fn failing_server(fail_at: FailAt, expose_details: bool) -> (TestServer, Arc<FailingStore>) {
    let store = Arc::new(FailingStore::new(fail_at));
    let clock: SharedClock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap(),
    ));
    let state = AppState::new(Backend::Remote(store.clone()), clock)
        .with_expose_details(expose_details);
    let server = TestServer::new(create_router(Arc::new(state), &test_web_config()))
        .expect("Failed to create test server");
    (server, store)
}

/// Web configuration without rate limiting.
pub fn test_web_config() -> WebConfig {
    WebConfig {
        cors_origins: vec![],
        upload_rate_limit: 0,
        trust_proxy: false,
    }
}

/// Start a real relay on an ephemeral port backed by `dir`.
pub async fn spawn_relay(dir: &TempDir, clock: SharedClock) -> SocketAddr {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.web.upload_rate_limit = 0;
    config.storage.local.path = dir.path().to_string_lossy().to_string();
    config.storage.local.signing_secret = "integration-secret".to_string();

    UploadServer::new(config)
        .with_clock(clock)
        .run_with_addr()
        .await
        .expect("Failed to start relay")
}

/// Document content of the given size.
pub fn document_bytes(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

/// Multipart form with a single file part.
pub fn file_form(name: &str, mime: &str, content: Vec<u8>) -> MultipartForm {
    MultipartForm::new().add_part("file", Part::bytes(content).file_name(name).mime_type(mime))
}

/// Split a download URL into its path and query pairs.
pub fn split_link(download_url: &str) -> (String, Vec<(String, String)>) {
    let url = url::Url::parse(download_url).expect("download URL should parse");
    let query = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    (url.path().to_string(), query)
}

fn count_objects(dir: &std::path::Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                count_objects(&path)
            } else if path.to_string_lossy().ends_with(".meta.json") {
                0
            } else {
                1
            }
        })
        .sum()
}
