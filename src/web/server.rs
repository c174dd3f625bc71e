//! Web server for the relay.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::clock::{system_clock, SharedClock};
use crate::config::Config;
use crate::storage::{self, Backend};

use super::handlers::AppState;
use super::router::create_router;

/// Upload relay server.
pub struct UploadServer {
    config: Config,
    clock: SharedClock,
    backend: Option<Backend>,
}

impl UploadServer {
    /// Create a new server from configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            clock: system_clock(),
            backend: None,
        }
    }

    /// Use a different time source.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Use an already built backend instead of connecting from configuration.
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Bind the listener and build the router.
    ///
    /// The storage backend is connected after binding so that local download
    /// links can default to the bound address.
    async fn bind(self) -> Result<(TcpListener, Router, SocketAddr), std::io::Error> {
        let server = &self.config.server;
        let listener = TcpListener::bind((server.host.as_str(), server.port)).await?;
        let local_addr = listener.local_addr()?;

        let public_url = if server.public_url.is_empty() {
            default_public_url(local_addr)
        } else {
            server.public_url.clone()
        };

        let backend = match self.backend {
            Some(backend) => backend,
            None => storage::connect(&self.config.storage, &public_url, self.clock.clone()).await,
        };

        let app_state = AppState::from_config(&self.config, backend, self.clock);
        let router = create_router(Arc::new(app_state), &self.config.web);

        tracing::info!(
            environment = %server.environment,
            public_url = %public_url,
            "Upload server listening on http://{}",
            local_addr
        );

        Ok((listener, router, local_addr))
    }

    /// Run the server until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (listener, router, _) = self.bind().await?;

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
    }

    /// Run the server and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> Result<SocketAddr, std::io::Error> {
        let (listener, router, local_addr) = self.bind().await?;

        tokio::spawn(async move {
            let service = router.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, service).await {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}

/// Public URL for a bound address, with unspecified hosts mapped to localhost.
fn default_public_url(addr: SocketAddr) -> String {
    if addr.ip().is_unspecified() {
        format!("http://localhost:{}", addr.port())
    } else {
        format!("http://{}", addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config(storage_path: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 0;
        config.storage.local.path = storage_path.to_string_lossy().to_string();
        config.storage.local.signing_secret = "test-secret".to_string();
        config
    }

    #[test]
    fn test_default_public_url() {
        assert_eq!(
            default_public_url("0.0.0.0:3001".parse().unwrap()),
            "http://localhost:3001"
        );
        assert_eq!(
            default_public_url("127.0.0.1:8080".parse().unwrap()),
            "http://127.0.0.1:8080"
        );
    }

    #[tokio::test]
    async fn test_upload_server_run() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let server = UploadServer::new(create_test_config(temp_dir.path()));
        let addr = server.run_with_addr().await.unwrap();

        let client = reqwest::Client::new();
        let resp = client
            .get(format!("http://{}/upload/health", addr))
            .send()
            .await
            .unwrap();

        assert!(resp.status().is_success());
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["provider"], "local");
    }
}
