//! Per-IP upload rate limiting.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::{fmt, net::SocketAddr, num::NonZeroU32, sync::Arc, time::Duration};

use crate::web::error::ApiError;

/// Rate limiter keyed by client IP using Governor.
pub type IpRateLimiter = DefaultKeyedRateLimiter<String>;

/// State for upload rate limiting.
#[derive(Clone)]
pub struct RateLimitState {
    /// Upload limiter, `None` when limiting is disabled.
    upload_limiter: Option<Arc<IpRateLimiter>>,
    /// Read the client IP from reverse proxy headers.
    trust_proxy: bool,
}

impl fmt::Debug for RateLimitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitState")
            .field("enabled", &self.is_enabled())
            .field("tracked_clients", &self.tracked_clients())
            .field("trust_proxy", &self.trust_proxy)
            .finish()
    }
}

impl RateLimitState {
    /// Create a new rate limit state.
    ///
    /// `upload_rate_limit` is in requests per minute; 0 disables limiting.
    pub fn new(upload_rate_limit: u32, trust_proxy: bool) -> Self {
        let quota = NonZeroU32::new(upload_rate_limit).map(Quota::per_minute);
        Self::with_quota(quota, trust_proxy)
    }

    fn with_quota(quota: Option<Quota>, trust_proxy: bool) -> Self {
        Self {
            upload_limiter: quota.map(|q| Arc::new(RateLimiter::keyed(q))),
            trust_proxy,
        }
    }

    /// Whether limiting is active.
    pub fn is_enabled(&self) -> bool {
        self.upload_limiter.is_some()
    }

    /// Check if an upload is allowed for the given IP.
    pub fn check_upload(&self, ip: &str) -> bool {
        match &self.upload_limiter {
            Some(limiter) => limiter.check_key(&ip.to_string()).is_ok(),
            None => true,
        }
    }

    /// Number of clients with limiter state.
    pub fn tracked_clients(&self) -> usize {
        self.upload_limiter.as_ref().map_or(0, |l| l.len())
    }

    /// Forget clients whose quota has fully refilled.
    ///
    /// A client still inside its window keeps its state.
    pub fn cleanup(&self) {
        if let Some(limiter) = &self.upload_limiter {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
    }

    /// Start a background task to periodically clean up old entries.
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(300)).await;
                self.cleanup();
                tracing::debug!(clients = self.tracked_clients(), "Rate limiter cleanup");
            }
        });
    }
}

/// Extract client IP from request.
///
/// Proxy headers are only read when `trust_proxy` is set; otherwise any
/// client could pick its own rate limit key.
fn get_client_ip(req: &Request<Body>, trust_proxy: bool) -> String {
    if trust_proxy {
        // First hop wins
        if let Some(forwarded) = req
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
        {
            if let Some(ip) = forwarded.split(',').next().map(str::trim) {
                if !ip.is_empty() {
                    return ip.to_string();
                }
            }
        }

        if let Some(real_ip) = req
            .headers()
            .get("X-Real-IP")
            .and_then(|v| v.to_str().ok())
        {
            return real_ip.trim().to_string();
        }
    }

    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}

/// Rate limiting middleware for the upload routes.
pub async fn upload_rate_limit(
    state: Arc<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = get_client_ip(&req, state.trust_proxy);

    if !state.check_upload(&ip) {
        tracing::warn!(ip = %ip, "Upload rate limit exceeded");
        return ApiError::too_many_requests().into_response();
    }

    next.run(req).await
}
