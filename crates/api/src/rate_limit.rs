//! API rate limiting middleware.
//!
//! Best-effort, windowed request counting keyed by user ID or client
//! address. The counter store is injected behind [`RateLimitStore`] so
//! multi-instance deployments can swap the in-memory map for a shared
//! backend; counts are approximate by design.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use enquete_core::Claims;
use tokio::sync::RwLock;

/// Rate limit configuration for an endpoint class.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub max_requests: u32,
    /// Time window duration in seconds.
    pub window_secs: u64,
}

impl RateLimitConfig {
    /// Create a new rate limit config.
    #[must_use]
    pub const fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window_secs,
        }
    }
}

/// Default rate limits for different endpoint categories.
pub mod limits {
    use super::RateLimitConfig;

    /// Standard API endpoints: 100 requests per 15 minutes.
    pub const STANDARD: RateLimitConfig = RateLimitConfig::new(100, 900);

    /// Write operations (votes, comments, reports).
    pub const WRITE: RateLimitConfig = RateLimitConfig::new(30, 60);

    /// Authentication endpoints.
    pub const AUTH: RateLimitConfig = RateLimitConfig::new(10, 300);
}

/// Rate limit check result.
#[derive(Debug, Clone)]
pub enum RateLimitResult {
    /// Request is allowed.
    Allowed {
        /// Remaining requests in window.
        remaining: u32,
        /// Total limit.
        limit: u32,
        /// Seconds until window reset.
        reset: u64,
    },
    /// Request is rate limited.
    Limited {
        /// Seconds until rate limit resets.
        retry_after: u64,
        /// Remaining requests (0).
        remaining: u32,
        /// Total limit.
        limit: u32,
    },
}

/// Pluggable counter store backing the limiter.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Record a hit for `key` and decide whether it is allowed.
    async fn check(&self, key: &str, config: &RateLimitConfig) -> RateLimitResult;

    /// Drop stale windows.
    async fn prune(&self, max_window_secs: u64);
}

/// Window state for a single key.
#[derive(Debug, Clone)]
struct WindowState {
    count: u32,
    window_start: Instant,
}

impl WindowState {
    fn new() -> Self {
        Self {
            count: 0,
            window_start: Instant::now(),
        }
    }
}

/// In-memory counter store. Adequate for single-process deployments.
#[derive(Default)]
pub struct MemoryStore {
    states: RwLock<HashMap<String, WindowState>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked keys.
    pub async fn key_count(&self) -> usize {
        self.states.read().await.len()
    }
}

#[async_trait]
impl RateLimitStore for MemoryStore {
    async fn check(&self, key: &str, config: &RateLimitConfig) -> RateLimitResult {
        let mut states = self.states.write().await;
        let now = Instant::now();
        let window = Duration::from_secs(config.window_secs);

        let state = states.entry(key.to_string()).or_insert_with(WindowState::new);

        // Reset once the window has passed
        if now.duration_since(state.window_start) >= window {
            state.count = 0;
            state.window_start = now;
        }

        if state.count >= config.max_requests {
            let retry_after = window
                .saturating_sub(now.duration_since(state.window_start))
                .as_secs();
            return RateLimitResult::Limited {
                retry_after,
                remaining: 0,
                limit: config.max_requests,
            };
        }

        state.count += 1;
        let remaining = config.max_requests.saturating_sub(state.count);

        RateLimitResult::Allowed {
            remaining,
            limit: config.max_requests,
            reset: window
                .saturating_sub(now.duration_since(state.window_start))
                .as_secs(),
        }
    }

    async fn prune(&self, max_window_secs: u64) {
        let mut states = self.states.write().await;
        let now = Instant::now();
        let max_window = Duration::from_secs(max_window_secs * 2);

        states.retain(|_, state| now.duration_since(state.window_start) < max_window);
    }
}

/// Rate limiter state for middleware.
#[derive(Clone)]
pub struct RateLimiterState {
    store: Arc<dyn RateLimitStore>,
}

impl Default for RateLimiterState {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl RateLimiterState {
    /// Limiter backed by the in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
        }
    }

    /// Limiter backed by a custom store.
    #[must_use]
    pub fn with_store(store: Arc<dyn RateLimitStore>) -> Self {
        Self { store }
    }
}

/// Rate limit error response.
#[derive(Debug)]
pub struct RateLimitError {
    pub retry_after: u64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "message": "Too many requests, please try again later",
            "retryAfter": self.retry_after,
        });

        (
            StatusCode::TOO_MANY_REQUESTS,
            [
                ("Retry-After", self.retry_after.to_string()),
                ("Content-Type", "application/json".to_string()),
            ],
            body.to_string(),
        )
            .into_response()
    }
}

/// Extract client IP from request headers.
fn extract_client_ip(req: &Request<Body>) -> Option<IpAddr> {
    // Try X-Forwarded-For header first
    if let Some(xff) = req.headers().get("x-forwarded-for")
        && let Ok(xff_str) = xff.to_str()
        && let Some(first_ip) = xff_str.split(',').next()
        && let Ok(ip) = first_ip.trim().parse::<IpAddr>()
    {
        return Some(ip);
    }

    // Try X-Real-IP header
    if let Some(real_ip) = req.headers().get("x-real-ip")
        && let Ok(ip_str) = real_ip.to_str()
        && let Ok(ip) = ip_str.parse::<IpAddr>()
    {
        return Some(ip);
    }

    None
}

/// Rate limiting middleware with the standard limit.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiterState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, RateLimitError> {
    rate_limit_with_config(limiter, req, next, &limits::STANDARD).await
}

async fn rate_limit_with_config(
    limiter: RateLimiterState,
    req: Request<Body>,
    next: Next,
    config: &RateLimitConfig,
) -> Result<Response, RateLimitError> {
    // Authenticated requests count per user, anonymous ones per address
    let key = if let Some(claims) = req.extensions().get::<Claims>() {
        format!("user:{}", claims.sub)
    } else if let Some(ip) = extract_client_ip(&req) {
        format!("ip:{ip}")
    } else {
        "unknown".to_string()
    };

    match limiter.store.check(&key, config).await {
        RateLimitResult::Allowed {
            remaining,
            limit,
            reset,
        } => {
            let mut response = next.run(req).await;

            let headers = response.headers_mut();
            headers.insert("X-RateLimit-Limit", limit.into());
            headers.insert("X-RateLimit-Remaining", remaining.into());
            headers.insert("X-RateLimit-Reset", reset.into());

            Ok(response)
        }
        RateLimitResult::Limited { retry_after, .. } => Err(RateLimitError { retry_after }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_allows_requests() {
        let store = MemoryStore::new();
        let config = RateLimitConfig::new(5, 60);

        for _ in 0..5 {
            match store.check("test_user", &config).await {
                RateLimitResult::Allowed { .. } => {}
                RateLimitResult::Limited { .. } => panic!("Expected Allowed"),
            }
        }
    }

    #[tokio::test]
    async fn test_memory_store_blocks_after_limit() {
        let store = MemoryStore::new();
        let config = RateLimitConfig::new(3, 60);

        for _ in 0..3 {
            store.check("test_user", &config).await;
        }

        match store.check("test_user", &config).await {
            RateLimitResult::Limited { retry_after, .. } => {
                assert!(retry_after > 0);
            }
            RateLimitResult::Allowed { .. } => panic!("Expected Limited"),
        }
    }

    #[tokio::test]
    async fn test_memory_store_separate_keys() {
        let store = MemoryStore::new();
        let config = RateLimitConfig::new(2, 60);

        store.check("user_a", &config).await;
        store.check("user_a", &config).await;

        match store.check("user_b", &config).await {
            RateLimitResult::Allowed { .. } => {}
            RateLimitResult::Limited { .. } => panic!("Expected Allowed for user_b"),
        }
    }

    #[tokio::test]
    async fn test_rate_limit_reports_remaining() {
        let store = MemoryStore::new();
        let config = RateLimitConfig::new(10, 60);

        match store.check("test", &config).await {
            RateLimitResult::Allowed {
                remaining,
                limit,
                reset,
            } => {
                assert_eq!(limit, 10);
                assert_eq!(remaining, 9);
                assert!(reset <= 60);
            }
            RateLimitResult::Limited { .. } => panic!("Expected Allowed"),
        }
    }

    #[tokio::test]
    async fn test_prune_keeps_fresh_entries() {
        let store = MemoryStore::new();
        let config = RateLimitConfig::new(10, 60);

        store.check("user1", &config).await;
        store.check("user2", &config).await;
        assert_eq!(store.key_count().await, 2);

        store.prune(60).await;
        assert_eq!(store.key_count().await, 2);
    }

    #[tokio::test]
    async fn test_swappable_store() {
        // A store that rejects everything, standing in for a shared backend
        struct DenyAll;

        #[async_trait]
        impl RateLimitStore for DenyAll {
            async fn check(&self, _key: &str, config: &RateLimitConfig) -> RateLimitResult {
                RateLimitResult::Limited {
                    retry_after: config.window_secs,
                    remaining: 0,
                    limit: config.max_requests,
                }
            }

            async fn prune(&self, _max_window_secs: u64) {}
        }

        let limiter = RateLimiterState::with_store(Arc::new(DenyAll));
        match limiter.store.check("any", &limits::STANDARD).await {
            RateLimitResult::Limited { .. } => {}
            RateLimitResult::Allowed { .. } => panic!("Expected Limited"),
        }
    }
}
