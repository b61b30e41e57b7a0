//! HTTP API layer for enquete-rs.
//!
//! This crate provides the REST API:
//!
//! - **Endpoints**: users, polls, comments and reports
//! - **Extractors**: bearer-token authentication and admin gating
//! - **Middleware**: token verification, rate limiting
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod rate_limit;
pub mod response;

pub use endpoints::router;
pub use rate_limit::{MemoryStore, RateLimitConfig, RateLimitStore, RateLimiterState};
