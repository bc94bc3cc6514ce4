//! Middleware for the rental handoff API
//!
//! Request tracing, rate limiting, security headers and session
//! authentication.

pub mod auth;
mod rate_limiter;
mod security;
mod tracing;

pub use auth::AuthenticatedUser;
pub use rate_limiter::{extract_client_ip, rate_limit_layer, RateLimiter};
pub use security::{hsts_header, security_headers};
pub use tracing::request_tracing;
