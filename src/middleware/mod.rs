//! Middleware for the Shacker API
//!
//! Request tracing, rate limiting, security headers and bearer-token
//! authentication.

pub mod auth;
mod rate_limiter;
mod security;
mod tracing;

pub use auth::AuthenticatedPlayer;
pub use rate_limiter::{client_ip, rate_limit, RateLimiter};
pub use security::with_security_headers;
pub use tracing::request_tracing;
