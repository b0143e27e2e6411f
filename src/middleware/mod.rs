//! Middleware for the microloan API
//!
//! Request tracing, rate limiting, JWT extractors and the partner API key
//! gate.

pub mod api_key;
pub mod auth;
mod rate_limiter;
mod tracing;

pub use api_key::{require_api_key, PartnerContext, API_KEY_HEADER, PARTNER_ID_HEADER};
pub use auth::{AdminUser, AuthenticatedUser, SuperAdminUser};
pub use rate_limiter::{rate_limit, RateLimiter};
pub use self::tracing::request_tracing;
