//! API handlers for the microloan backend

pub mod api_key;
pub mod auth;
pub mod form_series;
pub mod health;
pub mod loan;
pub mod partner;
pub mod user;

// Re-export extractors for handler use
pub use crate::middleware::auth::{AdminUser, AuthenticatedUser, SuperAdminUser};
pub use crate::middleware::PartnerContext;
