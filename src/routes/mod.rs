//! Route definitions for the microloan API

mod admin;
mod auth;
mod loan;
mod partner;
mod user;

pub use admin::admin_routes;
pub use auth::auth_routes;
pub use loan::loan_routes;
pub use partner::partner_routes;
pub use user::user_routes;
