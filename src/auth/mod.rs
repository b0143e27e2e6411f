//! Authentication module
//!
//! - bcrypt password hashing
//! - JWT access token generation and validation
//! - Registration with first-account super-admin bootstrap

mod jwt;
mod password;
mod service;

pub use jwt::{generate_access_token, verify_token, Claims, JwtError};
pub use password::{hash_password, verify_password};
pub use service::{AuthError, AuthService};
