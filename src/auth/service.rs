//! Authentication service
//!
//! Email/password accounts with bcrypt hashes and stateless JWT access tokens.

use std::sync::Arc;

use thiserror::Error;

use crate::models::{AuthTokenResponse, NewUser, RegisterRequest, User};
use crate::store::{Store, StoreError};

use super::jwt::{generate_access_token, JwtError};
use super::password::{hash_password, verify_password};

/// Auth service errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Email already registered")]
    EmailTaken,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Token error: {0}")]
    Token(#[from] JwtError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    jwt_secret: String,
    access_token_ttl_seconds: i64,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn Store>,
        jwt_secret: String,
        access_token_ttl_seconds: i64,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            store,
            jwt_secret,
            access_token_ttl_seconds,
            bcrypt_cost,
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }

    /// Create an account and sign it in. The very first account becomes the
    /// super-admin.
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthTokenResponse, AuthError> {
        let email = normalize_email(&request.email);
        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = hash_password(&request.password, self.bcrypt_cost)?;
        let user = self
            .store
            .create_user(NewUser {
                email,
                name: request.name.trim().to_string(),
                phone: request.phone,
                password_hash,
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => AuthError::EmailTaken,
                other => AuthError::Store(other),
            })?;

        tracing::info!(user_id = %user.id, role = user.role.as_str(), "User registered");
        self.issue(user)
    }

    /// Exchange credentials for an access token.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthTokenResponse, AuthError> {
        let user = self
            .store
            .find_user_by_email(&normalize_email(email))
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash) {
            tracing::debug!(user_id = %user.id, "Login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        self.issue(user)
    }

    fn issue(&self, user: User) -> Result<AuthTokenResponse, AuthError> {
        let access_token =
            generate_access_token(&user, &self.jwt_secret, self.access_token_ttl_seconds)?;
        Ok(AuthTokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_ttl_seconds,
            user: user.into(),
        })
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
