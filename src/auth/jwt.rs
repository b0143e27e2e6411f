//! JWT access token generation and validation

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{User, UserRole};

/// JWT-related errors
#[derive(Error, Debug)]
pub enum JwtError {
    #[error("Token encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Token decoding failed: {0}")]
    DecodingFailed(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

/// JWT claims carried by staff and borrower access tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    pub email: String,
    /// Role at issue time
    pub role: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, JwtError> {
        Uuid::parse_str(&self.sub).map_err(|e| JwtError::InvalidToken(e.to_string()))
    }

    pub fn role(&self) -> Result<UserRole, JwtError> {
        UserRole::parse(&self.role)
            .ok_or_else(|| JwtError::InvalidToken(format!("unknown role '{}'", self.role)))
    }
}

/// Generate an access token for a user
///
/// # Arguments
/// * `user` - The authenticated user
/// * `secret` - JWT signing secret
/// * `ttl_seconds` - Token time-to-live in seconds
pub fn generate_access_token(user: &User, secret: &str, ttl_seconds: i64) -> Result<String, JwtError> {
    let now = Utc::now();
    let exp = now + Duration::seconds(ttl_seconds);

    let claims = Claims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        role: user.role.as_str().to_string(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| JwtError::EncodingFailed(e.to_string()))
}

/// Verify and decode a JWT token
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::TokenExpired,
        _ => JwtError::DecodingFailed(e.to_string()),
    })?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_user(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            email: "officer@example.com".to_string(),
            name: "Loan Officer".to_string(),
            phone: None,
            password_hash: String::new(),
            role,
            credit_score: None,
            credit_score_history: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_generate_and_verify() {
        let user = create_test_user(UserRole::Admin);
        let token = generate_access_token(&user, "test-secret-key", 900).unwrap();

        let claims = verify_token(&token, "test-secret-key").unwrap();
        assert_eq!(claims.user_id().unwrap(), user.id);
        assert_eq!(claims.role().unwrap(), UserRole::Admin);
        assert_eq!(claims.email, user.email);
    }

    #[test]
    fn test_expired_token() {
        let user = create_test_user(UserRole::User);
        // Past the default 60s leeway
        let token = generate_access_token(&user, "test-secret-key", -120).unwrap();
        assert!(matches!(
            verify_token(&token, "test-secret-key"),
            Err(JwtError::TokenExpired)
        ));
    }

    #[test]
    fn test_invalid_token() {
        assert!(verify_token("invalid.token.here", "test-secret-key").is_err());
    }

    #[test]
    fn test_wrong_secret() {
        let user = create_test_user(UserRole::User);
        let token = generate_access_token(&user, "secret1", 900).unwrap();
        assert!(verify_token(&token, "secret2").is_err());
    }
}
