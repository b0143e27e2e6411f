//! Configuration management
//!
//! This module handles loading and validating configuration from environment variables,
//! with support for different environments (development, staging, production).

use std::env;
use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::services::ScoringPolicy;

/// JWT secret used when none is configured; rejected in production
pub const DEV_JWT_SECRET: &str = "development-secret-change-in-production";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment value: {0}")]
    InvalidValue(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),
}

/// Application environment
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Parse environment from string
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid environment: '{}'. Expected: dev, staging, or prod",
                s
            ))),
        }
    }

    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Get the environment name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Current environment
    pub environment: Environment,

    /// Bind address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Maximum database connections
    pub db_max_connections: u32,

    /// Rate limit: requests per second per client
    pub rate_limit_rps: u32,

    /// CORS allowed origins, comma separated
    pub cors_allowed_origins: Option<String>,

    /// Log level (RUST_LOG)
    pub log_level: String,

    /// JWT secret for token signing
    pub jwt_secret: String,

    /// Access token TTL in seconds (default: 3600)
    pub jwt_access_token_ttl_seconds: i64,

    /// bcrypt work factor
    pub bcrypt_cost: u32,

    /// Credit scoring constants
    pub scoring: ScoringPolicy,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .map(|s| Environment::parse(&s))
            .unwrap_or(Ok(Environment::Development))?;

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3001".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort("PORT must be a valid number".to_string()))?;

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| DEV_JWT_SECRET.to_string());
        if environment.is_production() && jwt_secret == DEV_JWT_SECRET {
            return Err(ConfigError::MissingEnvVar("JWT_SECRET".to_string()));
        }

        let defaults = ScoringPolicy::default();
        let scoring = ScoringPolicy {
            late_penalty: parse_or("CREDIT_LATE_PENALTY", defaults.late_penalty)?,
            on_time_reward: parse_or("CREDIT_ON_TIME_REWARD", defaults.on_time_reward)?,
            significant_bonus: parse_or("CREDIT_SIGNIFICANT_BONUS", defaults.significant_bonus)?,
            significant_ratio: parse_or::<Decimal>(
                "CREDIT_SIGNIFICANT_RATIO",
                defaults.significant_ratio,
            )?,
            ..defaults
        };
        if scoring.significant_ratio < Decimal::ZERO {
            return Err(ConfigError::InvalidValue(
                "CREDIT_SIGNIFICANT_RATIO must not be negative".to_string(),
            ));
        }

        Ok(Config {
            database_url,
            environment,
            host,
            port,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 5),
            rate_limit_rps: env_or("RATE_LIMIT_RPS", 100),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS").ok(),
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            jwt_secret,
            jwt_access_token_ttl_seconds: env_or("JWT_ACCESS_TOKEN_TTL_SECONDS", 3600),
            bcrypt_cost: env_or("BCRYPT_COST", bcrypt::DEFAULT_COST),
            scoring,
        })
    }

    /// Get database URL (useful for logging masked version)
    pub fn database_url_masked(&self) -> String {
        // Mask password in database URL for logging
        if let Some(at_pos) = self.database_url.find('@') {
            if let Some(colon_pos) = self.database_url[..at_pos].rfind(':') {
                let prefix = &self.database_url[..colon_pos + 1];
                let suffix = &self.database_url[at_pos..];
                return format!("{}****{}", prefix, suffix);
            }
        }
        self.database_url.clone()
    }
}

/// Lenient numeric setting: unset or unparsable falls back to the default.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Strict setting: unset falls back, unparsable is an error.
fn parse_or<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(format!("{} has invalid value '{}'", name, v))),
        Err(_) => Ok(default),
    }
}
