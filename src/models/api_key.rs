//! Partner API key models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Capability granted to an API key
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ApiScope {
    /// List partner-visible registry data
    Read,
    /// Issue form numbers
    Write,
    /// Act on behalf of any partner
    Admin,
}

impl ApiScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiScope::Read => "read",
            ApiScope::Write => "write",
            ApiScope::Admin => "admin",
        }
    }
}

impl fmt::Display for ApiScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "read" => Ok(ApiScope::Read),
            "write" => Ok(ApiScope::Write),
            "admin" => Ok(ApiScope::Admin),
            other => Err(format!(
                "unrecognized scope '{}'; expected one of read, write, admin",
                other
            )),
        }
    }
}

/// API key record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: Uuid,
    pub partner_name: String,
    /// Assigned by the store, never reused
    pub partner_id: i64,
    pub key: String,
    pub enabled: bool,
    pub scopes: Vec<ApiScope>,
    pub request_count: i64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Input for key creation. The store assigns `partner_id`.
#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub partner_name: String,
    pub key: String,
    pub scopes: Vec<ApiScope>,
    pub created_by: Uuid,
}

/// Request to create a partner API key
#[derive(Debug, Deserialize, Validate)]
pub struct CreateApiKeyRequest {
    #[validate(length(min = 1, max = 120))]
    pub partner_name: String,
    #[validate(length(min = 1))]
    pub scopes: Vec<String>,
}

/// Request to enable or disable a key
#[derive(Debug, Deserialize)]
pub struct UpdateApiKeyRequest {
    pub enabled: bool,
}

/// Key as shown in listings: secret reduced to a preview
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiKeySummary {
    pub id: Uuid,
    pub partner_name: String,
    pub partner_id: i64,
    pub key_preview: String,
    pub enabled: bool,
    pub scopes: Vec<ApiScope>,
    pub request_count: i64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ApiKey> for ApiKeySummary {
    fn from(key: ApiKey) -> Self {
        let preview: String = key.key.chars().take(7).collect();
        Self {
            id: key.id,
            partner_name: key.partner_name,
            partner_id: key.partner_id,
            key_preview: format!("{}...", preview),
            enabled: key.enabled,
            scopes: key.scopes,
            request_count: key.request_count,
            last_used_at: key.last_used_at,
            created_at: key.created_at,
        }
    }
}

/// Creation response, the only place the full secret is returned
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateApiKeyResponse {
    #[serde(flatten)]
    pub summary: ApiKeySummary,
    pub key: String,
}
