//! Partner API key management and validation

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use rand::RngCore;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{ApiKey, ApiScope, CreateApiKeyRequest, NewApiKey};
use crate::store::Store;

/// Prefix on every generated secret
pub const API_KEY_PREFIX: &str = "mk_";

/// Random bytes behind each secret
const API_KEY_BYTES: usize = 32;

#[derive(Clone)]
pub struct ApiKeyService {
    store: Arc<dyn Store>,
}

impl ApiKeyService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Resolve a presented key.
    ///
    /// Unknown and disabled keys are both `None`. A successful lookup counts
    /// as a use: the counter and last-used time move before this returns.
    pub async fn validate_api_key(&self, key: &str) -> Result<Option<ApiKey>, ApiError> {
        if key.is_empty() {
            return Ok(None);
        }
        let record = self.store.record_api_key_use(key, Utc::now()).await?;
        if let Some(ref k) = record {
            tracing::debug!(
                partner_id = k.partner_id,
                request_count = k.request_count,
                "API key accepted"
            );
        }
        Ok(record)
    }

    /// Create a key for a new partner. The store assigns the partner ID.
    pub async fn create_api_key(
        &self,
        request: CreateApiKeyRequest,
        created_by: Uuid,
    ) -> Result<ApiKey, ApiError> {
        let scopes = parse_scopes(&request.scopes)?;
        let partner_name = request.partner_name.trim().to_string();
        if partner_name.is_empty() {
            return Err(ApiError::ValidationError(
                "partner_name must not be blank".to_string(),
            ));
        }

        let key = self
            .store
            .insert_api_key(NewApiKey {
                partner_name,
                key: generate_secret(),
                scopes,
                created_by,
            })
            .await?;

        tracing::info!(
            partner_id = key.partner_id,
            partner = %key.partner_name,
            created_by = %created_by,
            "API key created"
        );
        Ok(key)
    }

    pub async fn list_api_keys(&self) -> Result<Vec<ApiKey>, ApiError> {
        Ok(self.store.list_api_keys().await?)
    }

    /// Toggle a key between enabled and disabled.
    pub async fn set_enabled(&self, id: Uuid, enabled: bool) -> Result<ApiKey, ApiError> {
        let key = self
            .store
            .set_api_key_enabled(id, enabled)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("API key {} not found", id)))?;
        tracing::info!(partner_id = key.partner_id, enabled, "API key toggled");
        Ok(key)
    }

    /// Irreversibly remove a key.
    pub async fn delete_api_key(&self, id: Uuid) -> Result<(), ApiError> {
        if !self.store.delete_api_key(id).await? {
            return Err(ApiError::NotFound(format!("API key {} not found", id)));
        }
        tracing::info!(api_key_id = %id, "API key deleted");
        Ok(())
    }
}

/// Parse scope strings into a sorted, de-duplicated set.
pub fn parse_scopes(raw: &[String]) -> Result<Vec<ApiScope>, ApiError> {
    if raw.is_empty() {
        return Err(ApiError::ValidationError(
            "at least one scope is required".to_string(),
        ));
    }
    let scopes = raw
        .iter()
        .map(|s| s.parse::<ApiScope>())
        .collect::<Result<BTreeSet<_>, _>>()
        .map_err(ApiError::ValidationError)?;
    Ok(scopes.into_iter().collect())
}

fn generate_secret() -> String {
    let mut bytes = [0u8; API_KEY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}{}", API_KEY_PREFIX, hex::encode(bytes))
}
