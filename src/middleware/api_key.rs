//! Partner API key gate
//!
//! Guards the partner surface. A request must carry `X-API-Key`; unknown and
//! disabled keys are rejected with the same 401 so a caller cannot probe
//! which keys exist. Scope checks happen per route through
//! [`PartnerContext::require`] and fail with 403.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

use super::rate_limiter::{too_many_requests, RateLimiter};
use crate::error::ApiError;
use crate::models::{ApiKey, ApiScope};
use crate::services::ApiKeyService;

pub static API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");
pub static PARTNER_ID_HEADER: HeaderName = HeaderName::from_static("x-partner-id");

/// Resolved identity of the calling partner
#[derive(Debug, Clone)]
pub struct PartnerContext {
    pub partner_id: i64,
    pub partner_name: String,
    pub scopes: Vec<ApiScope>,
}

impl From<&ApiKey> for PartnerContext {
    fn from(key: &ApiKey) -> Self {
        Self {
            partner_id: key.partner_id,
            partner_name: key.partner_name.clone(),
            scopes: key.scopes.clone(),
        }
    }
}

impl PartnerContext {
    pub fn has_scope(&self, scope: ApiScope) -> bool {
        self.scopes.contains(&scope)
    }

    /// Fail with 403 unless the key carries `scope`.
    pub fn require(&self, scope: ApiScope) -> Result<(), ApiError> {
        if self.has_scope(scope) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "API key lacks the '{}' scope",
                scope
            )))
        }
    }

    /// A partner acts for itself; an `admin` key may act for any partner.
    pub fn may_act_for(&self, partner_id: i64) -> bool {
        self.partner_id == partner_id || self.has_scope(ApiScope::Admin)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for PartnerContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<PartnerContext>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("API key required".to_string()))
    }
}

/// Middleware resolving `X-API-Key` into a [`PartnerContext`].
///
/// Any client-supplied `X-Partner-ID` is replaced with the partner the key
/// belongs to. Each partner also draws from its own rate-limit bucket. The
/// context is copied onto the response so outer layers can log it.
pub async fn require_api_key(
    State(service): State<ApiKeyService>,
    State(limiter): State<RateLimiter>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = request
        .headers()
        .get(&API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::Unauthorized("API key required".to_string()))?;

    let key = service
        .validate_api_key(&presented)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid API key".to_string()))?;

    let context = PartnerContext::from(&key);

    if !limiter
        .check(&format!("partner:{}", context.partner_id))
        .await
    {
        tracing::warn!(partner_id = context.partner_id, "Partner rate limit exceeded");
        let mut response = too_many_requests();
        response.extensions_mut().insert(context);
        return Ok(response);
    }

    // Replaces every client-supplied value
    request.headers_mut().insert(
        PARTNER_ID_HEADER.clone(),
        HeaderValue::from(context.partner_id),
    );
    request.extensions_mut().insert(context.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(context);
    Ok(response)
}
