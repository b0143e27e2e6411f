//! Partner API key administration

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use super::{AdminUser, SuperAdminUser};
use crate::error::ApiError;
use crate::models::{
    ApiKeySummary, ApiResponse, CreateApiKeyRequest, CreateApiKeyResponse, UpdateApiKeyRequest,
};
use crate::state::AppState;

/// POST /api/admin/api-keys - Issue a key for a new partner (super-admin)
///
/// The full secret is only ever returned here.
pub async fn create_api_key(
    State(state): State<AppState>,
    SuperAdminUser(admin): SuperAdminUser,
    payload: Result<Json<CreateApiKeyRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<CreateApiKeyResponse>>), ApiError> {
    let Json(req) = payload?;
    req.validate()?;

    let key = state
        .api_key_service
        .create_api_key(req, admin.user_id)
        .await?;
    let secret = key.key.clone();

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(CreateApiKeyResponse {
            summary: key.into(),
            key: secret,
        })),
    ))
}

/// GET /api/admin/api-keys - List keys with usage telemetry (admin)
pub async fn list_api_keys(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<ApiResponse<Vec<ApiKeySummary>>>, ApiError> {
    let keys = state.api_key_service.list_api_keys().await?;
    Ok(Json(ApiResponse::ok(
        keys.into_iter().map(ApiKeySummary::from).collect(),
    )))
}

/// PATCH /api/admin/api-keys/:id - Enable or disable a key (super-admin)
pub async fn update_api_key(
    State(state): State<AppState>,
    SuperAdminUser(_admin): SuperAdminUser,
    Path(key_id): Path<Uuid>,
    payload: Result<Json<UpdateApiKeyRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ApiKeySummary>>, ApiError> {
    let Json(req) = payload?;

    let key = state
        .api_key_service
        .set_enabled(key_id, req.enabled)
        .await?;

    Ok(Json(ApiResponse::ok(key.into())))
}

/// DELETE /api/admin/api-keys/:id - Permanently remove a key (super-admin)
pub async fn delete_api_key(
    State(state): State<AppState>,
    SuperAdminUser(_admin): SuperAdminUser,
    Path(key_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.api_key_service.delete_api_key(key_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
