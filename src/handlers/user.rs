//! User-related API handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use super::{AdminUser, AuthenticatedUser};
use crate::error::ApiError;
use crate::models::{
    ApiResponse, CreditScoreResponse, PaginatedResponse, PaginationParams, UserResponse,
};
use crate::state::AppState;

/// GET /api/users - List accounts (admin)
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PaginatedResponse<UserResponse>>>, ApiError> {
    let users = state.user_service.list_users(params).await?;
    Ok(Json(ApiResponse::ok(users)))
}

/// GET /api/users/:id - Get a user (self or admin)
pub async fn get_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let account = state.user_service.get_user(&user, user_id).await?;
    Ok(Json(ApiResponse::ok(account.into())))
}

/// GET /api/users/:id/credit-score - Score and recent history (self or admin)
pub async fn get_credit_score(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<CreditScoreResponse>>, ApiError> {
    let score = state.user_service.credit_score(&user, user_id).await?;
    Ok(Json(ApiResponse::ok(score)))
}
