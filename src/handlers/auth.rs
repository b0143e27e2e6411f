//! Authentication HTTP handlers
//!
//! Email/password registration and login for staff and borrowers.

use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use validator::Validate;

use super::AuthenticatedUser;
use crate::error::ApiError;
use crate::models::{ApiResponse, AuthTokenResponse, LoginRequest, RegisterRequest, UserResponse};
use crate::state::AppState;

/// POST /auth/register - Create an account and return an access token
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<AuthTokenResponse>>), ApiError> {
    let Json(req) = payload?;
    req.validate()?;

    let tokens = state.auth_service.register(req).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(tokens))))
}

/// POST /auth/login - Exchange credentials for an access token
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<AuthTokenResponse>>, ApiError> {
    let Json(req) = payload?;

    let tokens = state.auth_service.login(&req.email, &req.password).await?;

    Ok(Json(ApiResponse::ok(tokens)))
}

/// GET /auth/me - Get current authenticated user
pub async fn get_current_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let account = state.user_service.get_user(&user, user.user_id).await?;

    Ok(Json(ApiResponse::ok(account.into())))
}
