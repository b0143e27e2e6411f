//! Form series administration

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use super::AdminUser;
use crate::error::ApiError;
use crate::models::{ApiResponse, CreateFormSeriesRequest, FormSeries, ListFormSeriesQuery};
use crate::state::AppState;

/// POST /api/admin/form-series - Register a range of paper forms (admin)
pub async fn create_form_series(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    payload: Result<Json<CreateFormSeriesRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<FormSeries>>), ApiError> {
    let Json(req) = payload?;
    req.validate()?;

    let series = state.form_series_service.create(req).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(series))))
}

/// GET /api/admin/form-series - List series, optionally for one partner (admin)
pub async fn list_form_series(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<ListFormSeriesQuery>,
) -> Result<Json<ApiResponse<Vec<FormSeries>>>, ApiError> {
    let series = state.form_series_service.list(query.partner_id).await?;
    Ok(Json(ApiResponse::ok(series)))
}
