//! Loan HTTP handlers

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use super::{AdminUser, AuthenticatedUser};
use crate::error::ApiError;
use crate::loan::{
    CreateLoanRequest, ListLoansQuery, LoanDetails, RepaymentReceipt, RepaymentRequest,
    UpdateLoanStatusRequest,
};
use crate::models::{ApiResponse, PaginatedResponse};
use crate::state::AppState;

/// POST /api/loans - Apply for a loan quoting an issued form number
pub async fn create_loan(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    payload: Result<Json<CreateLoanRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<LoanDetails>>), ApiError> {
    let Json(req) = payload?;
    req.validate()?;

    let loan = state.loan_service.apply(&user, req).await?;
    let details = LoanDetails::from(loan);

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(details))))
}

/// GET /api/loans - List loans (own loans; admins see all)
pub async fn list_loans(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListLoansQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<LoanDetails>>>, ApiError> {
    let loans = state.loan_service.list_loans(&user, query).await?;
    Ok(Json(ApiResponse::ok(loans)))
}

/// GET /api/loans/:id - Get a loan with balance and next due date
pub async fn get_loan(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(loan_id): Path<Uuid>,
) -> Result<Json<ApiResponse<LoanDetails>>, ApiError> {
    let loan = state.loan_service.get_loan(&user, loan_id).await?;
    Ok(Json(ApiResponse::ok(loan)))
}

/// PATCH /api/loans/:id/status - Approve, reject or disburse (admin)
pub async fn update_loan_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(loan_id): Path<Uuid>,
    payload: Result<Json<UpdateLoanStatusRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<LoanDetails>>, ApiError> {
    let Json(req) = payload?;

    let loan = state
        .loan_service
        .update_status(&admin, loan_id, req.status)
        .await?;

    Ok(Json(ApiResponse::ok(loan)))
}

/// POST /api/loans/:id/repayments - Record a repayment (admin)
pub async fn record_repayment(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(loan_id): Path<Uuid>,
    payload: Result<Json<RepaymentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<RepaymentReceipt>>), ApiError> {
    let Json(req) = payload?;

    let receipt = state
        .loan_service
        .record_repayment(&admin, loan_id, req.amount)
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(receipt))))
}
