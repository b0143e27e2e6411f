//! Partner surface, reached only through the API key gate

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use validator::Validate;

use super::PartnerContext;
use crate::error::ApiError;
use crate::models::{
    ApiResponse, ApiScope, FormNumberResponse, FormSeries, FormType, IssueFormNumberRequest,
    RegionCode,
};
use crate::state::AppState;

/// POST /partner/v1/form-numbers - Issue a unique form number (scope `write`)
pub async fn issue_form_number(
    State(state): State<AppState>,
    partner: PartnerContext,
    payload: Result<Json<IssueFormNumberRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<FormNumberResponse>>, ApiError> {
    partner.require(ApiScope::Write)?;

    let Json(req) = payload?;
    req.validate()?;

    let region: RegionCode = req.region_code.parse().map_err(ApiError::ValidationError)?;
    let form_type: FormType = req.form_type.parse().map_err(ApiError::ValidationError)?;

    if !partner.may_act_for(req.partner_id) {
        return Err(ApiError::Forbidden(format!(
            "API key belongs to partner {} and cannot issue for partner {}",
            partner.partner_id, req.partner_id
        )));
    }

    let form_number = state
        .form_numbers
        .generate(&*state.store, req.partner_id, region, form_type)
        .await?;

    tracing::info!(
        partner_id = req.partner_id,
        issued_by = partner.partner_id,
        form_number = %form_number,
        "Form number issued"
    );

    Ok(Json(ApiResponse::ok(FormNumberResponse { form_number })))
}

/// GET /partner/v1/form-series - The calling partner's series (scope `read`)
pub async fn list_own_form_series(
    State(state): State<AppState>,
    partner: PartnerContext,
) -> Result<Json<ApiResponse<Vec<FormSeries>>>, ApiError> {
    partner.require(ApiScope::Read)?;

    let series = state
        .form_series_service
        .list(Some(partner.partner_id))
        .await?;

    Ok(Json(ApiResponse::ok(series)))
}
