//! Partner routes, all behind the API key gate

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::handlers::partner;
use crate::middleware::require_api_key;
use crate::state::AppState;

pub fn partner_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/partner/v1/form-numbers", post(partner::issue_form_number))
        .route("/partner/v1/form-series", get(partner::list_own_form_series))
        .route_layer(middleware::from_fn_with_state(state, require_api_key))
}
