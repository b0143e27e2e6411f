//! Staff administration routes

use axum::{routing::get, Router};

use crate::handlers::{api_key, form_series};
use crate::state::AppState;

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/admin/api-keys",
            get(api_key::list_api_keys).post(api_key::create_api_key),
        )
        .route(
            "/api/admin/api-keys/:id",
            axum::routing::patch(api_key::update_api_key).delete(api_key::delete_api_key),
        )
        .route(
            "/api/admin/form-series",
            get(form_series::list_form_series).post(form_series::create_form_series),
        )
}
