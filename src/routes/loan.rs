//! Loan route definitions

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::handlers::loan;
use crate::state::AppState;

pub fn loan_routes() -> Router<AppState> {
    Router::new()
        .route("/api/loans", get(loan::list_loans).post(loan::create_loan))
        .route("/api/loans/:id", get(loan::get_loan))
        .route("/api/loans/:id/status", patch(loan::update_loan_status))
        .route("/api/loans/:id/repayments", post(loan::record_repayment))
}
