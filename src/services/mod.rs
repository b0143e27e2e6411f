//! Business logic services

pub mod api_key;
pub mod credit_score;
pub mod form_number;
mod form_series;
mod user;

pub use api_key::ApiKeyService;
pub use credit_score::{CreditScoreService, ScoringPolicy};
pub use form_number::{FormNumberError, FormNumberGenerator};
pub use form_series::FormSeriesService;
pub use user::UserService;
