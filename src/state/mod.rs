//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::AuthService;
use crate::config::Config;
use crate::loan::LoanService;
use crate::middleware::RateLimiter;
use crate::services::{
    ApiKeyService, CreditScoreService, FormNumberGenerator, FormSeriesService, UserService,
};
use crate::store::Store;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub auth_service: Arc<AuthService>,
    pub user_service: Arc<UserService>,
    pub loan_service: Arc<LoanService>,
    pub api_key_service: ApiKeyService,
    pub form_series_service: Arc<FormSeriesService>,
    pub form_numbers: FormNumberGenerator,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    /// Wire every service to one store.
    pub fn new(store: Arc<dyn Store>, config: &Config) -> Self {
        let credit = CreditScoreService::new(store.clone(), config.scoring.clone());

        Self {
            auth_service: Arc::new(AuthService::new(
                store.clone(),
                config.jwt_secret.clone(),
                config.jwt_access_token_ttl_seconds,
                config.bcrypt_cost,
            )),
            user_service: Arc::new(UserService::new(store.clone())),
            loan_service: Arc::new(LoanService::new(store.clone(), credit)),
            api_key_service: ApiKeyService::new(store.clone()),
            form_series_service: Arc::new(FormSeriesService::new(store.clone())),
            form_numbers: FormNumberGenerator::default(),
            rate_limiter: RateLimiter::new(config.rate_limit_rps),
            store,
        }
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.auth_service.clone()
    }
}

impl FromRef<AppState> for ApiKeyService {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.api_key_service.clone()
    }
}

impl FromRef<AppState> for RateLimiter {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.rate_limiter.clone()
    }
}
