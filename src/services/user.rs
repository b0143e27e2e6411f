//! User lookups and credit score views

use std::sync::Arc;

use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::AuthenticatedUser;
use crate::models::{
    CreditScoreResponse, PaginatedResponse, PaginationParams, User, UserResponse,
};
use crate::store::Store;

use super::credit_score::DEFAULT_CREDIT_SCORE;

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Fetch a user the caller is allowed to see: themselves, or anyone for
    /// admins.
    pub async fn get_user(&self, caller: &AuthenticatedUser, id: Uuid) -> Result<User, ApiError> {
        if caller.user_id != id && !caller.role.is_admin() {
            return Err(ApiError::Forbidden(
                "You can only view your own account".to_string(),
            ));
        }
        self.store
            .find_user(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("User {} not found", id)))
    }

    pub async fn credit_score(
        &self,
        caller: &AuthenticatedUser,
        id: Uuid,
    ) -> Result<CreditScoreResponse, ApiError> {
        let user = self.get_user(caller, id).await?;
        Ok(CreditScoreResponse {
            user_id: user.id,
            credit_score: user.credit_score.unwrap_or(DEFAULT_CREDIT_SCORE),
            history: user.credit_score_history,
        })
    }

    pub async fn list_users(
        &self,
        params: PaginationParams,
    ) -> Result<PaginatedResponse<UserResponse>, ApiError> {
        let (page, limit, offset) = params.resolve();
        let (users, total) = self.store.list_users(limit, offset).await?;
        Ok(PaginatedResponse {
            data: users.into_iter().map(UserResponse::from).collect(),
            total,
            page,
            limit,
        })
    }
}
