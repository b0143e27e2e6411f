//! Persistence traits for the microloan backend
//!
//! Services reach storage only through these traits. `PgStore` is the
//! production backend; `InMemoryStore` backs tests and local runs without a
//! database. Every method is a single atomic operation on one record.

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::loan::{Loan, LoanFilter, LoanStatus, NewLoan, NewRepayment, RepaymentAppend};
use crate::models::{
    ApiKey, CreditScoreHistoryEntry, FormSeries, NewApiKey, NewUser, SeriesStatus, User,
};
use crate::services::credit_score::ScoringPolicy;

/// Storage errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user. The first account ever created becomes super-admin,
    /// every later one a plain user; decided inside the same operation.
    async fn create_user(&self, input: NewUser) -> StoreResult<User>;
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn list_users(&self, limit: i64, offset: i64) -> StoreResult<(Vec<User>, i64)>;

    /// Load the user's score, apply `change` under `policy` and persist the
    /// new score and truncated history together. Returns the recorded entry,
    /// or `None` when the user does not exist.
    async fn apply_credit_score_change(
        &self,
        user_id: Uuid,
        change: i32,
        reason: &str,
        at: DateTime<Utc>,
        policy: &ScoringPolicy,
    ) -> StoreResult<Option<CreditScoreHistoryEntry>>;
}

/// Existence check used by the form number generator
#[async_trait]
pub trait FormNumberLookup: Send + Sync {
    async fn form_number_exists(&self, form_number: &str) -> StoreResult<bool>;
}

#[async_trait]
pub trait LoanStore: FormNumberLookup {
    async fn insert_loan(&self, input: NewLoan) -> StoreResult<Loan>;
    async fn find_loan(&self, id: Uuid) -> StoreResult<Option<Loan>>;
    async fn list_loans(&self, filter: LoanFilter) -> StoreResult<(Vec<Loan>, i64)>;
    async fn update_loan_status(
        &self,
        id: Uuid,
        status: LoanStatus,
        issue_date: Option<DateTime<Utc>>,
    ) -> StoreResult<Option<Loan>>;
    /// Append a repayment to an active loan and settle it to `Paid` once the
    /// balance reaches zero. Status check, insert and settlement happen under
    /// one lock on the loan.
    async fn append_repayment(&self, input: NewRepayment) -> StoreResult<RepaymentAppend>;
}

#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    async fn insert_api_key(&self, input: NewApiKey) -> StoreResult<ApiKey>;
    async fn list_api_keys(&self) -> StoreResult<Vec<ApiKey>>;
    /// For an enabled key: bump the request counter, stamp `last_used_at`
    /// and return the updated record. Unknown and disabled keys both give
    /// `None`.
    async fn record_api_key_use(&self, key: &str, at: DateTime<Utc>)
        -> StoreResult<Option<ApiKey>>;
    async fn set_api_key_enabled(&self, id: Uuid, enabled: bool) -> StoreResult<Option<ApiKey>>;
    /// Hard delete. Returns whether a record was removed.
    async fn delete_api_key(&self, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait FormSeriesStore: Send + Sync {
    async fn insert_form_series(
        &self,
        partner_id: i64,
        prefix: &str,
        start_number: i64,
        end_number: i64,
        status: SeriesStatus,
    ) -> StoreResult<FormSeries>;
    async fn list_form_series(&self, partner_id: Option<i64>) -> StoreResult<Vec<FormSeries>>;
}

/// Everything the application needs from a backend
#[async_trait]
pub trait Store: UserStore + LoanStore + ApiKeyStore + FormSeriesStore {
    async fn health_check(&self) -> StoreResult<()>;
}
