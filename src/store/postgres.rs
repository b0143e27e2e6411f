//! PostgreSQL store

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{
    ApiKeyStore, FormNumberLookup, FormSeriesStore, LoanStore, Store, StoreError, StoreResult,
    UserStore,
};
use crate::loan::{
    calculator, Loan, LoanFilter, LoanStatus, NewLoan, NewRepayment, RecordedRepayment, Repayment,
    RepaymentAppend, RepaymentSchedule,
};
use crate::models::{
    ApiKey, ApiScope, CreditScoreHistoryEntry, FormSeries, NewApiKey, NewUser, SeriesStatus, User,
    UserRole,
};
use crate::services::credit_score::{apply_score_change, ScoringPolicy};

const SUPER_ADMIN_INDEX: &str = "users_single_super_admin";

const REPAYMENT_COLUMNS: &str = "id, loan_id, amount, paid_at, recorded_by";

/// Production store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    db_pool: PgPool,
}

impl PgStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    async fn repayments_for(&self, loan_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, Vec<Repayment>>> {
        let mut grouped: HashMap<Uuid, Vec<Repayment>> = HashMap::new();
        if loan_ids.is_empty() {
            return Ok(grouped);
        }

        let rows = sqlx::query_as::<_, Repayment>(&format!(
            "SELECT {} FROM repayments WHERE loan_id = ANY($1) ORDER BY seq ASC",
            REPAYMENT_COLUMNS
        ))
        .bind(loan_ids)
        .fetch_all(&self.db_pool)
        .await?;

        for repayment in rows {
            grouped.entry(repayment.loan_id).or_default().push(repayment);
        }
        Ok(grouped)
    }

    async fn hydrate(&self, row: LoanRow) -> StoreResult<Loan> {
        let mut repayments = self.repayments_for(&[row.id]).await?;
        let own = repayments.remove(&row.id).unwrap_or_default();
        Ok(row.into_loan(own))
    }
}

// ============================================================================
// Row types
// ============================================================================

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    name: String,
    phone: Option<String>,
    password_hash: String,
    role: UserRole,
    credit_score: Option<i32>,
    credit_score_history: Json<Vec<CreditScoreHistoryEntry>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            name: row.name,
            phone: row.phone,
            password_hash: row.password_hash,
            role: row.role,
            credit_score: row.credit_score,
            credit_score_history: row.credit_score_history.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct LoanRow {
    id: Uuid,
    borrower_id: Uuid,
    form_number: String,
    principal_amount: Decimal,
    interest_rate: Decimal,
    repayment_schedule: String,
    issue_date: DateTime<Utc>,
    status: LoanStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl LoanRow {
    fn into_loan(self, repayments: Vec<Repayment>) -> Loan {
        Loan {
            id: self.id,
            borrower_id: self.borrower_id,
            form_number: self.form_number,
            principal_amount: self.principal_amount,
            interest_rate: self.interest_rate,
            repayment_schedule: RepaymentSchedule::parse(&self.repayment_schedule),
            issue_date: self.issue_date,
            status: self.status,
            repayments,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ApiKeyRow {
    id: Uuid,
    partner_name: String,
    partner_id: i64,
    key: String,
    enabled: bool,
    scopes: Vec<String>,
    request_count: i64,
    last_used_at: Option<DateTime<Utc>>,
    created_by: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl From<ApiKeyRow> for ApiKey {
    fn from(row: ApiKeyRow) -> Self {
        let scopes = row
            .scopes
            .iter()
            .filter_map(|s| match s.parse::<ApiScope>() {
                Ok(scope) => Some(scope),
                Err(_) => {
                    tracing::warn!(partner_id = row.partner_id, scope = %s, "Ignoring stored scope");
                    None
                }
            })
            .collect();

        Self {
            id: row.id,
            partner_name: row.partner_name,
            partner_id: row.partner_id,
            key: row.key,
            enabled: row.enabled,
            scopes,
            request_count: row.request_count,
            last_used_at: row.last_used_at,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

fn unique_violation(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Some(db.constraint().unwrap_or_default().to_string())
        }
        _ => None,
    }
}

// ============================================================================
// Users
// ============================================================================

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, input: NewUser) -> StoreResult<User> {
        // Two registrations racing for the empty table both see no
        // super-admin; the partial unique index rejects the loser, whose
        // second pass then lands as a plain user.
        for _ in 0..2 {
            let result = sqlx::query_as::<_, UserRow>(
                r#"
                INSERT INTO users (id, email, name, phone, password_hash, role)
                SELECT $1, $2, $3, $4, $5,
                       CASE WHEN EXISTS (SELECT 1 FROM users WHERE role = 'super_admin')
                            THEN 'user'::user_role
                            ELSE 'super_admin'::user_role
                       END
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&input.email)
            .bind(&input.name)
            .bind(&input.phone)
            .bind(&input.password_hash)
            .fetch_one(&self.db_pool)
            .await;

            match result {
                Ok(row) => return Ok(row.into()),
                Err(e) => match unique_violation(&e) {
                    Some(constraint) if constraint == SUPER_ADMIN_INDEX => continue,
                    Some(_) => {
                        return Err(StoreError::Conflict(format!(
                            "email {} is already registered",
                            input.email
                        )))
                    }
                    None => return Err(e.into()),
                },
            }
        }

        Err(StoreError::Conflict(
            "could not settle account role".to_string(),
        ))
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.db_pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn list_users(&self, limit: i64, offset: i64) -> StoreResult<(Vec<User>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db_pool)
            .await?;

        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT * FROM users ORDER BY created_at ASC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db_pool)
        .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    async fn apply_credit_score_change(
        &self,
        user_id: Uuid,
        change: i32,
        reason: &str,
        at: DateTime<Utc>,
        policy: &ScoringPolicy,
    ) -> StoreResult<Option<CreditScoreHistoryEntry>> {
        let mut tx = self.db_pool.begin().await?;

        let current = sqlx::query_as::<_, (Option<i32>, Json<Vec<CreditScoreHistoryEntry>>)>(
            "SELECT credit_score, credit_score_history FROM users WHERE id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((score, history)) = current else {
            tx.rollback().await?;
            return Ok(None);
        };

        let (new_score, history, entry) =
            apply_score_change(score, history.0, change, reason, at, policy);

        sqlx::query(
            r#"
            UPDATE users
            SET credit_score = $1, credit_score_history = $2, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(new_score)
        .bind(Json(&history))
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(entry))
    }
}

// ============================================================================
// Loans
// ============================================================================

#[async_trait]
impl FormNumberLookup for PgStore {
    async fn form_number_exists(&self, form_number: &str) -> StoreResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM loans WHERE form_number = $1)")
                .bind(form_number)
                .fetch_one(&self.db_pool)
                .await?;
        Ok(exists)
    }
}

#[async_trait]
impl LoanStore for PgStore {
    async fn insert_loan(&self, input: NewLoan) -> StoreResult<Loan> {
        let row = sqlx::query_as::<_, LoanRow>(
            r#"
            INSERT INTO loans
                (id, borrower_id, form_number, principal_amount, interest_rate,
                 repayment_schedule, issue_date, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending')
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.borrower_id)
        .bind(&input.form_number)
        .bind(input.principal_amount)
        .bind(input.interest_rate)
        .bind(input.repayment_schedule.as_str())
        .bind(input.issue_date)
        .fetch_one(&self.db_pool)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(_) => StoreError::Conflict(format!(
                "form number {} is already in use",
                input.form_number
            )),
            None => e.into(),
        })?;

        Ok(row.into_loan(Vec::new()))
    }

    async fn find_loan(&self, id: Uuid) -> StoreResult<Option<Loan>> {
        let row = sqlx::query_as::<_, LoanRow>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn list_loans(&self, filter: LoanFilter) -> StoreResult<(Vec<Loan>, i64)> {
        let mut query_builder = sqlx::QueryBuilder::new("SELECT * FROM loans WHERE 1=1");
        let mut count_builder = sqlx::QueryBuilder::new("SELECT COUNT(*) FROM loans WHERE 1=1");

        if let Some(borrower_id) = filter.borrower_id {
            query_builder.push(" AND borrower_id = ");
            query_builder.push_bind(borrower_id);
            count_builder.push(" AND borrower_id = ");
            count_builder.push_bind(borrower_id);
        }

        if let Some(status) = filter.status {
            query_builder.push(" AND status = ");
            query_builder.push_bind(status);
            count_builder.push(" AND status = ");
            count_builder.push_bind(status);
        }

        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.db_pool)
            .await?;

        query_builder.push(" ORDER BY created_at DESC LIMIT ");
        query_builder.push_bind(filter.limit);
        query_builder.push(" OFFSET ");
        query_builder.push_bind(filter.offset);

        let rows = query_builder
            .build_query_as::<LoanRow>()
            .fetch_all(&self.db_pool)
            .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut repayments = self.repayments_for(&ids).await?;

        let loans = rows
            .into_iter()
            .map(|row| {
                let own = repayments.remove(&row.id).unwrap_or_default();
                row.into_loan(own)
            })
            .collect();

        Ok((loans, total))
    }

    async fn update_loan_status(
        &self,
        id: Uuid,
        status: LoanStatus,
        issue_date: Option<DateTime<Utc>>,
    ) -> StoreResult<Option<Loan>> {
        let row = sqlx::query_as::<_, LoanRow>(
            r#"
            UPDATE loans
            SET status = $2, issue_date = COALESCE($3, issue_date), updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(issue_date)
        .fetch_optional(&self.db_pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn append_repayment(&self, input: NewRepayment) -> StoreResult<RepaymentAppend> {
        let mut tx = self.db_pool.begin().await?;

        let row = sqlx::query_as::<_, LoanRow>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
            .bind(input.loan_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(RepaymentAppend::NotFound);
        };
        if row.status != LoanStatus::Active {
            tx.rollback().await?;
            return Ok(RepaymentAppend::NotActive(row.status));
        }

        // Read under the row lock so concurrent appends see each other
        let history = sqlx::query_as::<_, Repayment>(&format!(
            "SELECT {} FROM repayments WHERE loan_id = $1 ORDER BY seq ASC",
            REPAYMENT_COLUMNS
        ))
        .bind(input.loan_id)
        .fetch_all(&mut *tx)
        .await?;
        let before = row.into_loan(history);

        let repayment = sqlx::query_as::<_, Repayment>(&format!(
            "INSERT INTO repayments (id, loan_id, amount, paid_at, recorded_by) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            REPAYMENT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(input.loan_id)
        .bind(input.amount)
        .bind(input.paid_at)
        .bind(input.recorded_by)
        .fetch_one(&mut *tx)
        .await?;

        let mut after = before.clone();
        after.repayments.push(repayment.clone());
        after.status = calculator::settled_status(&after);

        after.updated_at = sqlx::query_scalar(
            "UPDATE loans SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING updated_at",
        )
        .bind(after.status)
        .bind(input.loan_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(RepaymentAppend::Recorded(Box::new(RecordedRepayment {
            repayment,
            before,
            after,
        })))
    }
}

// ============================================================================
// API keys
// ============================================================================

#[async_trait]
impl ApiKeyStore for PgStore {
    async fn insert_api_key(&self, input: NewApiKey) -> StoreResult<ApiKey> {
        let scopes: Vec<String> = input.scopes.iter().map(|s| s.as_str().to_string()).collect();

        let row = sqlx::query_as::<_, ApiKeyRow>(
            r#"
            INSERT INTO api_keys (id, partner_name, key, scopes, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.partner_name)
        .bind(&input.key)
        .bind(&scopes)
        .bind(input.created_by)
        .fetch_one(&self.db_pool)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(_) => StoreError::Conflict("API key collision".to_string()),
            None => e.into(),
        })?;

        Ok(row.into())
    }

    async fn list_api_keys(&self) -> StoreResult<Vec<ApiKey>> {
        let rows = sqlx::query_as::<_, ApiKeyRow>("SELECT * FROM api_keys ORDER BY partner_id ASC")
            .fetch_all(&self.db_pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn record_api_key_use(
        &self,
        key: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<ApiKey>> {
        let row = sqlx::query_as::<_, ApiKeyRow>(
            r#"
            UPDATE api_keys
            SET request_count = request_count + 1, last_used_at = $2
            WHERE key = $1 AND enabled
            RETURNING *
            "#,
        )
        .bind(key)
        .bind(at)
        .fetch_optional(&self.db_pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn set_api_key_enabled(&self, id: Uuid, enabled: bool) -> StoreResult<Option<ApiKey>> {
        let row = sqlx::query_as::<_, ApiKeyRow>(
            "UPDATE api_keys SET enabled = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(enabled)
        .fetch_optional(&self.db_pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn delete_api_key(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1")
            .bind(id)
            .execute(&self.db_pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ============================================================================
// Form series
// ============================================================================

#[async_trait]
impl FormSeriesStore for PgStore {
    async fn insert_form_series(
        &self,
        partner_id: i64,
        prefix: &str,
        start_number: i64,
        end_number: i64,
        status: SeriesStatus,
    ) -> StoreResult<FormSeries> {
        let series = sqlx::query_as::<_, FormSeries>(
            r#"
            INSERT INTO form_series (id, partner_id, prefix, start_number, end_number, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(partner_id)
        .bind(prefix)
        .bind(start_number)
        .bind(end_number)
        .bind(status)
        .fetch_one(&self.db_pool)
        .await?;
        Ok(series)
    }

    async fn list_form_series(&self, partner_id: Option<i64>) -> StoreResult<Vec<FormSeries>> {
        let series = sqlx::query_as::<_, FormSeries>(
            r#"
            SELECT * FROM form_series
            WHERE ($1::BIGINT IS NULL OR partner_id = $1)
            ORDER BY partner_id ASC, start_number ASC
            "#,
        )
        .bind(partner_id)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(series)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.db_pool).await?;
        Ok(())
    }
}
