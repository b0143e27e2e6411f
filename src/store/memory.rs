//! In-process store
//!
//! Holds everything behind one lock so each trait method is atomic, the same
//! guarantee `PgStore` gets from single statements and row locks.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    ApiKeyStore, FormNumberLookup, FormSeriesStore, LoanStore, Store, StoreError, StoreResult,
    UserStore,
};
use crate::loan::{
    calculator, Loan, LoanFilter, LoanStatus, NewLoan, NewRepayment, RecordedRepayment, Repayment,
    RepaymentAppend,
};
use crate::models::{
    ApiKey, CreditScoreHistoryEntry, FormSeries, NewApiKey, NewUser, SeriesStatus, User, UserRole,
};
use crate::services::credit_score::{apply_score_change, ScoringPolicy};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    loans: HashMap<Uuid, Loan>,
    api_keys: HashMap<Uuid, ApiKey>,
    form_series: Vec<FormSeries>,
    /// Last partner ID handed out; never decreases, even after deletes
    last_partner_id: i64,
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn create_user(&self, input: NewUser) -> StoreResult<User> {
        let mut inner = self.inner.write().await;

        if inner.users.values().any(|u| u.email == input.email) {
            return Err(StoreError::Conflict(format!(
                "email {} is already registered",
                input.email
            )));
        }

        let role = if inner.users.values().any(|u| u.role == UserRole::SuperAdmin) {
            UserRole::User
        } else {
            UserRole::SuperAdmin
        };

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: input.email,
            name: input.name,
            phone: input.phone,
            password_hash: input.password_hash,
            role,
            credit_score: None,
            credit_score_history: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self, limit: i64, offset: i64) -> StoreResult<(Vec<User>, i64)> {
        let inner = self.inner.read().await;
        let mut users: Vec<User> = inner.users.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        let total = users.len() as i64;
        let page = users
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn apply_credit_score_change(
        &self,
        user_id: Uuid,
        change: i32,
        reason: &str,
        at: DateTime<Utc>,
        policy: &ScoringPolicy,
    ) -> StoreResult<Option<CreditScoreHistoryEntry>> {
        let mut inner = self.inner.write().await;
        let Some(user) = inner.users.get_mut(&user_id) else {
            return Ok(None);
        };

        let history = std::mem::take(&mut user.credit_score_history);
        let (new_score, history, entry) =
            apply_score_change(user.credit_score, history, change, reason, at, policy);

        user.credit_score = Some(new_score);
        user.credit_score_history = history;
        user.updated_at = Utc::now();

        Ok(Some(entry))
    }
}

#[async_trait]
impl FormNumberLookup for InMemoryStore {
    async fn form_number_exists(&self, form_number: &str) -> StoreResult<bool> {
        let inner = self.inner.read().await;
        Ok(inner.loans.values().any(|l| l.form_number == form_number))
    }
}

#[async_trait]
impl LoanStore for InMemoryStore {
    async fn insert_loan(&self, input: NewLoan) -> StoreResult<Loan> {
        let mut inner = self.inner.write().await;

        if inner.loans.values().any(|l| l.form_number == input.form_number) {
            return Err(StoreError::Conflict(format!(
                "form number {} is already in use",
                input.form_number
            )));
        }

        let now = Utc::now();
        let loan = Loan {
            id: Uuid::new_v4(),
            borrower_id: input.borrower_id,
            form_number: input.form_number,
            principal_amount: input.principal_amount,
            interest_rate: input.interest_rate,
            repayment_schedule: input.repayment_schedule,
            issue_date: input.issue_date,
            status: LoanStatus::Pending,
            repayments: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        inner.loans.insert(loan.id, loan.clone());
        Ok(loan)
    }

    async fn find_loan(&self, id: Uuid) -> StoreResult<Option<Loan>> {
        Ok(self.inner.read().await.loans.get(&id).cloned())
    }

    async fn list_loans(&self, filter: LoanFilter) -> StoreResult<(Vec<Loan>, i64)> {
        let inner = self.inner.read().await;
        let mut loans: Vec<Loan> = inner
            .loans
            .values()
            .filter(|l| filter.borrower_id.map_or(true, |b| l.borrower_id == b))
            .filter(|l| filter.status.map_or(true, |s| l.status == s))
            .cloned()
            .collect();
        loans.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = loans.len() as i64;
        let page = loans
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn update_loan_status(
        &self,
        id: Uuid,
        status: LoanStatus,
        issue_date: Option<DateTime<Utc>>,
    ) -> StoreResult<Option<Loan>> {
        let mut inner = self.inner.write().await;
        let Some(loan) = inner.loans.get_mut(&id) else {
            return Ok(None);
        };

        loan.status = status;
        if let Some(date) = issue_date {
            loan.issue_date = date;
        }
        loan.updated_at = Utc::now();
        Ok(Some(loan.clone()))
    }

    async fn append_repayment(&self, input: NewRepayment) -> StoreResult<RepaymentAppend> {
        let mut inner = self.inner.write().await;
        let Some(loan) = inner.loans.get_mut(&input.loan_id) else {
            return Ok(RepaymentAppend::NotFound);
        };
        if loan.status != LoanStatus::Active {
            return Ok(RepaymentAppend::NotActive(loan.status));
        }

        let before = loan.clone();
        let repayment = Repayment {
            id: Uuid::new_v4(),
            loan_id: input.loan_id,
            amount: input.amount,
            paid_at: input.paid_at,
            recorded_by: Some(input.recorded_by),
        };
        loan.repayments.push(repayment.clone());
        loan.status = calculator::settled_status(loan);
        loan.updated_at = Utc::now();

        Ok(RepaymentAppend::Recorded(Box::new(RecordedRepayment {
            repayment,
            before,
            after: loan.clone(),
        })))
    }
}

#[async_trait]
impl ApiKeyStore for InMemoryStore {
    async fn insert_api_key(&self, input: NewApiKey) -> StoreResult<ApiKey> {
        let mut inner = self.inner.write().await;

        if inner.api_keys.values().any(|k| k.key == input.key) {
            return Err(StoreError::Conflict("API key collision".to_string()));
        }

        inner.last_partner_id += 1;
        let key = ApiKey {
            id: Uuid::new_v4(),
            partner_name: input.partner_name,
            partner_id: inner.last_partner_id,
            key: input.key,
            enabled: true,
            scopes: input.scopes,
            request_count: 0,
            last_used_at: None,
            created_by: Some(input.created_by),
            created_at: Utc::now(),
        };
        inner.api_keys.insert(key.id, key.clone());
        Ok(key)
    }

    async fn list_api_keys(&self) -> StoreResult<Vec<ApiKey>> {
        let inner = self.inner.read().await;
        let mut keys: Vec<ApiKey> = inner.api_keys.values().cloned().collect();
        keys.sort_by_key(|k| k.partner_id);
        Ok(keys)
    }

    async fn record_api_key_use(
        &self,
        key: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<ApiKey>> {
        let mut inner = self.inner.write().await;
        let Some(record) = inner
            .api_keys
            .values_mut()
            .find(|k| k.key == key && k.enabled)
        else {
            return Ok(None);
        };

        record.request_count += 1;
        record.last_used_at = Some(at);
        Ok(Some(record.clone()))
    }

    async fn set_api_key_enabled(&self, id: Uuid, enabled: bool) -> StoreResult<Option<ApiKey>> {
        let mut inner = self.inner.write().await;
        Ok(inner.api_keys.get_mut(&id).map(|k| {
            k.enabled = enabled;
            k.clone()
        }))
    }

    async fn delete_api_key(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.inner.write().await.api_keys.remove(&id).is_some())
    }
}

#[async_trait]
impl FormSeriesStore for InMemoryStore {
    async fn insert_form_series(
        &self,
        partner_id: i64,
        prefix: &str,
        start_number: i64,
        end_number: i64,
        status: SeriesStatus,
    ) -> StoreResult<FormSeries> {
        let series = FormSeries {
            id: Uuid::new_v4(),
            partner_id,
            prefix: prefix.to_string(),
            start_number,
            end_number,
            status,
            created_at: Utc::now(),
        };
        self.inner.write().await.form_series.push(series.clone());
        Ok(series)
    }

    async fn list_form_series(&self, partner_id: Option<i64>) -> StoreResult<Vec<FormSeries>> {
        let inner = self.inner.read().await;
        let mut series: Vec<FormSeries> = inner
            .form_series
            .iter()
            .filter(|s| partner_id.map_or(true, |p| s.partner_id == p))
            .cloned()
            .collect();
        series.sort_by_key(|s| (s.partner_id, s.start_number));
        Ok(series)
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            name: "Test".to_string(),
            phone: None,
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_first_user_is_super_admin() {
        let store = InMemoryStore::new();
        let first = store.create_user(new_user("a@example.com")).await.unwrap();
        let second = store.create_user(new_user("b@example.com")).await.unwrap();
        assert_eq!(first.role, UserRole::SuperAdmin);
        assert_eq!(second.role, UserRole::User);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = InMemoryStore::new();
        store.create_user(new_user("a@example.com")).await.unwrap();
        let err = store.create_user(new_user("a@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_partner_ids_are_not_reused() {
        let store = InMemoryStore::new();
        let make = |key: &str| NewApiKey {
            partner_name: "Partner".to_string(),
            key: key.to_string(),
            scopes: vec![],
            created_by: Uuid::new_v4(),
        };
        let first = store.insert_api_key(make("k1")).await.unwrap();
        assert!(store.delete_api_key(first.id).await.unwrap());
        let second = store.insert_api_key(make("k2")).await.unwrap();
        assert_eq!(first.partner_id, 1);
        assert_eq!(second.partner_id, 2);
    }

    #[tokio::test]
    async fn test_disabled_key_use_is_not_recorded() {
        let store = InMemoryStore::new();
        let key = store
            .insert_api_key(NewApiKey {
                partner_name: "Partner".to_string(),
                key: "mk_test".to_string(),
                scopes: vec![],
                created_by: Uuid::new_v4(),
            })
            .await
            .unwrap();

        store.set_api_key_enabled(key.id, false).await.unwrap();
        assert!(store
            .record_api_key_use("mk_test", Utc::now())
            .await
            .unwrap()
            .is_none());

        let listed = store.list_api_keys().await.unwrap();
        assert_eq!(listed[0].request_count, 0);
    }

    async fn active_loan(store: &InMemoryStore) -> Loan {
        use crate::loan::RepaymentSchedule;
        use rust_decimal_macros::dec;

        let loan = store
            .insert_loan(NewLoan {
                borrower_id: Uuid::new_v4(),
                form_number: "P-1-NR-IL-00000000000A".to_string(),
                principal_amount: dec!(1000),
                interest_rate: dec!(10),
                repayment_schedule: RepaymentSchedule::Weekly,
                issue_date: Utc::now(),
            })
            .await
            .unwrap();
        store
            .update_loan_status(loan.id, LoanStatus::Active, Some(Utc::now()))
            .await
            .unwrap()
            .unwrap()
    }

    fn repayment(loan_id: Uuid, amount: rust_decimal::Decimal) -> NewRepayment {
        NewRepayment {
            loan_id,
            amount,
            paid_at: Utc::now(),
            recorded_by: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn test_paid_loan_rejects_repayment() {
        use rust_decimal_macros::dec;

        let store = InMemoryStore::new();
        let loan = active_loan(&store).await;
        store
            .update_loan_status(loan.id, LoanStatus::Paid, None)
            .await
            .unwrap();

        let outcome = store.append_repayment(repayment(loan.id, dec!(10))).await.unwrap();
        assert!(matches!(outcome, RepaymentAppend::NotActive(LoanStatus::Paid)));

        let after = store.find_loan(loan.id).await.unwrap().unwrap();
        assert_eq!(after.status, LoanStatus::Paid);
        assert!(after.repayments.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_repayments_settle_the_loan() {
        use rust_decimal_macros::dec;

        let store = InMemoryStore::new();
        let loan = active_loan(&store).await;

        let (a, b) = tokio::join!(
            store.append_repayment(repayment(loan.id, dec!(600))),
            store.append_repayment(repayment(loan.id, dec!(600))),
        );
        let statuses: Vec<LoanStatus> = [a.unwrap(), b.unwrap()]
            .into_iter()
            .map(|outcome| match outcome {
                RepaymentAppend::Recorded(recorded) => recorded.after.status,
                other => panic!("unexpected outcome {:?}", other),
            })
            .collect();
        assert!(statuses.contains(&LoanStatus::Active));
        assert!(statuses.contains(&LoanStatus::Paid));

        let after = store.find_loan(loan.id).await.unwrap().unwrap();
        assert_eq!(after.status, LoanStatus::Paid);
        assert_eq!(calculator::calculate_outstanding_balance(&after), dec!(-100));

        let late = store.append_repayment(repayment(loan.id, dec!(1))).await.unwrap();
        assert!(matches!(late, RepaymentAppend::NotActive(LoanStatus::Paid)));
    }

    #[tokio::test]
    async fn test_recorded_snapshots_bracket_the_repayment() {
        use rust_decimal_macros::dec;

        let store = InMemoryStore::new();
        let loan = active_loan(&store).await;
        let RepaymentAppend::Recorded(recorded) =
            store.append_repayment(repayment(loan.id, dec!(300))).await.unwrap()
        else {
            panic!("repayment was not recorded");
        };

        assert!(recorded.before.repayments.is_empty());
        assert_eq!(recorded.after.repayments, vec![recorded.repayment.clone()]);
        assert_eq!(recorded.after.status, LoanStatus::Active);
    }
}
