//! Loan service layer - application, review and repayment

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::AuthenticatedUser;
use crate::models::PaginatedResponse;
use crate::services::credit_score::{calculate_repayment_score, CreditScoreService};
use crate::services::form_number::parse_form_number;
use crate::store::{Store, StoreError};

use super::calculator;
use super::model::{
    validate_repayment_amount, CreateLoanRequest, ListLoansQuery, Loan, LoanDetails, LoanFilter,
    LoanStatus, NewLoan, NewRepayment, RecordedRepayment, RepaymentAppend, RepaymentReceipt,
};

/// Loan service for managing the loan lifecycle
#[derive(Clone)]
pub struct LoanService {
    store: Arc<dyn Store>,
    credit: CreditScoreService,
}

impl LoanService {
    pub fn new(store: Arc<dyn Store>, credit: CreditScoreService) -> Self {
        Self { store, credit }
    }

    /// File an application for the calling borrower, quoting a form number
    /// previously issued to a partner.
    pub async fn apply(
        &self,
        caller: &AuthenticatedUser,
        request: CreateLoanRequest,
    ) -> Result<Loan, ApiError> {
        request.validate_terms().map_err(ApiError::ValidationError)?;

        let form_number = request.form_number.trim().to_string();
        if parse_form_number(&form_number).is_none() {
            return Err(ApiError::ValidationError(format!(
                "'{}' is not a valid form number",
                form_number
            )));
        }
        if self.store.form_number_exists(&form_number).await? {
            return Err(ApiError::Conflict(format!(
                "Form number {} is already in use",
                form_number
            )));
        }

        let loan = self
            .store
            .insert_loan(NewLoan {
                borrower_id: caller.user_id,
                form_number,
                principal_amount: request.principal_amount,
                interest_rate: request.interest_rate,
                repayment_schedule: request.repayment_schedule,
                issue_date: Utc::now(),
            })
            .await
            .map_err(|e| match e {
                // Lost a race with another application quoting the same number
                StoreError::Conflict(msg) => ApiError::Conflict(msg),
                other => other.into(),
            })?;

        tracing::info!(
            loan_id = %loan.id,
            borrower_id = %loan.borrower_id,
            form_number = %loan.form_number,
            principal = %loan.principal_amount,
            "Loan application created"
        );
        Ok(loan)
    }

    /// Get a loan with its computed figures. Borrowers only see their own.
    pub async fn get_loan(
        &self,
        caller: &AuthenticatedUser,
        id: Uuid,
    ) -> Result<LoanDetails, ApiError> {
        let loan = self.load(id).await?;
        if loan.borrower_id != caller.user_id && !caller.role.is_admin() {
            // Same answer as a missing loan
            return Err(ApiError::NotFound(format!("Loan {} not found", id)));
        }
        Ok(LoanDetails::from(loan))
    }

    /// List loans. Non-admins are pinned to their own loans.
    pub async fn list_loans(
        &self,
        caller: &AuthenticatedUser,
        query: ListLoansQuery,
    ) -> Result<PaginatedResponse<LoanDetails>, ApiError> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(20).clamp(1, 100);
        let borrower_id = if caller.role.is_admin() {
            query.borrower_id
        } else {
            Some(caller.user_id)
        };

        let (loans, total) = self
            .store
            .list_loans(LoanFilter {
                borrower_id,
                status: query.status,
                limit,
                offset: (page - 1) * limit,
            })
            .await?;

        Ok(PaginatedResponse {
            data: loans.into_iter().map(LoanDetails::from).collect(),
            total,
            page,
            limit,
        })
    }

    /// Move a loan through review. Disbursement (`Approved -> Active`)
    /// restarts the schedule from today.
    pub async fn update_status(
        &self,
        caller: &AuthenticatedUser,
        id: Uuid,
        next: LoanStatus,
    ) -> Result<LoanDetails, ApiError> {
        let loan = self.load(id).await?;
        if !loan.status.can_transition_to(next) {
            return Err(ApiError::UnprocessableEntity(format!(
                "Cannot move loan from {:?} to {:?}",
                loan.status, next
            )));
        }

        let issue_date = (next == LoanStatus::Active).then(Utc::now);
        let loan = self
            .store
            .update_loan_status(id, next, issue_date)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Loan {} not found", id)))?;

        tracing::info!(
            loan_id = %id,
            status = ?next,
            reviewed_by = %caller.user_id,
            "Loan status updated"
        );
        Ok(LoanDetails::from(loan))
    }

    /// Record a repayment and adjust the borrower's credit score.
    ///
    /// The store settles the loan to `Paid` under its lock; the score is
    /// computed against the locked loan as it stood before this repayment.
    /// Score persistence is best-effort and never fails the repayment.
    pub async fn record_repayment(
        &self,
        caller: &AuthenticatedUser,
        id: Uuid,
        amount: Decimal,
    ) -> Result<RepaymentReceipt, ApiError> {
        validate_repayment_amount(amount).map_err(ApiError::ValidationError)?;

        let now = Utc::now();
        let outcome = self
            .store
            .append_repayment(NewRepayment {
                loan_id: id,
                amount,
                paid_at: now,
                recorded_by: caller.user_id,
            })
            .await?;

        let RecordedRepayment {
            repayment,
            before,
            after,
        } = match outcome {
            RepaymentAppend::Recorded(recorded) => *recorded,
            RepaymentAppend::NotActive(status) => {
                return Err(ApiError::UnprocessableEntity(format!(
                    "Loan {} is {:?}; only active loans accept repayments",
                    id, status
                )))
            }
            RepaymentAppend::NotFound => {
                return Err(ApiError::NotFound(format!("Loan {} not found", id)))
            }
        };

        let proposal = calculate_repayment_score(&before, amount, now, self.credit.policy());
        let summary = calculator::summarize(&after);

        tracing::info!(
            loan_id = %id,
            amount = %amount,
            remaining = %summary.outstanding_balance,
            status = ?after.status,
            "Repayment recorded"
        );

        self.credit
            .update_user_credit_score(after.borrower_id, proposal.change, &proposal.reason)
            .await;

        Ok(RepaymentReceipt {
            repayment,
            loan_status: after.status,
            summary,
            credit_score_change: proposal.change,
            credit_score_reason: proposal.reason,
        })
    }

    async fn load(&self, id: Uuid) -> Result<Loan, ApiError> {
        self.store
            .find_loan(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Loan {} not found", id)))
    }
}

impl From<Loan> for LoanDetails {
    fn from(loan: Loan) -> Self {
        let summary = calculator::summarize(&loan);
        LoanDetails { loan, summary }
    }
}
