//! Loan models
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::calculator;

/// Loan status enum
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "loan_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Pending,
    Approved,
    Rejected,
    Active,
    Paid,
}

impl LoanStatus {
    /// Review transitions staff may request. `Active -> Paid` happens only
    /// when a repayment settles the balance.
    pub fn can_transition_to(&self, next: LoanStatus) -> bool {
        matches!(
            (self, next),
            (LoanStatus::Pending, LoanStatus::Approved)
                | (LoanStatus::Pending, LoanStatus::Rejected)
                | (LoanStatus::Approved, LoanStatus::Active)
        )
    }
}

/// How often a repayment falls due
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RepaymentSchedule {
    Daily,
    Weekly,
    BiWeekly,
    Monthly,
    /// Stored value this build does not know; no due date is derived from it
    #[serde(other)]
    Unrecognized,
}

impl RepaymentSchedule {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepaymentSchedule::Daily => "daily",
            RepaymentSchedule::Weekly => "weekly",
            RepaymentSchedule::BiWeekly => "bi-weekly",
            RepaymentSchedule::Monthly => "monthly",
            RepaymentSchedule::Unrecognized => "unrecognized",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "daily" => RepaymentSchedule::Daily,
            "weekly" => RepaymentSchedule::Weekly,
            "bi-weekly" => RepaymentSchedule::BiWeekly,
            "monthly" => RepaymentSchedule::Monthly,
            _ => RepaymentSchedule::Unrecognized,
        }
    }
}

/// Repayment model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Repayment {
    pub id: Uuid,
    pub loan_id: Uuid,
    pub amount: Decimal,
    pub paid_at: DateTime<Utc>,
    pub recorded_by: Option<Uuid>,
}

/// Loan model. `repayments` is kept in insertion (chronological) order.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Loan {
    pub id: Uuid,
    pub borrower_id: Uuid,
    pub form_number: String,
    pub principal_amount: Decimal,
    /// Flat percentage over the whole term
    pub interest_rate: Decimal,
    pub repayment_schedule: RepaymentSchedule,
    pub issue_date: DateTime<Utc>,
    pub status: LoanStatus,
    pub repayments: Vec<Repayment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for persisting a new application
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub borrower_id: Uuid,
    pub form_number: String,
    pub principal_amount: Decimal,
    pub interest_rate: Decimal,
    pub repayment_schedule: RepaymentSchedule,
    pub issue_date: DateTime<Utc>,
}

/// Input for appending a repayment
#[derive(Debug, Clone)]
pub struct NewRepayment {
    pub loan_id: Uuid,
    pub amount: Decimal,
    pub paid_at: DateTime<Utc>,
    pub recorded_by: Uuid,
}

/// A repayment written under the loan's lock, with the loan as it was
/// locked and as it was left
#[derive(Debug, Clone)]
pub struct RecordedRepayment {
    pub repayment: Repayment,
    pub before: Loan,
    pub after: Loan,
}

/// Result of appending a repayment
#[derive(Debug, Clone)]
pub enum RepaymentAppend {
    Recorded(Box<RecordedRepayment>),
    /// The loan exists but its status does not take repayments
    NotActive(LoanStatus),
    NotFound,
}

/// Largest magnitude a money column (`NUMERIC(18, 4)`) holds: 14 integer digits
pub const MAX_AMOUNT: Decimal = dec!(100000000000000);

/// Largest rate the `NUMERIC(9, 4)` column holds: 5 integer digits
pub const MAX_INTEREST_RATE: Decimal = dec!(100000);

/// Money and rate columns keep four decimal places
pub const MONEY_SCALE: u32 = 4;

/// Check an amount fits the stored precision without rounding.
///
/// `limit` is exclusive.
pub fn check_decimal(field: &str, value: Decimal, limit: Decimal) -> Result<(), String> {
    if value.normalize().scale() > MONEY_SCALE {
        return Err(format!(
            "{} must have at most {} decimal places",
            field, MONEY_SCALE
        ));
    }
    if value.abs() >= limit {
        return Err(format!("{} must be less than {}", field, limit));
    }
    Ok(())
}

/// Request to apply for a loan
#[derive(Debug, Deserialize, Validate)]
pub struct CreateLoanRequest {
    #[validate(length(min = 1, max = 64))]
    pub form_number: String,
    pub principal_amount: Decimal,
    pub interest_rate: Decimal,
    pub repayment_schedule: RepaymentSchedule,
}

impl CreateLoanRequest {
    /// Monetary checks the derive cannot express on `Decimal`
    pub fn validate_terms(&self) -> Result<(), String> {
        if self.principal_amount <= Decimal::ZERO {
            return Err("principal_amount must be greater than 0".to_string());
        }
        check_decimal("principal_amount", self.principal_amount, MAX_AMOUNT)?;
        if self.interest_rate < Decimal::ZERO {
            return Err("interest_rate must not be negative".to_string());
        }
        check_decimal("interest_rate", self.interest_rate, MAX_INTEREST_RATE)?;
        if calculator::checked_total_owed(self.principal_amount, self.interest_rate).is_none() {
            return Err("loan terms exceed the supported range".to_string());
        }
        if self.repayment_schedule == RepaymentSchedule::Unrecognized {
            return Err(
                "repayment_schedule must be one of daily, weekly, bi-weekly, monthly".to_string(),
            );
        }
        Ok(())
    }
}

/// Request to record a repayment
#[derive(Debug, Deserialize)]
pub struct RepaymentRequest {
    pub amount: Decimal,
}

/// A repayment must be positive and fit the money column exactly.
pub fn validate_repayment_amount(amount: Decimal) -> Result<(), String> {
    if amount <= Decimal::ZERO {
        return Err("amount must be greater than 0".to_string());
    }
    check_decimal("amount", amount, MAX_AMOUNT)
}

/// Request to move a loan through review
#[derive(Debug, Deserialize)]
pub struct UpdateLoanStatusRequest {
    pub status: LoanStatus,
}

/// Query for listing loans
#[derive(Debug, Deserialize, Default)]
pub struct ListLoansQuery {
    pub borrower_id: Option<Uuid>,
    pub status: Option<LoanStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Store-level loan filter
#[derive(Debug, Clone, Default)]
pub struct LoanFilter {
    pub borrower_id: Option<Uuid>,
    pub status: Option<LoanStatus>,
    pub limit: i64,
    pub offset: i64,
}

/// Figures derived from a loan's terms and repayment history
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LoanSummary {
    pub total_owed: Decimal,
    pub total_repaid: Decimal,
    pub outstanding_balance: Decimal,
    pub next_due_date: Option<DateTime<Utc>>,
}

/// Loan together with its computed figures
#[derive(Debug, Serialize, Deserialize)]
pub struct LoanDetails {
    #[serde(flatten)]
    pub loan: Loan,
    pub summary: LoanSummary,
}

/// Result of recording a repayment
#[derive(Debug, Serialize, Deserialize)]
pub struct RepaymentReceipt {
    pub repayment: Repayment,
    pub loan_status: LoanStatus,
    pub summary: LoanSummary,
    pub credit_score_change: i32,
    pub credit_score_reason: String,
}
