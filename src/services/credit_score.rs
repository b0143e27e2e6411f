//! Repayment-driven credit scoring.
//!
//! A borrower's score moves with each recorded repayment: late payments cost
//! points, on-time payments earn them, and large on-time payments earn a
//! bonus. Scores are clamped and every adjustment is kept in a short,
//! most-recent-first history on the user record.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::loan::{calculator, Loan};
use crate::models::CreditScoreHistoryEntry;
use crate::store::Store;

// ============================================================================
// Policy
// ============================================================================

/// Lowest score a user can hold
pub const MIN_CREDIT_SCORE: i32 = 300;

/// Highest score a user can hold
pub const MAX_CREDIT_SCORE: i32 = 850;

/// Score assumed for users that have never been scored
pub const DEFAULT_CREDIT_SCORE: i32 = 500;

/// Number of history entries retained per user
pub const CREDIT_HISTORY_LIMIT: usize = 20;

/// Tunable scoring constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringPolicy {
    /// Applied when a repayment arrives after the due date (negative)
    pub late_penalty: i32,
    /// Applied to any repayment on or before the due date
    pub on_time_reward: i32,
    /// Extra reward for an on-time repayment above `significant_ratio`
    pub significant_bonus: i32,
    /// Fraction of the total owed that makes a repayment significant
    pub significant_ratio: Decimal,
    pub min_score: i32,
    pub max_score: i32,
    pub default_score: i32,
    pub history_limit: usize,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            late_penalty: -10,
            on_time_reward: 5,
            significant_bonus: 5,
            significant_ratio: dec!(0.25),
            min_score: MIN_CREDIT_SCORE,
            max_score: MAX_CREDIT_SCORE,
            default_score: DEFAULT_CREDIT_SCORE,
            history_limit: CREDIT_HISTORY_LIMIT,
        }
    }
}

impl ScoringPolicy {
    pub fn clamp(&self, score: i32) -> i32 {
        score.clamp(self.min_score, self.max_score)
    }
}

// ============================================================================
// Scoring
// ============================================================================

/// Proposed adjustment for one repayment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreProposal {
    pub change: i32,
    pub reason: String,
}

/// Score a repayment against the loan as it stood before the payment.
///
/// `loan` must not yet contain the repayment being scored. A payment made
/// exactly at the due date is on time; only strictly later is late.
pub fn calculate_repayment_score(
    loan: &Loan,
    repayment_amount: Decimal,
    now: DateTime<Utc>,
    policy: &ScoringPolicy,
) -> ScoreProposal {
    if let Some(due) = calculator::get_next_due_date(loan) {
        if now > due {
            return ScoreProposal {
                change: policy.late_penalty,
                reason: format!(
                    "Late payment on loan {} (due {})",
                    loan.form_number,
                    due.format("%Y-%m-%d")
                ),
            };
        }
    }

    let mut change = policy.on_time_reward;
    let mut reason = format!("On-time payment on loan {}", loan.form_number);

    let significant = repayment_amount
        .checked_div(calculator::total_owed(loan))
        .is_some_and(|ratio| ratio > policy.significant_ratio);
    if significant {
        change = change.saturating_add(policy.significant_bonus);
        reason.push_str(" (significant payment)");
    }

    ScoreProposal { change, reason }
}

/// Apply a change to a score and its history.
///
/// The recorded delta is the change that actually landed after clamping, not
/// the requested one. The new entry goes first and the oldest entries fall
/// off the end past `policy.history_limit`.
pub fn apply_score_change(
    current: Option<i32>,
    mut history: Vec<CreditScoreHistoryEntry>,
    change: i32,
    reason: &str,
    at: DateTime<Utc>,
    policy: &ScoringPolicy,
) -> (i32, Vec<CreditScoreHistoryEntry>, CreditScoreHistoryEntry) {
    let current = current.unwrap_or(policy.default_score);
    let new_score = policy.clamp(current.saturating_add(change));

    let entry = CreditScoreHistoryEntry {
        date: at,
        change: new_score - current,
        reason: reason.to_string(),
        new_score,
    };

    history.insert(0, entry.clone());
    history.truncate(policy.history_limit);

    (new_score, history, entry)
}

// ============================================================================
// Service
// ============================================================================

/// Persists score adjustments against user records
#[derive(Clone)]
pub struct CreditScoreService {
    store: Arc<dyn Store>,
    policy: ScoringPolicy,
}

impl CreditScoreService {
    pub fn new(store: Arc<dyn Store>, policy: ScoringPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    /// Apply a change to a user's score.
    ///
    /// Never fails the caller: a missing user or a store error is logged and
    /// dropped, since scoring rides on a repayment that already succeeded.
    pub async fn update_user_credit_score(&self, user_id: Uuid, change: i32, reason: &str) {
        match self
            .store
            .apply_credit_score_change(user_id, change, reason, Utc::now(), &self.policy)
            .await
        {
            Ok(Some(entry)) => {
                tracing::info!(
                    user_id = %user_id,
                    requested = change,
                    applied = entry.change,
                    new_score = entry.new_score,
                    "Credit score updated"
                );
            }
            Ok(None) => {
                tracing::warn!(user_id = %user_id, "Credit score update skipped: user not found");
            }
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "Credit score update failed");
            }
        }
    }
}
