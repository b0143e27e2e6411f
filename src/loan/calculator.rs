//! Balance and due-date arithmetic for loans.
//!
//! Everything here is a pure function of the loan record. Amounts are exact
//! decimals and are never rounded; formatting belongs to the caller.
//!
//! Terms accepted at intake are bounded so none of this can overflow. Records
//! that somehow exceed `Decimal` range saturate instead of panicking.

use chrono::{DateTime, Duration, Months, Utc};
use rust_decimal::Decimal;

use super::model::{Loan, LoanStatus, LoanSummary, RepaymentSchedule};

const ONE_HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Principal plus flat interest, or `None` if it does not fit a `Decimal`.
pub fn checked_total_owed(principal: Decimal, interest_rate: Decimal) -> Option<Decimal> {
    let factor = Decimal::ONE.checked_add(interest_rate.checked_div(ONE_HUNDRED)?)?;
    principal.checked_mul(factor)
}

/// Principal plus flat, non-compounding interest.
pub fn total_owed(loan: &Loan) -> Decimal {
    checked_total_owed(loan.principal_amount, loan.interest_rate).unwrap_or(Decimal::MAX)
}

/// Sum of every repayment recorded so far.
pub fn total_repaid(loan: &Loan) -> Decimal {
    loan.repayments
        .iter()
        .fold(Decimal::ZERO, |sum, r| sum.saturating_add(r.amount))
}

/// Total owed minus repayments. May go negative on overpayment.
pub fn calculate_outstanding_balance(loan: &Loan) -> Decimal {
    total_owed(loan).saturating_sub(total_repaid(loan))
}

/// Status an active loan settles into given its repayments.
pub fn settled_status(loan: &Loan) -> LoanStatus {
    if calculate_outstanding_balance(loan) <= Decimal::ZERO {
        LoanStatus::Paid
    } else {
        LoanStatus::Active
    }
}

/// Next date a payment falls due, or `None` once the loan is settled or the
/// schedule is not one we can step.
///
/// The anchor is the latest repayment, else the issue date.
pub fn get_next_due_date(loan: &Loan) -> Option<DateTime<Utc>> {
    if calculate_outstanding_balance(loan) <= Decimal::ZERO {
        return None;
    }

    let anchor = loan
        .repayments
        .last()
        .map(|r| r.paid_at)
        .unwrap_or(loan.issue_date);

    advance(anchor, loan.repayment_schedule)
}

/// Step a date forward by one schedule unit. Month steps clamp to the last
/// day of a shorter month (Jan 31 -> Feb 28/29).
pub fn advance(anchor: DateTime<Utc>, schedule: RepaymentSchedule) -> Option<DateTime<Utc>> {
    match schedule {
        RepaymentSchedule::Daily => anchor.checked_add_signed(Duration::days(1)),
        RepaymentSchedule::Weekly => anchor.checked_add_signed(Duration::weeks(1)),
        RepaymentSchedule::BiWeekly => anchor.checked_add_signed(Duration::weeks(2)),
        RepaymentSchedule::Monthly => anchor.checked_add_months(Months::new(1)),
        RepaymentSchedule::Unrecognized => None,
    }
}

/// All derived figures in one pass for API responses.
pub fn summarize(loan: &Loan) -> LoanSummary {
    let total_owed = total_owed(loan);
    let total_repaid = total_repaid(loan);
    LoanSummary {
        total_owed,
        total_repaid,
        outstanding_balance: total_owed.saturating_sub(total_repaid),
        next_due_date: get_next_due_date(loan),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loan::model::Repayment;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn loan(schedule: RepaymentSchedule, issue_date: DateTime<Utc>) -> Loan {
        Loan {
            id: Uuid::new_v4(),
            borrower_id: Uuid::new_v4(),
            form_number: "P-1-NR-IL-000000000000".to_string(),
            principal_amount: dec!(1000),
            interest_rate: dec!(10),
            repayment_schedule: schedule,
            issue_date,
            status: LoanStatus::Active,
            repayments: Vec::new(),
            created_at: issue_date,
            updated_at: issue_date,
        }
    }

    fn repay(loan: &mut Loan, amount: Decimal, at: DateTime<Utc>) {
        loan.repayments.push(Repayment {
            id: Uuid::new_v4(),
            loan_id: loan.id,
            amount,
            paid_at: at,
            recorded_by: None,
        });
    }

    fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_balance_without_repayments() {
        let l = loan(RepaymentSchedule::Weekly, date(2024, 1, 1));
        assert_eq!(total_owed(&l), dec!(1100));
        assert_eq!(calculate_outstanding_balance(&l), dec!(1100));
    }

    #[test]
    fn test_balance_with_repayments_is_exact() {
        let mut l = loan(RepaymentSchedule::Weekly, date(2024, 1, 1));
        l.interest_rate = dec!(12.5);
        repay(&mut l, dec!(100.10), date(2024, 1, 8));
        repay(&mut l, dec!(0.05), date(2024, 1, 15));
        assert_eq!(calculate_outstanding_balance(&l), dec!(1024.85));
    }

    #[test]
    fn test_overpayment_goes_negative_and_has_no_due_date() {
        let mut l = loan(RepaymentSchedule::Daily, date(2024, 1, 1));
        repay(&mut l, dec!(1200), date(2024, 1, 2));
        assert_eq!(calculate_outstanding_balance(&l), dec!(-100));
        assert_eq!(get_next_due_date(&l), None);
    }

    #[test]
    fn test_exactly_settled_has_no_due_date() {
        for schedule in [
            RepaymentSchedule::Daily,
            RepaymentSchedule::Weekly,
            RepaymentSchedule::BiWeekly,
            RepaymentSchedule::Monthly,
        ] {
            let mut l = loan(schedule, date(2024, 1, 1));
            repay(&mut l, dec!(1100), date(2024, 1, 5));
            assert_eq!(get_next_due_date(&l), None, "{:?}", schedule);
        }
    }

    #[test]
    fn test_weekly_from_issue_date() {
        let l = loan(RepaymentSchedule::Weekly, date(2024, 3, 1));
        assert_eq!(get_next_due_date(&l), Some(date(2024, 3, 8)));
    }

    #[test]
    fn test_monthly_from_last_repayment() {
        let mut l = loan(RepaymentSchedule::Monthly, date(2024, 1, 1));
        repay(&mut l, dec!(100), date(2024, 2, 10));
        assert_eq!(get_next_due_date(&l), Some(date(2024, 3, 10)));
    }

    #[test]
    fn test_anchor_is_latest_repayment() {
        let mut l = loan(RepaymentSchedule::BiWeekly, date(2024, 1, 1));
        repay(&mut l, dec!(50), date(2024, 1, 10));
        repay(&mut l, dec!(50), date(2024, 1, 20));
        assert_eq!(get_next_due_date(&l), Some(date(2024, 2, 3)));
    }

    #[test]
    fn test_daily_schedule() {
        let l = loan(RepaymentSchedule::Daily, date(2024, 2, 28));
        assert_eq!(get_next_due_date(&l), Some(date(2024, 2, 29)));
    }

    #[test]
    fn test_month_end_clamps() {
        let l = loan(RepaymentSchedule::Monthly, date(2023, 1, 31));
        assert_eq!(get_next_due_date(&l), Some(date(2023, 2, 28)));
    }

    #[test]
    fn test_unrecognized_schedule_yields_none() {
        let l = loan(RepaymentSchedule::Unrecognized, date(2024, 1, 1));
        assert_eq!(get_next_due_date(&l), None);
    }

    #[test]
    fn test_settled_status_follows_balance() {
        let mut l = loan(RepaymentSchedule::Weekly, date(2024, 1, 1));
        repay(&mut l, dec!(1099.9999), date(2024, 1, 3));
        assert_eq!(settled_status(&l), LoanStatus::Active);
        repay(&mut l, dec!(0.0001), date(2024, 1, 4));
        assert_eq!(settled_status(&l), LoanStatus::Paid);
        repay(&mut l, dec!(50), date(2024, 1, 5));
        assert_eq!(settled_status(&l), LoanStatus::Paid);
    }

    #[test]
    fn test_out_of_range_terms_do_not_panic() {
        assert_eq!(checked_total_owed(Decimal::MAX, dec!(10)), None);
        assert_eq!(checked_total_owed(dec!(1000), dec!(10)), Some(dec!(1100)));

        let mut l = loan(RepaymentSchedule::Weekly, date(2024, 1, 1));
        l.principal_amount = Decimal::MAX;
        assert_eq!(total_owed(&l), Decimal::MAX);
        assert!(summarize(&l).next_due_date.is_some());
    }

    #[test]
    fn test_summary_matches_parts() {
        let mut l = loan(RepaymentSchedule::Weekly, date(2024, 1, 1));
        repay(&mut l, dec!(300), date(2024, 1, 3));
        let summary = summarize(&l);
        assert_eq!(summary.total_owed, dec!(1100));
        assert_eq!(summary.total_repaid, dec!(300));
        assert_eq!(summary.outstanding_balance, dec!(800));
        assert_eq!(summary.next_due_date, Some(date(2024, 1, 10)));
    }
}
