//! Repayment scoring and persisted score history

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use microloan_server::loan::{Loan, LoanStatus, RepaymentSchedule, Repayment};
use microloan_server::models::NewUser;
use microloan_server::services::credit_score::{
    calculate_repayment_score, CreditScoreService, ScoringPolicy, DEFAULT_CREDIT_SCORE,
};
use microloan_server::store::{InMemoryStore, UserStore};

fn issued_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

fn weekly_loan(principal: Decimal, rate: Decimal) -> Loan {
    Loan {
        id: Uuid::new_v4(),
        borrower_id: Uuid::new_v4(),
        form_number: "P-7-NR-IL-0123456789AB".to_string(),
        principal_amount: principal,
        interest_rate: rate,
        repayment_schedule: RepaymentSchedule::Weekly,
        issue_date: issued_at(),
        status: LoanStatus::Active,
        repayments: Vec::new(),
        created_at: issued_at(),
        updated_at: issued_at(),
    }
}

async fn store_with_user() -> (Arc<InMemoryStore>, Uuid) {
    let store = Arc::new(InMemoryStore::new());
    let user = store
        .create_user(NewUser {
            email: "amina@borrower.test".to_string(),
            name: "Amina".to_string(),
            phone: None,
            password_hash: "x".to_string(),
        })
        .await
        .unwrap();
    (store, user.id)
}

#[test]
fn test_significant_on_time_payment_earns_bonus() {
    let loan = weekly_loan(dec!(1000), dec!(10));
    let policy = ScoringPolicy::default();

    let proposal =
        calculate_repayment_score(&loan, dec!(300), issued_at() + Duration::days(3), &policy);

    assert_eq!(proposal.change, 10);
    assert!(proposal.reason.contains("significant"));
}

#[test]
fn test_payment_exactly_at_due_date_is_on_time() {
    let loan = weekly_loan(dec!(1000), dec!(10));
    let policy = ScoringPolicy::default();
    let due = issued_at() + Duration::weeks(1);

    let proposal = calculate_repayment_score(&loan, dec!(50), due, &policy);
    assert_eq!(proposal.change, 5);

    let proposal = calculate_repayment_score(&loan, dec!(50), due + Duration::seconds(1), &policy);
    assert_eq!(proposal.change, -10);
    assert!(proposal.reason.starts_with("Late"));
}

#[test]
fn test_due_date_moves_with_last_repayment() {
    let mut loan = weekly_loan(dec!(1000), dec!(10));
    loan.repayments.push(Repayment {
        id: Uuid::new_v4(),
        loan_id: loan.id,
        amount: dec!(100),
        paid_at: issued_at() + Duration::days(6),
        recorded_by: None,
    });
    let policy = ScoringPolicy::default();

    // Eight days after issue is late against the issue date but on time
    // against the last repayment
    let proposal =
        calculate_repayment_score(&loan, dec!(100), issued_at() + Duration::days(8), &policy);
    assert_eq!(proposal.change, 5);
}

#[test]
fn test_quarter_of_total_is_not_significant() {
    // 275 / 1100 is exactly the threshold, which must be exceeded
    let loan = weekly_loan(dec!(1000), dec!(10));
    let proposal = calculate_repayment_score(
        &loan,
        dec!(275),
        issued_at() + Duration::days(1),
        &ScoringPolicy::default(),
    );
    assert_eq!(proposal.change, 5);
}

#[test]
fn test_custom_policy_is_honored() {
    let loan = weekly_loan(dec!(1000), dec!(0));
    let policy = ScoringPolicy {
        late_penalty: -25,
        on_time_reward: 2,
        significant_bonus: 8,
        significant_ratio: dec!(0.5),
        ..ScoringPolicy::default()
    };

    let on_time = calculate_repayment_score(&loan, dec!(600), issued_at(), &policy);
    assert_eq!(on_time.change, 10);

    let late = calculate_repayment_score(&loan, dec!(600), issued_at() + Duration::days(30), &policy);
    assert_eq!(late.change, -25);
}

#[tokio::test]
async fn test_score_is_clamped_and_history_records_actual_delta() {
    let (store, user_id) = store_with_user().await;
    let policy = ScoringPolicy::default();

    store
        .apply_credit_score_change(user_id, 345, "seed", Utc::now(), &policy)
        .await
        .unwrap();
    let entry = store
        .apply_credit_score_change(user_id, 20, "bonus", Utc::now(), &policy)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(entry.new_score, 850);
    assert_eq!(entry.change, 5);

    let user = store.find_user(user_id).await.unwrap().unwrap();
    assert_eq!(user.credit_score, Some(850));
    assert_eq!(user.credit_score_history[0].change, 5);
    assert_eq!(user.credit_score_history[1].reason, "seed");
}

#[tokio::test]
async fn test_score_floor() {
    let (store, user_id) = store_with_user().await;

    let entry = store
        .apply_credit_score_change(user_id, -1000, "default", Utc::now(), &ScoringPolicy::default())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(entry.new_score, 300);
    assert_eq!(entry.change, 300 - DEFAULT_CREDIT_SCORE);
}

#[tokio::test]
async fn test_history_keeps_most_recent_twenty() {
    let (store, user_id) = store_with_user().await;
    let policy = ScoringPolicy::default();

    for i in 0..25 {
        store
            .apply_credit_score_change(user_id, 1, &format!("change {}", i), Utc::now(), &policy)
            .await
            .unwrap();
    }

    let user = store.find_user(user_id).await.unwrap().unwrap();
    assert_eq!(user.credit_score, Some(DEFAULT_CREDIT_SCORE + 25));
    assert_eq!(user.credit_score_history.len(), 20);
    assert_eq!(user.credit_score_history[0].reason, "change 24");
    assert_eq!(user.credit_score_history[19].reason, "change 5");
}

#[tokio::test]
async fn test_update_for_missing_user_is_a_no_op() {
    let (store, user_id) = store_with_user().await;
    let service = CreditScoreService::new(store.clone(), ScoringPolicy::default());

    service
        .update_user_credit_score(Uuid::new_v4(), 10, "ghost")
        .await;

    let user = store.find_user(user_id).await.unwrap().unwrap();
    assert_eq!(user.credit_score, None);
    assert!(user.credit_score_history.is_empty());

    service.update_user_credit_score(user_id, 10, "real").await;
    let user = store.find_user(user_id).await.unwrap().unwrap();
    assert_eq!(user.credit_score, Some(510));
}
