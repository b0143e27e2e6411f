//! Form number generation against a store

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal_macros::dec;
use uuid::Uuid;

use microloan_server::loan::{NewLoan, RepaymentSchedule};
use microloan_server::models::{FormType, RegionCode};
use microloan_server::services::form_number::{parse_form_number, MAX_GENERATION_ATTEMPTS};
use microloan_server::services::{FormNumberError, FormNumberGenerator};
use microloan_server::store::{FormNumberLookup, InMemoryStore, LoanStore, StoreError, StoreResult};

/// Lookup that reports every candidate as taken
#[derive(Default)]
struct AlwaysTaken {
    calls: AtomicUsize,
}

#[async_trait]
impl FormNumberLookup for AlwaysTaken {
    async fn form_number_exists(&self, _form_number: &str) -> StoreResult<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}

/// Lookup whose backend is down
struct Broken;

#[async_trait]
impl FormNumberLookup for Broken {
    async fn form_number_exists(&self, _form_number: &str) -> StoreResult<bool> {
        Err(StoreError::Corrupt("connection reset".to_string()))
    }
}

#[tokio::test]
async fn test_sequential_numbers_are_distinct_and_well_formed() {
    let store = InMemoryStore::new();
    let generator = FormNumberGenerator::default();

    let mut seen = HashSet::new();
    for _ in 0..2 {
        let number = generator
            .generate(&store, 42, RegionCode::East, FormType::SmallBusiness)
            .await
            .unwrap();

        assert!(number.starts_with("P-42-ER-SL-"));
        let suffix = number.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 12);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        assert_eq!(
            parse_form_number(&number),
            Some((42, RegionCode::East, FormType::SmallBusiness))
        );

        // Persist it so the next round must avoid it
        store
            .insert_loan(NewLoan {
                borrower_id: Uuid::new_v4(),
                form_number: number.clone(),
                principal_amount: dec!(100),
                interest_rate: dec!(5),
                repayment_schedule: RepaymentSchedule::Daily,
                issue_date: Utc::now(),
            })
            .await
            .unwrap();
        assert!(seen.insert(number));
    }
    assert_eq!(seen.len(), 2);
}

#[tokio::test]
async fn test_generation_gives_up_after_bounded_collisions() {
    let lookup = AlwaysTaken::default();
    let generator = FormNumberGenerator::default();

    let err = generator
        .generate(&lookup, 1, RegionCode::North, FormType::Individual)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FormNumberError::Exhausted { attempts } if attempts == MAX_GENERATION_ATTEMPTS
    ));
    assert_eq!(lookup.calls.load(Ordering::SeqCst), MAX_GENERATION_ATTEMPTS);
}

#[tokio::test]
async fn test_invalid_partner_is_rejected_before_lookup() {
    let lookup = AlwaysTaken::default();

    for partner_id in [0, -3] {
        let err = FormNumberGenerator::default()
            .generate(&lookup, partner_id, RegionCode::West, FormType::Group)
            .await
            .unwrap_err();
        assert!(matches!(err, FormNumberError::InvalidPartnerId(id) if id == partner_id));
    }
    assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_store_failure_propagates() {
    let err = FormNumberGenerator::new(3)
        .generate(&Broken, 5, RegionCode::South, FormType::Group)
        .await
        .unwrap_err();

    assert!(matches!(err, FormNumberError::Store(StoreError::Corrupt(_))));
}
