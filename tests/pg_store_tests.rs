//! PostgreSQL store tests

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use sqlx::PgPool;
    use uuid::Uuid;

    use microloan_server::db::run_migrations;
    use microloan_server::loan::{
        LoanStatus, NewLoan, NewRepayment, RepaymentAppend, RepaymentSchedule,
    };
    use microloan_server::models::{ApiScope, NewApiKey, NewUser, UserRole};
    use microloan_server::services::ScoringPolicy;
    use microloan_server::store::{
        ApiKeyStore, FormNumberLookup, LoanStore, PgStore, Store, StoreError, UserStore,
    };

    /// Helper to create a migrated test database pool
    async fn setup_test_db() -> PgPool {
        let database_url = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/microloan_test".to_string());

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(2)
            .connect(&database_url)
            .await
            .expect("Failed to connect to test database");
        run_migrations(&pool).await.expect("Failed to migrate");
        pool
    }

    fn new_user() -> NewUser {
        NewUser {
            email: format!("{}@pg.test", Uuid::new_v4()),
            name: "PG".to_string(),
            phone: None,
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_health_check() {
        let store = PgStore::new(setup_test_db().await);
        assert!(store.health_check().await.is_ok());
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_only_one_super_admin() {
        let store = PgStore::new(setup_test_db().await);

        store.create_user(new_user()).await.unwrap();
        let later = store.create_user(new_user()).await.unwrap();
        assert_eq!(later.role, UserRole::User);

        let user = new_user();
        store.create_user(user.clone()).await.unwrap();
        let err = store.create_user(user).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_api_key_use_is_recorded_atomically() {
        let store = PgStore::new(setup_test_db().await);
        let admin = store.create_user(new_user()).await.unwrap();
        let secret = format!("mk_{}", Uuid::new_v4().simple());

        let key = store
            .insert_api_key(NewApiKey {
                partner_name: "PG Partner".to_string(),
                key: secret.clone(),
                scopes: vec![ApiScope::Read, ApiScope::Write],
                created_by: admin.id,
            })
            .await
            .unwrap();
        assert!(key.partner_id > 0);
        assert_eq!(key.scopes, vec![ApiScope::Read, ApiScope::Write]);

        let used = store.record_api_key_use(&secret, Utc::now()).await.unwrap().unwrap();
        assert_eq!(used.request_count, 1);

        store.set_api_key_enabled(key.id, false).await.unwrap();
        assert!(store.record_api_key_use(&secret, Utc::now()).await.unwrap().is_none());
        assert!(store.delete_api_key(key.id).await.unwrap());
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_repayments_and_score_persist() {
        let store = PgStore::new(setup_test_db().await);
        let borrower = store.create_user(new_user()).await.unwrap();
        let form_number = format!("P-1-NR-IL-{}", &Uuid::new_v4().simple().to_string()[..12].to_uppercase());

        let loan = store
            .insert_loan(NewLoan {
                borrower_id: borrower.id,
                form_number: form_number.clone(),
                principal_amount: dec!(1000),
                interest_rate: dec!(10),
                repayment_schedule: RepaymentSchedule::Monthly,
                issue_date: Utc::now(),
            })
            .await
            .unwrap();
        assert!(store.form_number_exists(&form_number).await.unwrap());

        store
            .update_loan_status(loan.id, LoanStatus::Active, Some(Utc::now()))
            .await
            .unwrap();
        for amount in [dec!(100), dec!(200)] {
            let outcome = store
                .append_repayment(NewRepayment {
                    loan_id: loan.id,
                    amount,
                    paid_at: Utc::now(),
                    recorded_by: borrower.id,
                })
                .await
                .unwrap();
            assert!(matches!(outcome, RepaymentAppend::Recorded(_)));
        }

        let loan = store.find_loan(loan.id).await.unwrap().unwrap();
        let amounts: Vec<_> = loan.repayments.iter().map(|r| r.amount).collect();
        assert_eq!(amounts, vec![dec!(100), dec!(200)]);

        let entry = store
            .apply_credit_score_change(borrower.id, 10, "on time", Utc::now(), &ScoringPolicy::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.new_score, 510);
        let reloaded = store.find_user(borrower.id).await.unwrap().unwrap();
        assert_eq!(reloaded.credit_score_history.len(), 1);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_concurrent_repayments_settle_under_lock() {
        let store = PgStore::new(setup_test_db().await);
        let borrower = store.create_user(new_user()).await.unwrap();
        let form_number = format!("P-1-SR-GL-{}", &Uuid::new_v4().simple().to_string()[..12].to_uppercase());

        let loan = store
            .insert_loan(NewLoan {
                borrower_id: borrower.id,
                form_number,
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
            .unwrap();

        let pay = |amount| NewRepayment {
            loan_id: loan.id,
            amount,
            paid_at: Utc::now(),
            recorded_by: borrower.id,
        };
        let (a, b) = tokio::join!(
            store.append_repayment(pay(dec!(600))),
            store.append_repayment(pay(dec!(600))),
        );
        assert!(matches!(a.unwrap(), RepaymentAppend::Recorded(_)));
        assert!(matches!(b.unwrap(), RepaymentAppend::Recorded(_)));

        let settled = store.find_loan(loan.id).await.unwrap().unwrap();
        assert_eq!(settled.status, LoanStatus::Paid);
        assert_eq!(settled.repayments.len(), 2);

        let late = store.append_repayment(pay(dec!(1))).await.unwrap();
        assert!(matches!(late, RepaymentAppend::NotActive(LoanStatus::Paid)));
    }
}
