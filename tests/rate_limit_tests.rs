//! Rate limiting by client address and by resolved partner

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use uuid::Uuid;

use common::{test_config, TestApp};
use microloan_server::models::{ApiScope, NewApiKey};
use microloan_server::store::ApiKeyStore;

fn throttled_app() -> TestApp {
    let mut config = test_config();
    config.rate_limit_rps = 1;
    TestApp::with_config(config)
}

fn request(uri: &str, client_ip: &str, api_key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .uri(uri)
        .header("x-forwarded-for", client_ip);
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_fresh_api_keys_do_not_buy_fresh_buckets() {
    let app = throttled_app();

    let mut allowed = 0;
    let mut throttled = 0;
    for i in 0..20 {
        let key = format!("junk{}", i);
        let (status, body) = app
            .send(request("/health", "198.51.100.4", Some(&key)))
            .await;
        match status {
            StatusCode::OK => allowed += 1,
            StatusCode::TOO_MANY_REQUESTS => {
                assert_eq!(body["error"]["code"], "TOO_MANY_REQUESTS");
                throttled += 1;
            }
            other => panic!("unexpected status {}", other),
        }
    }

    // Burst of two, plus at most one refill during the loop
    assert!(allowed <= 3, "{} requests got through", allowed);
    assert_eq!(allowed + throttled, 20);
}

#[tokio::test]
async fn test_other_addresses_keep_their_own_bucket() {
    let app = throttled_app();

    for _ in 0..5 {
        app.send(request("/health", "198.51.100.4", None)).await;
    }
    let (status, _) = app.send(request("/health", "198.51.100.5", None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_partner_is_limited_across_addresses() {
    let app = throttled_app();
    let secret = format!("mk_{}", Uuid::new_v4().simple());
    app.store
        .insert_api_key(NewApiKey {
            partner_name: "Acme MFI".to_string(),
            key: secret.clone(),
            scopes: vec![ApiScope::Read],
            created_by: Uuid::new_v4(),
        })
        .await
        .unwrap();

    let mut statuses = Vec::new();
    for i in 0..6 {
        let ip = format!("203.0.113.{}", i);
        let (status, _) = app
            .send(request("/partner/v1/form-series", &ip, Some(&secret)))
            .await;
        statuses.push(status);
    }

    assert_eq!(statuses[0], StatusCode::OK);
    assert_eq!(statuses[1], StatusCode::OK);
    assert!(statuses.contains(&StatusCode::TOO_MANY_REQUESTS));
}
