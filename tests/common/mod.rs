//! Shared helpers for router-level tests over the in-memory store

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use microloan_server::build_router;
use microloan_server::config::{Config, Environment};
use microloan_server::services::ScoringPolicy;
use microloan_server::state::AppState;
use microloan_server::store::InMemoryStore;

pub fn test_config() -> Config {
    Config {
        database_url: "postgresql://localhost/microloan_test".to_string(),
        environment: Environment::Development,
        host: "127.0.0.1".to_string(),
        port: 0,
        db_max_connections: 1,
        rate_limit_rps: 1000,
        cors_allowed_origins: None,
        log_level: "warn".to_string(),
        jwt_secret: "integration-test-secret".to_string(),
        jwt_access_token_ttl_seconds: 3600,
        bcrypt_cost: 4,
        scoring: ScoringPolicy::default(),
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let state = AppState::new(store.clone(), &config);
        let router = build_router(state.clone(), &config);
        Self {
            router,
            state,
            store,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    /// JSON request with an optional bearer token
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    /// JSON request carrying an API key
    pub async fn partner_call(
        &self,
        method: Method,
        uri: &str,
        api_key: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = api_key {
            builder = builder.header("x-api-key", key);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    /// Register an account and return (user id, access token)
    pub async fn register(&self, email: &str) -> (String, String) {
        let (status, body) = self
            .call(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({
                    "email": email,
                    "name": "Test User",
                    "password": "correct-horse-battery"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        (
            body["data"]["user"]["id"].as_str().unwrap().to_string(),
            body["data"]["access_token"].as_str().unwrap().to_string(),
        )
    }

    /// Create a partner key as the super-admin; returns (key id, partner id, secret)
    pub async fn create_api_key(
        &self,
        admin_token: &str,
        partner_name: &str,
        scopes: &[&str],
    ) -> (String, i64, String) {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/admin/api-keys",
                Some(admin_token),
                Some(json!({ "partner_name": partner_name, "scopes": scopes })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "key creation failed: {}", body);
        (
            body["data"]["id"].as_str().unwrap().to_string(),
            body["data"]["partner_id"].as_i64().unwrap(),
            body["data"]["key"].as_str().unwrap().to_string(),
        )
    }
}
