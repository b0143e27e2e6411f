//! Rate limiting middleware

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration, time::Instant};
use tokio::sync::RwLock;

use crate::error::ApiError;

/// Token bucket for rate limiting
#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(max_tokens: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_update: Instant::now(),
        }
    }

    fn try_consume(&mut self, tokens_per_second: f64, max_tokens: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * tokens_per_second).min(max_tokens);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Token buckets keyed by client IP (`ip:`) and, once the API key gate has
/// resolved a key, by partner (`partner:`).
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<RwLock<HashMap<String, TokenBucket>>>,
    tokens_per_second: f64,
    max_tokens: f64,
}

impl RateLimiter {
    pub fn new(requests_per_second: u32) -> Self {
        let rps = requests_per_second.max(1);
        Self {
            buckets: Arc::new(RwLock::new(HashMap::new())),
            tokens_per_second: rps as f64,
            // Burst of 2x
            max_tokens: (rps * 2) as f64,
        }
    }

    /// Take one token for `key`. False when the bucket is empty.
    pub async fn check(&self, key: &str) -> bool {
        let mut buckets = self.buckets.write().await;

        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.max_tokens));

        bucket.try_consume(self.tokens_per_second, self.max_tokens)
    }

    /// Drop buckets idle for longer than `max_age`.
    pub async fn cleanup(&self, max_age: Duration) {
        let mut buckets = self.buckets.write().await;
        let now = Instant::now();

        buckets.retain(|_, bucket| now.duration_since(bucket.last_update) < max_age);
    }

    /// Periodically evict idle buckets for the life of the process.
    pub fn spawn_cleanup(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                limiter.cleanup(every).await;
            }
        })
    }
}

/// Middleware rejecting clients that exceed their IP bucket with 429.
///
/// Runs before any credential is checked, so only the client address picks
/// the bucket; a presented API key is not trusted here.
pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let bucket = ip_bucket(&request);

    if !limiter.check(&bucket).await {
        tracing::warn!(client = %bucket, "Rate limit exceeded");
        return too_many_requests();
    }

    next.run(request).await
}

/// 429 with a one second `Retry-After`
pub(crate) fn too_many_requests() -> Response {
    let mut response = ApiError::TooManyRequests.into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
    response
}

fn ip_bucket(request: &Request) -> String {
    format!(
        "ip:{}",
        client_ip(request).unwrap_or_else(|| "unknown".to_string())
    )
}

/// Client IP from proxy headers, else the peer address of the connection
pub(crate) fn client_ip(request: &Request) -> Option<String> {
    if let Some(forwarded) = request.headers().get("x-forwarded-for") {
        if let Ok(s) = forwarded.to_str() {
            if let Some(ip) = s.split(',').next() {
                return Some(ip.trim().to_string());
            }
        }
    }

    if let Some(real_ip) = request
        .headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
    {
        return Some(real_ip.to_string());
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}
