//! Request tracing middleware

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use super::api_key::PartnerContext;
use super::rate_limiter::client_ip;

/// Log each request with its status, latency and, on the partner surface,
/// the partner the API key resolved to.
pub async fn request_tracing(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client_ip = client_ip(&request);

    let start = Instant::now();

    tracing::debug!(
        method = %method,
        path = %path,
        client_ip = ?client_ip,
        "Request started"
    );

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();
    let partner_id = response
        .extensions()
        .get::<PartnerContext>()
        .map(|p| p.partner_id);

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            partner_id = ?partner_id,
            duration_ms = %duration.as_millis(),
            "Request completed with error"
        );
    } else if status.is_client_error() {
        tracing::warn!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            partner_id = ?partner_id,
            duration_ms = %duration.as_millis(),
            "Request completed with client error"
        );
    } else {
        tracing::info!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            partner_id = ?partner_id,
            duration_ms = %duration.as_millis(),
            "Request completed"
        );
    }

    response
}
