//! Request tracing middleware

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use super::rate_limiter::extract_client_ip;

/// Middleware for logging request information with timing
pub async fn request_tracing(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client_ip = extract_client_ip(&request);

    // Health probes would drown everything else at info
    if path == "/health" {
        return next.run(request).await;
    }

    let start = Instant::now();
    tracing::debug!(method = %method, path = %path, client_ip = %client_ip, "Request started");

    let response = next.run(request).await;

    let duration_ms = start.elapsed().as_millis();
    let status = response.status().as_u16();

    if response.status().is_server_error() {
        tracing::error!(
            method = %method,
            path = %path,
            client_ip = %client_ip,
            status,
            duration_ms = %duration_ms,
            "Request completed with error"
        );
    } else if response.status().is_client_error() {
        tracing::warn!(
            method = %method,
            path = %path,
            client_ip = %client_ip,
            status,
            duration_ms = %duration_ms,
            "Request completed with client error"
        );
    } else {
        tracing::info!(
            method = %method,
            path = %path,
            status,
            duration_ms = %duration_ms,
            "Request completed"
        );
    }

    response
}
