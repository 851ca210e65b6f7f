//! Request tracing middleware

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use super::rate_limiter::client_ip;

/// Log each request with its outcome and latency. Every event emitted while
/// the handler runs is recorded inside a `request` span carrying a request id.
pub async fn request_tracing(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client = client_ip(request.headers());
    let request_id = Uuid::new_v4();

    let span = tracing::info_span!(
        "request",
        %request_id,
        method = %method,
        path = %path,
    );

    async move {
        let start = Instant::now();
        tracing::debug!(client_ip = ?client, "Request started");

        let response = next.run(request).await;

        let status = response.status().as_u16();
        let duration_ms = start.elapsed().as_millis() as u64;

        if response.status().is_server_error() {
            tracing::error!(status, duration_ms, "Request failed");
        } else if response.status().is_client_error() {
            tracing::warn!(status, duration_ms, "Request rejected");
        } else {
            tracing::info!(status, duration_ms, "Request completed");
        }

        response
    }
    .instrument(span)
    .await
}
