//! Per-client rate limiting
//!
//! Token bucket per client IP, refilled at `RATE_LIMIT_RPS` with a burst of
//! twice that. Idle buckets are swept by a background task.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

use crate::error::ApiError;

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn full(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_take(&mut self, refill_per_sec: f64, capacity: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_per_sec).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<RwLock<HashMap<String, TokenBucket>>>,
    refill_per_sec: f64,
    capacity: f64,
}

impl RateLimiter {
    pub fn new(requests_per_second: u32) -> Self {
        let rps = requests_per_second.max(1) as f64;
        Self {
            buckets: Arc::new(RwLock::new(HashMap::new())),
            refill_per_sec: rps,
            capacity: rps * 2.0,
        }
    }

    /// Take one token for `client`
    pub async fn check(&self, client: &str) -> bool {
        let mut buckets = self.buckets.write().await;
        buckets
            .entry(client.to_string())
            .or_insert_with(|| TokenBucket::full(self.capacity))
            .try_take(self.refill_per_sec, self.capacity)
    }

    /// Drop buckets untouched for `max_idle`
    pub async fn sweep(&self, max_idle: Duration) {
        let now = Instant::now();
        self.buckets
            .write()
            .await
            .retain(|_, bucket| now.duration_since(bucket.last_update) < max_idle);
    }

    /// Sweep idle buckets every `every`
    pub fn spawn_sweeper(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                limiter.sweep(every).await;
            }
        })
    }
}

/// Middleware entry point, used with `middleware::from_fn_with_state`
pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_ip(request.headers()).unwrap_or_else(|| "unknown".to_string());

    if !limiter.check(&client).await {
        tracing::warn!(client = %client, "Rate limit exceeded");
        let mut response =
            ApiError::TooManyRequests("Too many requests. Please try again later.".into())
                .into_response();
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, header::HeaderValue::from_static("1"));
        return response;
    }

    next.run(request).await
}

/// Client address from proxy headers (`X-Forwarded-For`, then `X-Real-IP`)
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.trim().to_string())
        })
}
