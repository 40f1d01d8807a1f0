//! Process-wide counters served at `GET /metrics`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use serde::Serialize;

use crate::error::AppError;
use crate::state::SharedState;

pub struct Metrics {
    started: Instant,
    requests: AtomicU64,
    sign_in_failures: AtomicU64,
    password_resets: AtomicU64,
    emails_verified: AtomicU64,
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_seconds: u64,
    pub requests_total: u64,
    pub users_total: i64,
    pub sign_in_failures_total: u64,
    pub password_resets_total: u64,
    pub emails_verified_total: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            requests: AtomicU64::new(0),
            sign_in_failures: AtomicU64::new(0),
            password_resets: AtomicU64::new(0),
            emails_verified: AtomicU64::new(0),
        }
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sign_in_failure(&self) {
        self.sign_in_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_password_reset(&self) {
        self.password_resets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_email_verified(&self) {
        self.emails_verified.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, users_total: i64) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_seconds: self.started.elapsed().as_secs(),
            requests_total: self.requests.load(Ordering::Relaxed),
            users_total,
            sign_in_failures_total: self.sign_in_failures.load(Ordering::Relaxed),
            password_resets_total: self.password_resets.load(Ordering::Relaxed),
            emails_verified_total: self.emails_verified.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Middleware counting every request that reaches the router.
pub async fn count_requests(
    State(state): State<SharedState>,
    req: Request,
    next: Next,
) -> Response {
    state.metrics.record_request();
    next.run(req).await
}

pub async fn report(State(state): State<SharedState>) -> Result<Json<MetricsSnapshot>, AppError> {
    let users_total = state.stores.users.count().await?;
    Ok(Json(state.metrics.snapshot(users_total)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_events() {
        let metrics = Metrics::new();
        metrics.record_request();
        metrics.record_request();
        metrics.record_sign_in_failure();
        metrics.record_password_reset();
        metrics.record_email_verified();
        metrics.record_email_verified();

        let snapshot = metrics.snapshot(7);
        assert_eq!(snapshot.requests_total, 2);
        assert_eq!(snapshot.users_total, 7);
        assert_eq!(snapshot.sign_in_failures_total, 1);
        assert_eq!(snapshot.password_resets_total, 1);
        assert_eq!(snapshot.emails_verified_total, 2);
    }
}
