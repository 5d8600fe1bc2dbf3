//! # Health & Observability Endpoints
//!
//! | Endpoint | Purpose | K8s Probe |
//! |----------|---------|-----------|
//! | `GET /healthz` | Liveness — process is alive | `livenessProbe` |
//! | `GET /readyz` | Readiness — database connected, accepting traffic | `readinessProbe` |
//! | `GET /metrics` | Prometheus scraping endpoint | `ServiceMonitor` |
//!
//! The readiness probe performs a `SELECT 1` with a 2-second timeout. If the
//! database is unreachable, the portal returns 503 so the load balancer stops
//! routing traffic to it until connectivity is restored.

use super::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

/// Liveness probe: returns 200 if the process is running.
///
/// No dependencies checked — if the binary is serving HTTP, it's alive.
pub async fn handler_healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness probe: returns 200 if the portal can serve requests.
///
/// Checks database connectivity with `SELECT 1` and a 2-second timeout.
pub async fn handler_readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let check =
        tokio::time::timeout(std::time::Duration::from_secs(2), state.db.health_check()).await;

    match check {
        Ok(Ok(())) => (StatusCode::OK, "ok"),
        Ok(Err(_)) => (StatusCode::SERVICE_UNAVAILABLE, "database unreachable"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "database timeout"),
    }
}

/// Prometheus metrics endpoint: returns all metrics in text exposition format.
pub async fn handler_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state.prom_metrics.encode();
    (
        StatusCode::OK,
        [(
            "content-type",
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        body,
    )
}

#[derive(Deserialize)]
pub(super) struct NotificationsQuery {
    limit: Option<usize>,
}

/// `GET /api/notifications?limit=20` — recent frontend notifications
/// (totem awards, milestones) from the in-process event bus.
pub(super) async fn handler_api_notifications(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NotificationsQuery>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(20).min(50);
    Json(serde_json::json!({
        "notifications": state.event_bus.recent_notifications(limit),
    }))
}
