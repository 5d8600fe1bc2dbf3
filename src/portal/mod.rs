//! # Portal — Member-Facing Web Server
//!
//! Runs an Axum HTTP server that exposes the REST API the landing page and
//! member portal consume: leaderboard, participant progress, activity
//! logging, totem and stream management, plus health probes, Prometheus
//! metrics, and a WebSocket for live leaderboard/notification pushes.
//!
//! Handlers contain no business logic: writes validate through the ledger
//! module, then hand off to the recompute pipeline; reads serve the
//! evaluator's output as pure display data.

mod routes_activities;
mod routes_health;
mod routes_participants;
mod routes_streams;
mod routes_totems;
mod websocket;

use crate::{db, events, prom_metrics, recompute};
use anyhow::Result;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::routing::{get, post, put};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Instrument};

pub struct AppState {
    pub db: db::Database,
    pub event_bus: events::EventBus,
    pub prom_metrics: prom_metrics::Metrics,
    pub hostname: String,
}

impl AppState {
    pub fn with_db(db: db::Database) -> Arc<Self> {
        Arc::new(AppState {
            db,
            event_bus: events::EventBus::new(),
            prom_metrics: prom_metrics::Metrics::new(),
            hostname: gethostname(),
        })
    }
}

pub(super) fn gethostname() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("HOST"))
        .or_else(|_| sysinfo::System::host_name().ok_or(std::env::VarError::NotPresent))
        .unwrap_or_else(|_| "unknown".to_string())
}

async fn metrics_middleware(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> axum::response::Response {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let method = req.method().to_string();
    let raw_path = req.uri().path().to_string();
    let norm_path = normalize_path(&raw_path);
    let start = std::time::Instant::now();

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %raw_path,
    );
    let response = next.run(req).instrument(span).await;

    let duration = start.elapsed().as_secs_f64();
    state
        .prom_metrics
        .http_request_duration
        .get_or_create(&prom_metrics::HttpLabel {
            method,
            path: norm_path,
        })
        .observe(duration);

    let mut response = response;
    response
        .headers_mut()
        .insert("x-request-id", request_id.parse().unwrap());
    response
}

/// Normalize URL path to collapse high-cardinality segments (UUIDs, numeric
/// IDs) into placeholders, preventing histogram label explosion.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|seg| {
            if seg.is_empty() {
                seg.to_string()
            } else if seg.chars().all(|c| c.is_ascii_digit()) {
                ":id".to_string()
            } else if seg.len() == 36 && seg.chars().filter(|c| *c == '-').count() == 4 {
                ":uuid".to_string()
            } else {
                seg.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(websocket::handler_ws))
        .route(
            "/api/leaderboard",
            get(routes_participants::handler_api_leaderboard),
        )
        .route(
            "/api/participants",
            get(routes_participants::handler_api_participants_list)
                .post(routes_participants::handler_api_participants_register),
        )
        .route(
            "/api/participants/{id}",
            get(routes_participants::handler_api_participant_get)
                .delete(routes_participants::handler_api_participant_delete),
        )
        .route(
            "/api/participants/{id}/progress",
            get(routes_participants::handler_api_participant_progress),
        )
        .route(
            "/api/participants/{id}/activities",
            get(routes_activities::handler_api_activities_list),
        )
        .route(
            "/api/participants/{id}/badges",
            get(routes_totems::handler_api_badges_list)
                .post(routes_totems::handler_api_badge_grant),
        )
        .route(
            "/api/activities",
            post(routes_activities::handler_api_activity_create),
        )
        .route(
            "/api/activities/{id}",
            put(routes_activities::handler_api_activity_update)
                .delete(routes_activities::handler_api_activity_delete),
        )
        .route("/api/totems", get(routes_totems::handler_api_totems_list))
        .route(
            "/api/totems/grant",
            post(routes_totems::handler_api_totem_grant),
        )
        .route(
            "/api/directions",
            get(routes_participants::handler_api_directions_list),
        )
        .route(
            "/api/streams",
            get(routes_streams::handler_api_streams_list)
                .post(routes_streams::handler_api_streams_create),
        )
        .route(
            "/api/streams/{id}/set-current",
            post(routes_streams::handler_api_stream_set_current),
        )
        .route(
            "/api/notifications",
            get(routes_health::handler_api_notifications),
        )
        .route("/healthz", get(routes_health::handler_healthz))
        .route("/readyz", get(routes_health::handler_readyz))
        .route("/metrics", get(routes_health::handler_metrics))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(CatchPanicLayer::new())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(1024 * 1024))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .with_state(state)
}

pub async fn run(port: u16, database_url: &str) -> Result<()> {
    let database = db::Database::connect(database_url).await?;
    let (ws_tx, _) = tokio::sync::broadcast::channel::<String>(256);
    let state = AppState::with_db(database);
    state.event_bus.set_ws_sender(ws_tx.clone());
    let app = build_router(state.clone());

    // Background task: refresh gauges and reconcile derived state drift
    let gauge_state = Arc::clone(&state);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        let mut last_sweep = std::time::Instant::now();
        loop {
            interval.tick().await;
            match gauge_state.db.count_current_stream_participants().await {
                Ok(n) => gauge_state.prom_metrics.participants_registered.set(n),
                Err(e) => {
                    warn!(error = %e, "failed to refresh participant gauge");
                    continue;
                }
            };
            // Hourly safety-net sweep: cached totals must always agree with a
            // full recompute from the ledger.
            if last_sweep.elapsed() >= Duration::from_secs(3600) {
                last_sweep = std::time::Instant::now();
                match recompute::recompute_all(
                    &gauge_state.db,
                    Some(&gauge_state.event_bus),
                    Some(&gauge_state.prom_metrics),
                )
                .await
                {
                    Ok(n) => info!(participants = n, "hourly recompute sweep complete"),
                    Err(e) => warn!(error = %e, "hourly recompute sweep failed"),
                }
            }
        }
    });

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!(port, hostname = %state.hostname, "portal running");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("portal shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! { _ = ctrl_c => info!("received SIGINT, shutting down"), _ = sigterm.recv() => info!("received SIGTERM, shutting down") }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("received SIGINT, shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_path_preserves_api_routes() {
        assert_eq!(normalize_path("/api/leaderboard"), "/api/leaderboard");
        assert_eq!(normalize_path("/healthz"), "/healthz");
    }

    #[test]
    fn normalize_path_collapses_numeric_ids() {
        assert_eq!(normalize_path("/api/activities/42"), "/api/activities/:id");
    }

    #[test]
    fn normalize_path_collapses_uuids() {
        assert_eq!(
            normalize_path("/api/participants/2f1b4f6e-9a1d-4c3e-8f7a-1b2c3d4e5f6a/progress"),
            "/api/participants/:uuid/progress"
        );
    }
}
