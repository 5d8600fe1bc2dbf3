//! # Stream REST API
//!
//! Cohort listing, creation, and the current-stream swap. The swap is a
//! single transactional clear-all-then-set-one in the db layer, so two
//! racing admins cannot leave two streams marked current.

use super::AppState;
use crate::events;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;

/// `GET /api/streams` — all streams with the current marker.
pub(super) async fn handler_api_streams_list(
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    match state.db.get_streams().await {
        Ok(rows) => Json(serde_json::json!({ "streams": rows })).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
pub(super) struct CreateStreamRequest {
    name: String,
    starts_on: NaiveDate,
    ends_on: NaiveDate,
}

/// `POST /api/streams` — create a cohort (not current until explicitly set).
pub(super) async fn handler_api_streams_create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateStreamRequest>,
) -> impl IntoResponse {
    if req.name.trim().is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"error": "name must not be empty"})),
        )
            .into_response();
    }
    if req.ends_on < req.starts_on {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"error": "ends_on must not precede starts_on"})),
        )
            .into_response();
    }
    match state
        .db
        .create_stream(req.name.trim(), req.starts_on, req.ends_on)
        .await
    {
        Ok(row) => (StatusCode::CREATED, Json(serde_json::json!(row))).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

/// `POST /api/streams/{id}/set-current` — transactional current-stream swap.
pub(super) async fn handler_api_stream_set_current(
    State(state): State<Arc<AppState>>,
    Path(id): Path<uuid::Uuid>,
) -> impl IntoResponse {
    match state.db.set_current_stream(id).await {
        Ok(true) => {
            state.event_bus.emit(events::Event::Milestone {
                message: format!("current stream switched to {id}"),
            });
            Json(serde_json::json!({"current": id})).into_response()
        }
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "stream not found"})),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}
