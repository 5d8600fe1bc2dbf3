//! # Participant REST API
//!
//! Registration, lookup, the landing-page leaderboard, and the combined
//! progress endpoint that bundles aggregates, per-totem status, and direction
//! completion into one response — pure display data, no business logic
//! permitted downstream of it.

use super::AppState;
use crate::recompute;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

/// `GET /api/leaderboard?limit=50` — points-ordered participants of the
/// current stream with totem counts.
pub(super) async fn handler_api_leaderboard(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LeaderboardQuery>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    match state.db.leaderboard(limit).await {
        Ok(rows) => Json(serde_json::json!({ "leaderboard": rows })).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
pub(super) struct LeaderboardQuery {
    limit: Option<i64>,
}

#[derive(Deserialize)]
pub(super) struct ParticipantsQuery {
    stream_id: Option<uuid::Uuid>,
}

/// `GET /api/participants?stream_id=...` — participant listing.
pub(super) async fn handler_api_participants_list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ParticipantsQuery>,
) -> impl IntoResponse {
    match state.db.list_participants(params.stream_id).await {
        Ok(rows) => Json(serde_json::json!({ "participants": rows })).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
pub(super) struct RegisterRequest {
    full_name: String,
    #[serde(default)]
    email: Option<String>,
}

/// `POST /api/participants` — register a participant into the current stream.
pub(super) async fn handler_api_participants_register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    let name = req.full_name.trim();
    if name.is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"error": "full_name must not be empty"})),
        )
            .into_response();
    }
    match state
        .db
        .register_participant(name, req.email.as_deref())
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

/// `GET /api/participants/{id}` — single participant.
pub(super) async fn handler_api_participant_get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<uuid::Uuid>,
) -> impl IntoResponse {
    match state.db.get_participant(id).await {
        Ok(Some(row)) => Json(serde_json::json!(row)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "participant not found"})),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

/// `DELETE /api/participants/{id}` — admin escape hatch; normal flow never
/// deletes a participant.
pub(super) async fn handler_api_participant_delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<uuid::Uuid>,
) -> impl IntoResponse {
    match state.db.delete_participant(id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "participant not found"})),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

/// `GET /api/participants/{id}/progress` — aggregates, per-totem status, and
/// cached direction completion in one payload.
///
/// Runs the recompute pipeline, which is idempotent: serving this read also
/// reconciles any cache drift and creates at most the grants the ledger
/// already justifies.
pub(super) async fn handler_api_participant_progress(
    State(state): State<Arc<AppState>>,
    Path(id): Path<uuid::Uuid>,
) -> impl IntoResponse {
    let outcome = match recompute::recompute_participant(
        &state.db,
        id,
        Some(&state.event_bus),
        Some(&state.prom_metrics),
    )
    .await
    {
        Ok(Some(outcome)) => outcome,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"error": "participant not found"})),
            )
                .into_response()
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response()
        }
    };

    let directions = match state.db.list_direction_progress(id).await {
        Ok(rows) => rows,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response()
        }
    };

    Json(serde_json::json!({
        "participant_id": outcome.participant_id,
        "aggregates": outcome.aggregates,
        "totems": outcome.totems,
        "directions": directions,
    }))
    .into_response()
}

/// `GET /api/directions` — the direction catalog (static reference data).
pub(super) async fn handler_api_directions_list(
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    match state.db.get_directions().await {
        Ok(rows) => Json(serde_json::json!({ "directions": rows })).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}
