//! # Totem & Special-Badge REST API
//!
//! The requirement table is static reference data; grants are append-only.
//! The admin grant endpoint is the escape hatch the evaluator does not cover
//! (e.g. honoring a paper-ledger award from before the system existed). A
//! repeated grant is not an error: the conditional insert reports the
//! existing row and the response says so.

use super::AppState;
use crate::prom_metrics::TotemLabel;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

/// `GET /api/totems` — the declarative requirement table.
pub(super) async fn handler_api_totems_list(
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    match state.db.get_totem_requirements().await {
        Ok(rows) => Json(serde_json::json!({ "totems": rows })).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
pub(super) struct GrantRequest {
    participant_id: uuid::Uuid,
    totem_type: String,
}

/// `POST /api/totems/grant` — admin grant, idempotent on
/// (participant, totem).
pub(super) async fn handler_api_totem_grant(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GrantRequest>,
) -> impl IntoResponse {
    let known = match state.db.get_totem_requirements().await {
        Ok(rows) => rows.iter().any(|r| r.totem_type == req.totem_type),
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response()
        }
    };
    if !known {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"error": format!("unknown totem type '{}'", req.totem_type)})),
        )
            .into_response();
    }

    match state.db.get_participant(req.participant_id).await {
        Ok(Some(_)) => {}
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
    }

    match state
        .db
        .grant_totem(req.participant_id, &req.totem_type)
        .await
    {
        Ok(Some(row)) => {
            state
                .prom_metrics
                .totems_granted
                .get_or_create(&TotemLabel {
                    totem_type: req.totem_type.clone(),
                })
                .inc();
            (
                StatusCode::CREATED,
                Json(serde_json::json!({"granted": true, "totem": row})),
            )
                .into_response()
        }
        Ok(None) => Json(serde_json::json!({"granted": false, "already_earned": true}))
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

/// `GET /api/participants/{id}/badges` — special badges, newest first.
pub(super) async fn handler_api_badges_list(
    State(state): State<Arc<AppState>>,
    Path(id): Path<uuid::Uuid>,
) -> impl IntoResponse {
    match state.db.list_special_badges(id).await {
        Ok(rows) => Json(serde_json::json!({ "badges": rows })).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
pub(super) struct BadgeGrantRequest {
    badge_type: String,
    #[serde(default)]
    rank_position: Option<i32>,
    #[serde(default)]
    granted_by: Option<String>,
}

/// `POST /api/participants/{id}/badges` — admin-granted discrete award.
pub(super) async fn handler_api_badge_grant(
    State(state): State<Arc<AppState>>,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<BadgeGrantRequest>,
) -> impl IntoResponse {
    if req.badge_type.trim().is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"error": "badge_type must not be empty"})),
        )
            .into_response();
    }
    match state.db.get_participant(id).await {
        Ok(Some(_)) => {}
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
    }
    match state
        .db
        .grant_special_badge(
            id,
            req.badge_type.trim(),
            req.rank_position,
            req.granted_by.as_deref(),
        )
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
