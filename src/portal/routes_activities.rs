//! # Activity Ledger REST API
//!
//! Ledger writes funnel through here: validation happens before persistence
//! (a rejected insert is never partially applied), and every successful
//! mutation — insert, admin edit, admin delete — triggers a full recompute of
//! the owning participant's derived state. Edits are semantically
//! delete + reinsert; caches are never patched incrementally.

use super::AppState;
use crate::ledger::NewActivity;
use crate::prom_metrics::RewardLabel;
use crate::recompute;
use crate::{effective_points, events};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

/// `GET /api/participants/{id}/activities` — the participant's ledger,
/// newest first.
pub(super) async fn handler_api_activities_list(
    State(state): State<Arc<AppState>>,
    Path(id): Path<uuid::Uuid>,
) -> impl IntoResponse {
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
    match state.db.list_activities(id).await {
        Ok(rows) => Json(serde_json::json!({ "activities": rows })).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

/// `POST /api/activities` — append a scored event to the ledger.
///
/// 422 with field-specific guidance on validation failure; 404 for an
/// unknown participant; 201 with the stored row otherwise.
pub(super) async fn handler_api_activity_create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewActivity>,
) -> impl IntoResponse {
    let activity = match req.validate() {
        Ok(a) => a,
        Err(e) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response()
        }
    };

    let participant = match state.db.get_participant(activity.participant_id).await {
        Ok(Some(p)) => p,
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

    let row = match state.db.insert_activity(&activity).await {
        Ok(row) => row,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response()
        }
    };

    state
        .prom_metrics
        .activities_logged
        .get_or_create(&RewardLabel {
            reward_type: activity.reward_type.as_str().to_string(),
        })
        .inc();
    state.event_bus.emit(events::Event::ActivityLogged {
        participant: participant.full_name,
        reward_type: activity.reward_type.as_str().to_string(),
        subtype: activity.subtype.clone(),
        points_effective: effective_points(activity.points, activity.multiplier),
    });

    match recompute_after_mutation(&state, activity.participant_id).await {
        Ok(()) => (StatusCode::CREATED, Json(serde_json::json!(row))).into_response(),
        Err(resp) => resp,
    }
}

/// `PUT /api/activities/{id}` — admin correction of a ledger row.
pub(super) async fn handler_api_activity_update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<NewActivity>,
) -> impl IntoResponse {
    let activity = match req.validate() {
        Ok(a) => a,
        Err(e) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response()
        }
    };

    // the row keeps its original owner; reassignment is not a correction
    let existing = match state.db.get_activity(id).await {
        Ok(Some(row)) => row,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"error": "activity not found"})),
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
    if existing.participant_id != activity.participant_id {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"error": "participant_id of a ledger row cannot change"})),
        )
            .into_response();
    }

    let row = match state.db.update_activity(id, &activity).await {
        Ok(Some(row)) => row,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"error": "activity not found"})),
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

    match recompute_after_mutation(&state, row.participant_id).await {
        Ok(()) => Json(serde_json::json!(row)).into_response(),
        Err(resp) => resp,
    }
}

/// `DELETE /api/activities/{id}` — admin removal of a ledger row.
pub(super) async fn handler_api_activity_delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let participant_id = match state.db.delete_activity(id).await {
        Ok(Some(pid)) => pid,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"error": "activity not found"})),
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

    match recompute_after_mutation(&state, participant_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(resp) => resp,
    }
}

/// Run the full recompute that every ledger mutation requires.
async fn recompute_after_mutation(
    state: &Arc<AppState>,
    participant_id: uuid::Uuid,
) -> Result<(), axum::response::Response> {
    match recompute::recompute_participant(
        &state.db,
        participant_id,
        Some(&state.event_bus),
        Some(&state.prom_metrics),
    )
    .await
    {
        Ok(_) => Ok(()),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response()),
    }
}
