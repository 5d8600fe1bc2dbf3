//! WebSocket handler — pushes leaderboard snapshots every 5 seconds and
//! forwards event-bus notifications (totem awards, milestones) as they occur.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use std::sync::Arc;
use std::time::Duration;

use super::AppState;

pub(super) async fn handler_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let notif_rx = state.event_bus.subscribe_ws();
    ws.on_upgrade(|socket| ws_loop(socket, state, notif_rx))
}

async fn ws_loop(
    mut socket: WebSocket,
    state: Arc<AppState>,
    notif_rx: Option<tokio::sync::broadcast::Receiver<String>>,
) {
    let Some(mut notif_rx) = notif_rx else {
        // no broadcast sender installed; nothing to serve
        return;
    };

    if let Some(msg) = build_update(&state).await {
        if socket.send(Message::Text(msg.into())).await.is_err() {
            return;
        }
    }

    let mut interval = tokio::time::interval(Duration::from_secs(5));
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Some(msg) = build_update(&state).await {
                    if socket.send(Message::Text(msg.into())).await.is_err() {
                        break;
                    }
                }
            }
            result = notif_rx.recv() => {
                match result {
                    Ok(msg) => {
                        if socket.send(Message::Text(msg.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                    Err(_) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
        }
    }
}

pub(super) async fn build_update(state: &Arc<AppState>) -> Option<String> {
    let leaderboard = state.db.leaderboard(50).await.unwrap_or_default();
    let current_stream = state.db.get_current_stream().await.unwrap_or(None);
    let recent_notifications = state.event_bus.recent_notifications(20);
    serde_json::to_string(&serde_json::json!({
        "type": "update",
        "leaderboard": leaderboard,
        "current_stream": current_stream,
        "notifications": recent_notifications,
    }))
    .ok()
}
