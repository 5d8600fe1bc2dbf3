//! # Events — Structured Event Bus for Program Activity
//!
//! A bounded, thread-safe event log that collects structured events from the
//! ledger and recompute pipeline and turns them into notifications for the
//! member portal frontend.
//!
//! ## Event Types
//!
//! | Variant | Emitted When |
//! |---------|-------------|
//! | `ActivityLogged` | A validated activity is appended to the ledger |
//! | `TotemEarned` | A totem grant row is created for a participant |
//! | `Milestone` | Notable progress (e.g., stream switch, recompute sweep done) |
//! | `Warning` | Non-fatal issues (e.g., unrecognized subtype in the ledger) |
//!
//! ## Delivery
//!
//! Events are stored in a `VecDeque` (bounded to prevent unbounded growth)
//! and converted to `Notification` structs for WebSocket delivery to the
//! portal frontend. Each notification gets a monotonic `id` for deduplication.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;
use tracing::{info, warn};

/// Events emitted by the ledger and recompute pipeline.
#[derive(Clone, Debug)]
pub enum Event {
    ActivityLogged {
        participant: String,
        reward_type: String,
        subtype: Option<String>,
        points_effective: i64,
    },
    TotemEarned {
        participant: String,
        totem_type: String,
        totem_name: String,
    },
    Milestone {
        message: String,
    },
    Warning {
        context: String,
        message: String,
    },
}

/// A notification ready for delivery to the frontend.
#[derive(Clone, Debug, Serialize)]
pub struct Notification {
    pub id: u64,
    pub kind: String,
    pub title: String,
    pub details: Vec<String>,
    pub timestamp_ms: u64,
}

/// A squashed record kept for the recent-events listing.
#[derive(Clone, Debug, Serialize)]
pub struct EventRecord {
    pub kind: String,
    pub message: String,
    pub elapsed_secs: f64,
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

const RECENT_EVENTS_CAP: usize = 200;
const NOTIFICATIONS_CAP: usize = 50;

/// Central event bus: the ledger and evaluator emit events, the bus handles
/// logging, buffering, and broadcasting notifications via WebSocket.
pub struct EventBus {
    recent: Mutex<VecDeque<EventRecord>>,
    notifications: Mutex<VecDeque<Notification>>,
    next_id: AtomicU64,
    ws_sender: Mutex<Option<tokio::sync::broadcast::Sender<String>>>,
    start: Instant,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        EventBus {
            recent: Mutex::new(VecDeque::with_capacity(RECENT_EVENTS_CAP)),
            notifications: Mutex::new(VecDeque::with_capacity(NOTIFICATIONS_CAP)),
            next_id: AtomicU64::new(1),
            ws_sender: Mutex::new(None),
            start: Instant::now(),
        }
    }

    /// Set the broadcast sender for WebSocket delivery.
    pub fn set_ws_sender(&self, sender: tokio::sync::broadcast::Sender<String>) {
        *self.ws_sender.lock().unwrap() = Some(sender);
    }

    /// Subscribe to notification broadcasts (one receiver per WS client).
    ///
    /// Returns `None` before `set_ws_sender` has run (CLI contexts).
    pub fn subscribe_ws(&self) -> Option<tokio::sync::broadcast::Receiver<String>> {
        self.ws_sender
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| s.subscribe())
    }

    /// Emit an event. Synchronous and safe from any thread.
    pub fn emit(&self, event: Event) {
        let elapsed = self.start.elapsed().as_secs_f64();

        match &event {
            Event::ActivityLogged {
                participant,
                reward_type,
                subtype,
                points_effective,
            } => {
                info!(
                    participant,
                    reward_type,
                    subtype = subtype.as_deref().unwrap_or("-"),
                    points = points_effective,
                    "activity logged"
                );
                self.push_record(
                    "activity",
                    &format!(
                        "{} {}{} +{}",
                        participant,
                        reward_type,
                        subtype
                            .as_deref()
                            .map(|s| format!("/{s}"))
                            .unwrap_or_default(),
                        points_effective
                    ),
                    elapsed,
                );
            }
            Event::TotemEarned {
                participant,
                totem_type,
                totem_name,
            } => {
                info!(participant, totem_type, "totem earned");
                self.push_record(
                    "totem",
                    &format!("{} earned {}", participant, totem_name),
                    elapsed,
                );
                self.broadcast_notification(Notification {
                    id: self.next_id.fetch_add(1, Ordering::Relaxed),
                    kind: "totem".into(),
                    title: format!("Totem earned: {}", totem_name),
                    details: vec![participant.clone(), totem_type.clone()],
                    timestamp_ms: now_ms(),
                });
            }
            Event::Milestone { message } => {
                info!(message, "milestone");
                self.push_record("milestone", message, elapsed);
                self.broadcast_notification(Notification {
                    id: self.next_id.fetch_add(1, Ordering::Relaxed),
                    kind: "milestone".into(),
                    title: message.clone(),
                    details: vec![],
                    timestamp_ms: now_ms(),
                });
            }
            Event::Warning { context, message } => {
                warn!(context, message, "warning event");
                self.push_record("warning", &format!("{}: {}", context, message), elapsed);
            }
        }
    }

    fn push_record(&self, kind: &str, message: &str, elapsed_secs: f64) {
        let mut recent = self.recent.lock().unwrap();
        if recent.len() >= RECENT_EVENTS_CAP {
            recent.pop_front();
        }
        recent.push_back(EventRecord {
            kind: kind.to_string(),
            message: message.to_string(),
            elapsed_secs,
        });
    }

    fn broadcast_notification(&self, notification: Notification) {
        if let Some(sender) = self.ws_sender.lock().unwrap().as_ref() {
            if let Ok(payload) = serde_json::to_string(&serde_json::json!({
                "type": "notification",
                "notification": notification,
            })) {
                let _ = sender.send(payload);
            }
        }
        let mut notifications = self.notifications.lock().unwrap();
        if notifications.len() >= NOTIFICATIONS_CAP {
            notifications.pop_front();
        }
        notifications.push_back(notification);
    }

    /// Most recent `n` notifications, newest last.
    pub fn recent_notifications(&self, n: usize) -> Vec<Notification> {
        let notifications = self.notifications.lock().unwrap();
        notifications
            .iter()
            .rev()
            .take(n)
            .rev()
            .cloned()
            .collect()
    }

    /// Most recent `n` event records, newest last.
    pub fn recent_events(&self, n: usize) -> Vec<EventRecord> {
        let recent = self.recent.lock().unwrap();
        recent.iter().rev().take(n).rev().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totem_event_produces_notification() {
        let bus = EventBus::new();
        bus.emit(Event::TotemEarned {
            participant: "Ivan".into(),
            totem_type: "snake".into(),
            totem_name: "Змея".into(),
        });
        let notifications = bus.recent_notifications(10);
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, "totem");
        assert!(notifications[0].title.contains("Змея"));
    }

    #[test]
    fn activity_events_recorded_but_not_broadcast() {
        // routine activity logging should not spam frontend notifications
        let bus = EventBus::new();
        bus.emit(Event::ActivityLogged {
            participant: "Ivan".into(),
            reward_type: "zakal".into(),
            subtype: Some("bjj".into()),
            points_effective: 1,
        });
        assert_eq!(bus.recent_events(10).len(), 1);
        assert!(bus.recent_notifications(10).is_empty());
    }

    #[test]
    fn notification_ids_are_monotonic() {
        let bus = EventBus::new();
        for i in 0..3 {
            bus.emit(Event::Milestone {
                message: format!("m{i}"),
            });
        }
        let ids: Vec<u64> = bus.recent_notifications(10).iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn recent_buffer_is_bounded() {
        let bus = EventBus::new();
        for i in 0..(RECENT_EVENTS_CAP + 20) {
            bus.emit(Event::Warning {
                context: "test".into(),
                message: format!("w{i}"),
            });
        }
        assert_eq!(bus.recent_events(usize::MAX).len(), RECENT_EVENTS_CAP);
    }
}
