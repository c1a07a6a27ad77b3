//! Live update channels.
//!
//! Every session gets one broadcast channel; the SSE and WebSocket transports
//! both subscribe to it and deliver identical payloads. Delivery is
//! best-effort, at-most-once: lagging receivers lose events, and publishing to
//! a channel with no subscribers simply drops the event. A dropped connection
//! never pauses the producing turn loop.

use crate::judge::ExchangeEvaluation;
use crate::orchestrator::session::DebateMessage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::broadcast;

/// Per-session channel capacity. Slow consumers past this many undelivered
/// events start losing the oldest ones.
const CHANNEL_CAPACITY: usize = 64;

/// Event shapes shared by both live transports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    /// A new debate message was appended.
    Message { message: DebateMessage },
    /// An exchange evaluation arrived (asynchronously to the turn).
    Evaluation {
        session_id: String,
        evaluation: ExchangeEvaluation,
    },
    /// Progress note, e.g. "Debate starting".
    Status { session_id: String, message: String },
    /// An upstream failure ended the stream; prior messages remain.
    Error { session_id: String, message: String },
    /// The debate ran to completion.
    Complete { session_id: String, message: String },
}

impl LiveEvent {
    /// Whether the event terminates a live stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::Complete { .. })
    }
}

/// Registry of per-session broadcast channels.
#[derive(Default)]
pub struct LiveHub {
    channels: RwLock<HashMap<String, broadcast::Sender<LiveEvent>>>,
}

impl LiveHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, session_id: &str) -> broadcast::Sender<LiveEvent> {
        if let Some(tx) = self
            .channels
            .read()
            .expect("live hub lock poisoned")
            .get(session_id)
        {
            return tx.clone();
        }
        let mut channels = self.channels.write().expect("live hub lock poisoned");
        channels
            .entry(session_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Subscribe to a session's events.
    pub fn subscribe(&self, session_id: &str) -> broadcast::Receiver<LiveEvent> {
        self.sender(session_id).subscribe()
    }

    /// Publish an event. No subscribers is fine — delivery is best-effort.
    pub fn publish(&self, session_id: &str, event: LiveEvent) {
        let _ = self.sender(session_id).send(event);
    }

    /// Drop a session's channel (on session delete).
    pub fn remove(&self, session_id: &str) {
        self.channels
            .write()
            .expect("live hub lock poisoned")
            .remove(session_id);
    }
}
