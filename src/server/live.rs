//! Live update transports: SSE and WebSocket.
//!
//! Both endpoints subscribe to the same per-session broadcast channel and
//! deliver identical [`LiveEvent`] payloads. Delivery is best-effort: a
//! lagging consumer loses the oldest events, and a dropped connection never
//! pauses the underlying turn progression.

use super::AppState;
use crate::error::ArenaError;
use crate::live::LiveEvent;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// Turn a broadcast receiver into an SSE response. The stream ends after a
/// terminal event (`complete` or `error`) or when the channel closes.
pub fn sse_response(
    rx: broadcast::Receiver<LiveEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = stream::unfold((rx, false), |(mut rx, done)| async move {
        if done {
            return None;
        }
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let terminal = event.is_terminal();
                    let data = serde_json::to_string(&event).unwrap_or_default();
                    return Some((
                        Ok::<_, Infallible>(Event::default().data(data)),
                        (rx, terminal),
                    ));
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("SSE consumer lagged, {} events lost", skipped);
                    continue;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// GET /api/v1/debates/{id}/live -- SSE event stream.
pub async fn sse_live(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ArenaError> {
    let rx = state.orchestrator.subscribe(&session_id).await?;
    Ok(sse_response(rx))
}

/// GET /ws/debates/{id} -- WebSocket event stream.
pub async fn ws_live(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, session_id: String) {
    let mut rx = match state.orchestrator.subscribe(&session_id).await {
        Ok(rx) => rx,
        Err(e) => {
            let event = LiveEvent::Error {
                session_id: session_id.clone(),
                message: e.to_string(),
            };
            let _ = send_event(&mut socket, &event).await;
            let _ = socket.send(WsMessage::Close(None)).await;
            return;
        }
    };
    tracing::info!("WebSocket connected for session: {}", session_id);

    let connected = LiveEvent::Status {
        session_id: session_id.clone(),
        message: "Connected to debate session".to_string(),
    };
    if send_event(&mut socket, &connected).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    let terminal = event.is_terminal();
                    if send_event(&mut socket, &event).await.is_err() {
                        break;
                    }
                    if terminal {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("WebSocket consumer lagged, {} events lost", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                // Ignore client chatter; receiving keeps disconnects visible
                Some(Ok(_)) => {}
                // Client went away — the debate continues server-side
                Some(Err(_)) | None => break,
            },
        }
    }
    tracing::info!("WebSocket disconnected for session: {}", session_id);
}

async fn send_event(
    socket: &mut WebSocket,
    event: &LiveEvent,
) -> std::result::Result<(), axum::Error> {
    let data = serde_json::to_string(event).unwrap_or_default();
    socket.send(WsMessage::Text(data.into())).await
}
