//! Debate REST handlers.

use super::{AppState, live};
use crate::error::{ArenaError, Result};
use crate::judge::{CumulativeScores, ExchangeEvaluation};
use crate::orchestrator::exchange_context;
use crate::orchestrator::session::{
    DebateMessage, DebateMode, DebateSession, SessionSummary, SpeakerRole,
};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

const DEFAULT_MAX_TURNS: u32 = 10;

#[derive(Debug, Deserialize)]
pub struct CreateDebateRequest {
    pub topic: String,
    pub participants: Vec<String>,
    #[serde(default)]
    pub max_turns: Option<u32>,
    /// Omitted mode is inferred from the participant count.
    #[serde(default)]
    pub mode: Option<DebateMode>,
}

#[derive(Debug, Deserialize)]
pub struct UserMessageRequest {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct EvaluateRequest {
    #[serde(default)]
    pub user_argument: Option<String>,
    #[serde(default)]
    pub ai_argument: Option<String>,
}

/// One completed user-vs-persona exchange.
#[derive(Debug, Serialize)]
pub struct ExchangeResponse {
    pub user_message: DebateMessage,
    pub ai_message: DebateMessage,
}

/// POST /api/v1/debates -- create a debate session.
pub async fn create_debate(
    State(state): State<AppState>,
    Json(req): Json<CreateDebateRequest>,
) -> Result<impl IntoResponse> {
    let mode = req.mode.unwrap_or(if req.participants.len() == 2 {
        DebateMode::PersonaVsPersona
    } else {
        DebateMode::UserVsPersona
    });
    let session = state
        .orchestrator
        .create_session(
            &req.topic,
            req.participants,
            req.max_turns.unwrap_or(DEFAULT_MAX_TURNS),
            mode,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /api/v1/debates/{id}
pub async fn get_debate(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<DebateSession>> {
    Ok(Json(state.orchestrator.get_session(&session_id).await?))
}

/// GET /api/v1/debates
pub async fn list_debates(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.orchestrator.list_sessions().await)
}

/// DELETE /api/v1/debates/{id}
pub async fn delete_debate(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    state.orchestrator.delete_session(&session_id).await?;
    Ok(Json(serde_json::json!({
        "message": "Debate session deleted successfully"
    })))
}

/// POST /api/v1/debates/{id}/start -- begin the moderator-opening flow and
/// stream events back over SSE.
pub async fn start_debate(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse> {
    let rx = state.orchestrator.start_streaming(&session_id).await?;
    Ok(live::sse_response(rx))
}

/// POST /api/v1/debates/{id}/message -- user-vs-persona exchange.
pub async fn send_user_message(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<UserMessageRequest>,
) -> Result<Json<ExchangeResponse>> {
    let (user_message, ai_message) = state
        .orchestrator
        .advance_turn_user(&session_id, &req.content)
        .await?;
    Ok(Json(ExchangeResponse {
        user_message,
        ai_message,
    }))
}

/// POST /api/v1/debates/{id}/next -- generate the next persona-vs-persona turn.
pub async fn next_turn(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<DebateMessage>> {
    Ok(Json(state.orchestrator.advance_turn_auto(&session_id).await?))
}

/// POST /api/v1/debates/{id}/evaluate -- score one exchange. With no explicit
/// arguments in the body, the session's most recent exchange is evaluated.
pub async fn evaluate_exchange(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<EvaluateRequest>,
) -> Result<Json<ExchangeEvaluation>> {
    let session = state.orchestrator.get_session(&session_id).await?;

    let (user_text, ai_text) = match (req.user_argument, req.ai_argument) {
        (Some(user), Some(ai)) => (user, ai),
        _ => last_exchange(&session).ok_or_else(|| {
            ArenaError::Validation("no completed exchange to evaluate".to_string())
        })?,
    };

    let context = exchange_context(&session.messages);
    let evaluation = state
        .judge
        .evaluate_exchange(&session_id, &session.topic, &user_text, &ai_text, &context)
        .await?;
    Ok(Json(evaluation))
}

/// GET /api/v1/debates/{id}/scores -- cumulative scores for a session.
pub async fn cumulative_scores(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<CumulativeScores>> {
    // Validate the session exists; scores themselves are derived data.
    state.orchestrator.get_session(&session_id).await?;
    Ok(Json(state.judge.cumulative(&session_id)))
}

fn last_exchange(session: &DebateSession) -> Option<(String, String)> {
    let messages = &session.messages;
    (1..messages.len()).rev().find_map(|i| {
        (messages[i].role == SpeakerRole::Participant
            && messages[i - 1].role == SpeakerRole::User)
            .then(|| (messages[i - 1].content.clone(), messages[i].content.clone()))
    })
}
