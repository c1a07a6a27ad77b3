//! Error taxonomy for the debate arena.
//!
//! Every fallible operation in the crate returns [`ArenaError`]. The variants
//! map one-to-one onto HTTP responses at the delivery layer; no variant is
//! process-fatal — a failure only affects the request or session in progress.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::time::Duration;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ArenaError>;

/// All errors surfaced by the arena.
#[derive(Debug, Error)]
pub enum ArenaError {
    /// Bad request shape or values — user-fixable, returned with explanation.
    #[error("{0}")]
    Validation(String),

    /// Debate session id does not exist in the session table.
    #[error("debate session '{0}' not found")]
    SessionNotFound(String),

    /// Turn advance attempted on a finished session.
    #[error("debate session '{0}' is already completed")]
    SessionCompleted(String),

    /// Persona id unknown to both the built-in roster and the custom store.
    #[error("persona '{0}' not found")]
    PersonaNotFound(String),

    /// Custom persona's backing topic could not be validated externally.
    #[error("{0}")]
    PersonaValidation(String),

    /// The hosted LLM call failed; surfaced to the user as "try again".
    #[error("upstream agent call failed: {0}")]
    UpstreamAgent(String),

    /// The hosted LLM call exceeded the configured deadline.
    #[error("upstream agent call timed out after {}s", .0.as_secs())]
    UpstreamTimeout(Duration),

    /// Judge response was malformed; scoring reported as unavailable.
    #[error("judge evaluation failed: {0}")]
    Evaluation(String),

    /// Persona store I/O failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl ArenaError {
    /// Stable machine-readable kind for response bodies and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::SessionNotFound(_) => "session_not_found",
            Self::SessionCompleted(_) => "session_completed",
            Self::PersonaNotFound(_) => "persona_not_found",
            Self::PersonaValidation(_) => "persona_validation_error",
            Self::UpstreamAgent(_) => "upstream_agent_error",
            Self::UpstreamTimeout(_) => "upstream_timeout",
            Self::Evaluation(_) => "evaluation_error",
            Self::Storage(_) => "storage_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::SessionNotFound(_) | Self::PersonaNotFound(_) => StatusCode::NOT_FOUND,
            Self::SessionCompleted(_) => StatusCode::CONFLICT,
            Self::PersonaValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::UpstreamAgent(_) | Self::UpstreamTimeout(_) | Self::Evaluation(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ArenaError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        let body = serde_json::json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
