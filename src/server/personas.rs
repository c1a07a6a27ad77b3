//! Persona REST handlers.

use super::AppState;
use crate::error::Result;
use crate::personas::{CreateCustomPersona, Persona};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

/// GET /api/v1/personas -- built-in roster plus custom figures.
pub async fn list_personas(State(state): State<AppState>) -> Json<Vec<Persona>> {
    Json(state.registry.list())
}

/// POST /api/v1/personas/custom -- create a custom persona.
///
/// Slow call: validates the topic on Wikipedia and builds the retrieval
/// context before returning.
pub async fn create_custom_persona(
    State(state): State<AppState>,
    Json(req): Json<CreateCustomPersona>,
) -> Result<impl IntoResponse> {
    let persona = state.registry.create_custom(req).await?;
    Ok((StatusCode::CREATED, Json(persona)))
}

/// DELETE /api/v1/personas/custom/{id}
pub async fn delete_custom_persona(
    State(state): State<AppState>,
    Path(persona_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    state.registry.delete_custom(&persona_id)?;
    Ok(Json(serde_json::json!({
        "message": format!("Custom persona '{}' deleted successfully", persona_id)
    })))
}
