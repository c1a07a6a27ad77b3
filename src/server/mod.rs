//! HTTP delivery layer powered by axum.
//!
//! Serves:
//! - `GET  /health`                        — health check
//! - `POST /api/v1/debates`                — create a session
//! - `GET  /api/v1/debates`                — list sessions
//! - `GET  /api/v1/debates/{id}`           — session detail
//! - `DELETE /api/v1/debates/{id}`         — delete a session
//! - `POST /api/v1/debates/{id}/start`     — moderator-opening flow (SSE)
//! - `POST /api/v1/debates/{id}/message`   — user-vs-persona exchange
//! - `POST /api/v1/debates/{id}/next`      — next persona-vs-persona turn
//! - `POST /api/v1/debates/{id}/evaluate`  — score one exchange
//! - `GET  /api/v1/debates/{id}/scores`    — cumulative scores
//! - `GET  /api/v1/debates/{id}/live`      — SSE live channel
//! - `GET  /ws/debates/{id}`               — WebSocket live channel
//! - `GET  /api/v1/personas`               — built-in + custom personas
//! - `POST /api/v1/personas/custom`        — create a custom persona
//! - `DELETE /api/v1/personas/custom/{id}` — delete a custom persona
//! - `GET  /audio/*`                       — cached speech audio (when enabled)

pub mod debates;
pub mod live;
pub mod personas;

use crate::agent::{AgentClient, OpenAiCompatBackend};
use crate::config::Config;
use crate::judge::JudgeService;
use crate::live::LiveHub;
use crate::orchestrator::Orchestrator;
use crate::personas::PersonaRegistry;
use crate::personas::factory::WikipediaClient;
use crate::personas::store::CustomPersonaStore;
use crate::speech::SpeechSynthesizer;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub registry: Arc<PersonaRegistry>,
    pub judge: Arc<JudgeService>,
}

/// Build the axum router.
pub fn build_router(
    state: AppState,
    allowed_origins: &[String],
    audio_dir: Option<&Path>,
) -> Router {
    let cors = if allowed_origins.is_empty() {
        CorsLayer::new()
    } else {
        let origins: Vec<_> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let mut router = Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/v1/debates",
            post(debates::create_debate).get(debates::list_debates),
        )
        .route(
            "/api/v1/debates/{id}",
            get(debates::get_debate).delete(debates::delete_debate),
        )
        .route("/api/v1/debates/{id}/start", post(debates::start_debate))
        .route("/api/v1/debates/{id}/message", post(debates::send_user_message))
        .route("/api/v1/debates/{id}/next", post(debates::next_turn))
        .route("/api/v1/debates/{id}/evaluate", post(debates::evaluate_exchange))
        .route("/api/v1/debates/{id}/scores", get(debates::cumulative_scores))
        .route("/api/v1/debates/{id}/live", get(live::sse_live))
        .route("/ws/debates/{id}", get(live::ws_live))
        .route("/api/v1/personas", get(personas::list_personas))
        .route("/api/v1/personas/custom", post(personas::create_custom_persona))
        .route(
            "/api/v1/personas/custom/{id}",
            delete(personas::delete_custom_persona),
        );

    if let Some(dir) = audio_dir {
        router = router.nest_service("/audio", ServeDir::new(dir));
    }

    router.layer(cors).with_state(state)
}

/// Wire every component from the configuration and serve until shutdown.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let store = CustomPersonaStore::open(&config.storage.data_dir)?;
    let wiki = WikipediaClient::new(&config.agent.wikipedia_api);
    let registry = Arc::new(PersonaRegistry::new(store, wiki));

    let backend = Arc::new(OpenAiCompatBackend::new(&config.agent));
    let agent = Arc::new(AgentClient::new(backend, config.agent.request_timeout()));
    let judge = Arc::new(JudgeService::new(Arc::clone(&agent)));
    let speech = Arc::new(SpeechSynthesizer::new(
        &config.speech,
        &config.storage.data_dir,
    ));
    let live = Arc::new(LiveHub::new());

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&registry),
        agent,
        Arc::clone(&judge),
        Arc::clone(&speech),
        live,
    ));

    let state = AppState {
        orchestrator,
        registry,
        judge,
    };
    let app = build_router(state, &config.server.allowed_origins, speech.audio_dir());

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid server address: {}", e))?;

    tracing::info!("DebateIQ API starting on http://{}", addr);
    tracing::info!("   Debates:  http://{}/api/v1/debates", addr);
    tracing::info!("   Personas: http://{}/api/v1/personas", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// GET /health — health check.
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "debateiq",
        "version": crate::VERSION,
    }))
}
