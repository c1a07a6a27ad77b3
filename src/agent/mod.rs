//! Agent adapter: the boundary call into the LLM-backed persona generator.
//!
//! [`AgentBackend`] is the transport seam — the production implementation
//! speaks the OpenAI chat completions protocol over HTTP; tests swap in a
//! scripted backend. [`AgentClient`] layers the debate-specific prompting on
//! top and bounds every call with the configured deadline. Failed calls are
//! surfaced immediately; there is no retry.

pub mod prompts;

use crate::config::AgentConfig;
use crate::error::{ArenaError, Result};
use crate::orchestrator::session::DebateMessage;
use crate::personas::Persona;
use crate::personas::factory::RetrievalContext;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Retrieval chunks injected per custom-persona reply.
const CONTEXT_CHUNKS_PER_REPLY: usize = 3;

/// A single entry in the conversation sent upstream.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Transport seam for the hosted LLM.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// One completion: system prompt plus conversation, next utterance back.
    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<String>;
}

// ─── OpenAI-compatible backend ──────────────────────────────

/// Backend for any endpoint speaking the OpenAI chat completions protocol.
pub struct OpenAiCompatBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl OpenAiCompatBackend {
    pub fn new(config: &AgentConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .pool_max_idle_per_host(2)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.as_deref().map(|k| k.trim().to_string()),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    async fn handle_error(&self, response: reqwest::Response) -> ArenaError {
        let status = response.status();
        let message = match response.json::<ApiErrorResponse>().await {
            Ok(body) => body.error.message,
            Err(_) => "unknown error".to_string(),
        };
        ArenaError::UpstreamAgent(format!("{}: {}", status, message))
    }
}

#[async_trait]
impl AgentBackend for OpenAiCompatBackend {
    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<String> {
        let mut wire = Vec::with_capacity(messages.len() + 1);
        wire.push(WireMessage {
            role: "system",
            content: system,
        });
        for msg in messages {
            wire.push(WireMessage {
                role: match msg.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                },
                content: &msg.content,
            });
        }

        tracing::debug!(
            "Agent request: model={}, messages={}",
            self.model,
            wire.len()
        );

        let mut request = self.client.post(&self.base_url).json(&ChatRequest {
            model: &self.model,
            messages: wire,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        });
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ArenaError::UpstreamAgent(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self.handle_error(response).await);
        }

        let completion: ChatResponse = response
            .json()
            .await
            .map_err(|e| ArenaError::UpstreamAgent(format!("malformed response: {}", e)))?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ArenaError::UpstreamAgent("empty completion".to_string()));
        }
        Ok(text.trim().to_string())
    }
}

// ─── Agent client ───────────────────────────────────────────

/// Debate-aware wrapper over a backend. Every call is bounded by the
/// configured deadline; expiry maps to [`ArenaError::UpstreamTimeout`].
pub struct AgentClient {
    backend: Arc<dyn AgentBackend>,
    timeout: Duration,
}

impl AgentClient {
    pub fn new(backend: Arc<dyn AgentBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    async fn call(&self, system: &str, messages: &[ChatMessage]) -> Result<String> {
        match tokio::time::timeout(self.timeout, self.backend.complete(system, messages)).await {
            Ok(result) => result,
            Err(_) => Err(ArenaError::UpstreamTimeout(self.timeout)),
        }
    }

    /// Next utterance for `persona`, given the full debate history.
    pub async fn persona_reply(
        &self,
        persona: &Persona,
        context: Option<&RetrievalContext>,
        topic: &str,
        history: &[DebateMessage],
    ) -> Result<String> {
        // Score retrieval chunks against the argument being answered.
        let query = history
            .iter()
            .rev()
            .find(|m| m.speaker_id != persona.id)
            .map(|m| m.content.as_str())
            .unwrap_or(topic);
        let chunks = context
            .map(|ctx| ctx.top_chunks(query, CONTEXT_CHUNKS_PER_REPLY))
            .unwrap_or_default();

        let system = prompts::persona_system(persona, &chunks);

        let mut messages: Vec<ChatMessage> = history
            .iter()
            .map(|m| {
                if m.speaker_id == persona.id {
                    ChatMessage::assistant(&m.content)
                } else {
                    ChatMessage::user(format!("{}: {}", m.speaker_name, m.content))
                }
            })
            .collect();
        messages.push(ChatMessage::user(prompts::persona_turn_instruction(topic)));

        tracing::debug!("Requesting reply from {} ({} history messages)", persona.name, history.len());
        self.call(&system, &messages).await
    }

    /// Moderator's opening statement for a session.
    pub async fn moderator_opening(
        &self,
        topic: &str,
        participant_names: &[String],
    ) -> Result<String> {
        let request = prompts::moderator_opening_request(topic, participant_names);
        self.call(prompts::MODERATOR_SYSTEM, &[ChatMessage::user(request)])
            .await
    }

    /// Raw judge completion for an evaluation prompt. Parsing happens in the
    /// judge adapter.
    pub async fn judge_completion(&self, evaluation_prompt: &str) -> Result<String> {
        self.call(
            prompts::JUDGE_SYSTEM,
            &[ChatMessage::user(evaluation_prompt)],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::personas::PersonaKind;

    fn test_config(base_url: &str) -> AgentConfig {
        AgentConfig {
            base_url: base_url.to_string(),
            api_key: Some("test-key".to_string()),
            model: "test-model".to_string(),
            ..AgentConfig::default()
        }
    }

    fn tesla() -> Persona {
        Persona {
            id: "tesla".into(),
            name: "Nikola Tesla".into(),
            title: "Inventor and Electrical Engineer".into(),
            era: "1856-1943".into(),
            specialty: "Innovation, Science, Future Technology".into(),
            warning: None,
            kind: PersonaKind::BuiltIn,
        }
    }

    #[tokio::test]
    async fn test_backend_complete() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"choices": [{"message": {"role": "assistant", "content": "Electricity will free mankind."}}]}"#,
            )
            .create_async()
            .await;

        let backend =
            OpenAiCompatBackend::new(&test_config(&format!("{}/v1/chat/completions", server.url())));
        let reply = backend
            .complete("system", &[ChatMessage::user("hello")])
            .await
            .expect("completion");
        assert_eq!(reply, "Electricity will free mankind.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_backend_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(401)
            .with_body(r#"{"error": {"message": "bad key", "type": "auth"}}"#)
            .create_async()
            .await;

        let backend =
            OpenAiCompatBackend::new(&test_config(&format!("{}/v1/chat/completions", server.url())));
        let err = backend
            .complete("system", &[ChatMessage::user("hello")])
            .await
            .expect_err("401");
        assert!(matches!(err, ArenaError::UpstreamAgent(_)));
        assert!(err.to_string().contains("bad key"));
    }

    #[tokio::test]
    async fn test_backend_empty_completion_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": [{"message": {"role": "assistant", "content": ""}}]}"#)
            .create_async()
            .await;

        let backend =
            OpenAiCompatBackend::new(&test_config(&format!("{}/v1/chat/completions", server.url())));
        let err = backend
            .complete("system", &[ChatMessage::user("hello")])
            .await
            .expect_err("empty");
        assert!(matches!(err, ArenaError::UpstreamAgent(_)));
    }

    struct SlowBackend;

    #[async_trait]
    impl AgentBackend for SlowBackend {
        async fn complete(&self, _system: &str, _messages: &[ChatMessage]) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("too late".to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_maps_deadline_to_timeout() {
        let client = AgentClient::new(Arc::new(SlowBackend), Duration::from_millis(100));
        let err = client
            .moderator_opening("Test topic", &["Nikola Tesla".to_string()])
            .await
            .expect_err("deadline");
        assert!(matches!(err, ArenaError::UpstreamTimeout(_)));
    }

    struct EchoBackend;

    #[async_trait]
    impl AgentBackend for EchoBackend {
        async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<String> {
            // Last message role must be user; surface the transcript length.
            assert_eq!(messages.last().expect("messages").role, ChatRole::User);
            Ok(format!("system={} messages={}", system.len(), messages.len()))
        }
    }

    #[tokio::test]
    async fn test_persona_reply_maps_history_roles() {
        use crate::orchestrator::session::{DebateMode, DebateSession, MessageType, SpeakerRole};

        let mut session = DebateSession::new(
            "Electrification".to_string(),
            vec!["tesla".to_string()],
            5,
            DebateMode::UserVsPersona,
        );
        session.append_message(
            "user",
            "User",
            SpeakerRole::User,
            MessageType::Argument,
            "Coal is enough.".to_string(),
            None,
        );
        session.append_message(
            "tesla",
            "Nikola Tesla",
            SpeakerRole::Participant,
            MessageType::Rebuttal,
            "Alternating current says otherwise.".to_string(),
            None,
        );

        let client = AgentClient::new(Arc::new(EchoBackend), Duration::from_secs(5));
        let reply = client
            .persona_reply(&tesla(), None, &session.topic, &session.messages)
            .await
            .expect("reply");
        // 2 history messages + trailing instruction
        assert!(reply.contains("messages=3"));
    }
}
