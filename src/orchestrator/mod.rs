//! Turn orchestrator: the debate session state machine.
//!
//! Sessions live in an in-memory table for the process lifetime. Each entry
//! pairs the session data with a turn gate: the gate is held across a whole
//! turn-advance (including the upstream agent call), so concurrent advances
//! for one session serialize instead of racing the turn counter, while plain
//! reads only touch the short-lived data lock and never wait on upstream I/O.
//! Different sessions are fully independent.

pub mod session;

use crate::agent::AgentClient;
use crate::error::{ArenaError, Result};
use crate::judge::JudgeService;
use crate::live::{LiveEvent, LiveHub};
use crate::personas::PersonaRegistry;
use crate::speech::SpeechSynthesizer;
use chrono::Utc;
use session::{
    DebateMessage, DebateMode, DebateSession, MessageType, SessionStatus, SessionSummary,
    SpeakerRole,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Earlier exchanges shown to the judge per evaluation.
const JUDGE_CONTEXT_EXCHANGES: usize = 3;

struct SessionEntry {
    /// Serializes turn-advances; held across the upstream agent call.
    turn_gate: tokio::sync::Mutex<()>,
    /// Guards the session data; held only for field access, never across I/O.
    data: std::sync::RwLock<DebateSession>,
}

type SessionHandle = Arc<SessionEntry>;

fn mode_label(mode: DebateMode) -> &'static str {
    match mode {
        DebateMode::UserVsPersona => "user-vs-persona",
        DebateMode::PersonaVsPersona => "persona-vs-persona",
    }
}

pub struct Orchestrator {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    /// Cancellation tokens for in-flight streaming runs, keyed by session id.
    runs: RwLock<HashMap<String, CancellationToken>>,
    registry: Arc<PersonaRegistry>,
    agent: Arc<AgentClient>,
    judge: Arc<JudgeService>,
    speech: Arc<SpeechSynthesizer>,
    live: Arc<LiveHub>,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<PersonaRegistry>,
        agent: Arc<AgentClient>,
        judge: Arc<JudgeService>,
        speech: Arc<SpeechSynthesizer>,
        live: Arc<LiveHub>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            runs: RwLock::new(HashMap::new()),
            registry,
            agent,
            judge,
            speech,
            live,
        }
    }

    // ─── Session table ──────────────────────────────────────

    /// Create a debate session. Nothing is created when validation fails.
    pub async fn create_session(
        &self,
        topic: &str,
        participants: Vec<String>,
        max_turns: u32,
        mode: DebateMode,
    ) -> Result<DebateSession> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ArenaError::Validation("debate topic is required".into()));
        }
        if max_turns == 0 {
            return Err(ArenaError::Validation("max_turns must be at least 1".into()));
        }
        let required = mode.required_participants();
        if participants.len() != required {
            return Err(ArenaError::Validation(format!(
                "{} mode requires exactly {} participant(s), got {}",
                mode_label(mode),
                required,
                participants.len()
            )));
        }
        for id in &participants {
            if self.registry.resolve(id).is_err() {
                return Err(ArenaError::Validation(format!("unknown persona '{}'", id)));
            }
        }

        let session = DebateSession::new(topic.to_string(), participants, max_turns, mode);
        let entry = Arc::new(SessionEntry {
            turn_gate: tokio::sync::Mutex::new(()),
            data: std::sync::RwLock::new(session.clone()),
        });
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), entry);

        tracing::info!(
            "Created debate session {} ({}, topic: {})",
            session.id,
            mode_label(mode),
            session.topic
        );
        Ok(session)
    }

    async fn session_handle(&self, session_id: &str) -> Result<SessionHandle> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| ArenaError::SessionNotFound(session_id.to_string()))
    }

    /// Snapshot of a session.
    pub async fn get_session(&self, session_id: &str) -> Result<DebateSession> {
        let handle = self.session_handle(session_id).await?;
        let session = handle.data.read().expect("session lock poisoned").clone();
        Ok(session)
    }

    /// Summaries of all sessions, newest first.
    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        let handles: Vec<SessionHandle> =
            self.sessions.read().await.values().cloned().collect();
        let mut summaries: Vec<SessionSummary> = handles
            .iter()
            .map(|h| h.data.read().expect("session lock poisoned").summary())
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        summaries
    }

    /// Remove a session, cancel any streaming run, and drop derived state.
    /// Deleting an unknown id reports `SessionNotFound`.
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        if self.sessions.write().await.remove(session_id).is_none() {
            return Err(ArenaError::SessionNotFound(session_id.to_string()));
        }
        if let Some(token) = self.runs.write().await.remove(session_id) {
            token.cancel();
        }
        self.judge.forget_session(session_id);
        self.live.remove(session_id);
        tracing::info!("Deleted debate session {}", session_id);
        Ok(())
    }

    /// Subscribe to a session's live events (SSE and WebSocket transports).
    pub async fn subscribe(&self, session_id: &str) -> Result<tokio::sync::broadcast::Receiver<LiveEvent>> {
        self.session_handle(session_id).await?;
        Ok(self.live.subscribe(session_id))
    }

    // ─── Turn advancement ───────────────────────────────────

    /// One user-vs-persona exchange: append the user's message, obtain the
    /// persona's counter-argument, count the turn. On upstream failure the
    /// user message remains in history and the turn is not counted.
    pub async fn advance_turn_user(
        &self,
        session_id: &str,
        user_text: &str,
    ) -> Result<(DebateMessage, DebateMessage)> {
        let user_text = user_text.trim();
        if user_text.is_empty() {
            return Err(ArenaError::Validation("message content is required".into()));
        }

        let handle = self.session_handle(session_id).await?;
        let _turn = handle.turn_gate.lock().await;

        let (persona, topic, history, user_message, first_turn) = {
            let mut session = handle.data.write().expect("session lock poisoned");
            if session.is_completed() {
                return Err(ArenaError::SessionCompleted(session_id.to_string()));
            }
            if session.mode != DebateMode::UserVsPersona {
                return Err(ArenaError::Validation(
                    "session is not in user-vs-persona mode; use the next-turn operation".into(),
                ));
            }
            let persona = self.registry.resolve(&session.participants[0])?;
            let first_turn = session.current_turn == 0;
            let user_message = session.append_message(
                "user",
                "User",
                SpeakerRole::User,
                MessageType::Argument,
                user_text.to_string(),
                None,
            );
            (
                persona,
                session.topic.clone(),
                session.messages.clone(),
                user_message,
                first_turn,
            )
        };

        let context = self.registry.context_for(&persona).await;
        let reply_text = self
            .agent
            .persona_reply(&persona, context.as_deref(), &topic, &history)
            .await?;
        let audio_url = self.speech.synthesize(&reply_text, &persona.id).await;

        let (reply_message, completed, judge_context) = {
            let mut session = handle.data.write().expect("session lock poisoned");
            let message_type = if first_turn {
                MessageType::Argument
            } else {
                MessageType::Rebuttal
            };
            let reply_message = session.append_message(
                &persona.id,
                &persona.name,
                SpeakerRole::Participant,
                message_type,
                reply_text,
                audio_url,
            );
            session.complete_turn();
            let judge_context = exchange_context(&session.messages);
            (reply_message, session.is_completed(), judge_context)
        };

        self.live.publish(
            session_id,
            LiveEvent::Message {
                message: user_message.clone(),
            },
        );
        self.live.publish(
            session_id,
            LiveEvent::Message {
                message: reply_message.clone(),
            },
        );
        if completed {
            self.publish_complete(session_id);
        }

        self.spawn_evaluation(
            session_id,
            topic,
            user_message.content.clone(),
            reply_message.content.clone(),
            judge_context,
        );

        Ok((user_message, reply_message))
    }

    /// One persona-vs-persona utterance; the next speaker alternates with the
    /// turn counter. Invoked once per client request — the caller paces the
    /// debate (or the streaming runner does).
    pub async fn advance_turn_auto(&self, session_id: &str) -> Result<DebateMessage> {
        let handle = self.session_handle(session_id).await?;
        self.advance_auto_on(&handle, session_id).await
    }

    async fn advance_auto_on(
        &self,
        handle: &SessionHandle,
        session_id: &str,
    ) -> Result<DebateMessage> {
        let _turn = handle.turn_gate.lock().await;

        let (persona, topic, history, message_type) = {
            let session = handle.data.read().expect("session lock poisoned");
            if session.is_completed() {
                return Err(ArenaError::SessionCompleted(session_id.to_string()));
            }
            if session.mode != DebateMode::PersonaVsPersona {
                return Err(ArenaError::Validation(
                    "session is not in persona-vs-persona mode; use the message operation".into(),
                ));
            }
            let speakers = session.participants.len() as u32;
            let speaker_index = (session.current_turn % speakers) as usize;
            let persona = self.registry.resolve(&session.participants[speaker_index])?;
            let message_type = if session.current_turn < speakers {
                MessageType::Argument
            } else if session.current_turn + speakers >= session.turn_limit() {
                MessageType::Closing
            } else {
                MessageType::Rebuttal
            };
            (
                persona,
                session.topic.clone(),
                session.messages.clone(),
                message_type,
            )
        };

        let context = self.registry.context_for(&persona).await;
        let reply_text = self
            .agent
            .persona_reply(&persona, context.as_deref(), &topic, &history)
            .await?;
        let audio_url = self.speech.synthesize(&reply_text, &persona.id).await;

        let (message, completed) = {
            let mut session = handle.data.write().expect("session lock poisoned");
            let message = session.append_message(
                &persona.id,
                &persona.name,
                SpeakerRole::Participant,
                message_type,
                reply_text,
                audio_url,
            );
            session.complete_turn();
            (message, session.is_completed())
        };

        self.live.publish(
            session_id,
            LiveEvent::Message {
                message: message.clone(),
            },
        );
        if completed {
            self.publish_complete(session_id);
        }
        Ok(message)
    }

    // ─── Streaming runner ───────────────────────────────────

    /// Start the moderator-opening flow. Emits the opening message, then for
    /// persona-vs-persona sessions auto-runs turns to completion, pushing
    /// every message to the live channel. The returned receiver is subscribed
    /// before the run starts, so the caller sees every event.
    pub async fn start_streaming(
        self: &Arc<Self>,
        session_id: &str,
    ) -> Result<tokio::sync::broadcast::Receiver<LiveEvent>> {
        let handle = self.session_handle(session_id).await?;
        {
            let mut session = handle.data.write().expect("session lock poisoned");
            match session.status {
                SessionStatus::Completed => {
                    return Err(ArenaError::SessionCompleted(session_id.to_string()));
                }
                SessionStatus::Active => {
                    return Err(ArenaError::Validation("debate already in progress".into()));
                }
                SessionStatus::Waiting => {
                    session.status = SessionStatus::Active;
                    session.updated_at = Utc::now();
                }
            }
        }

        let rx = self.live.subscribe(session_id);
        let token = CancellationToken::new();
        self.runs
            .write()
            .await
            .insert(session_id.to_string(), token.clone());

        let orchestrator = Arc::clone(self);
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            orchestrator.run_streaming(session_id, handle, token).await;
        });
        Ok(rx)
    }

    async fn run_streaming(&self, session_id: String, handle: SessionHandle, token: CancellationToken) {
        self.live.publish(
            &session_id,
            LiveEvent::Status {
                session_id: session_id.clone(),
                message: "Debate starting".to_string(),
            },
        );

        let (topic, participant_names, mode) = {
            let session = handle.data.read().expect("session lock poisoned");
            let names = session
                .participants
                .iter()
                .map(|id| {
                    self.registry
                        .resolve(id)
                        .map(|p| p.name)
                        .unwrap_or_else(|_| id.clone())
                })
                .collect::<Vec<_>>();
            (session.topic.clone(), names, session.mode)
        };

        match self.agent.moderator_opening(&topic, &participant_names).await {
            Ok(text) => {
                let audio_url = self.speech.synthesize(&text, "moderator").await;
                let message = {
                    let mut session = handle.data.write().expect("session lock poisoned");
                    session.append_message(
                        "moderator",
                        "Moderator",
                        SpeakerRole::Moderator,
                        MessageType::Opening,
                        text,
                        audio_url,
                    )
                };
                self.live.publish(&session_id, LiveEvent::Message { message });
            }
            Err(e) => {
                tracing::error!("Moderator opening failed for session {}: {}", session_id, e);
                self.publish_error(&session_id, &e);
                self.finish_run(&session_id).await;
                return;
            }
        }

        if mode == DebateMode::PersonaVsPersona {
            loop {
                if token.is_cancelled() {
                    tracing::info!("Streaming run for session {} cancelled", session_id);
                    self.finish_run(&session_id).await;
                    return;
                }
                let completed = handle
                    .data
                    .read()
                    .expect("session lock poisoned")
                    .is_completed();
                if completed {
                    break;
                }
                if let Err(e) = self.advance_auto_on(&handle, &session_id).await {
                    // A concurrent next-turn call may have finished the debate
                    // under us; that call already signalled completion.
                    if !matches!(e, ArenaError::SessionCompleted(_)) {
                        tracing::error!("Streaming run for session {} failed: {}", session_id, e);
                        self.publish_error(&session_id, &e);
                    }
                    self.finish_run(&session_id).await;
                    return;
                }
            }
        }

        self.finish_run(&session_id).await;
    }

    async fn finish_run(&self, session_id: &str) {
        self.runs.write().await.remove(session_id);
    }

    fn publish_complete(&self, session_id: &str) {
        self.live.publish(
            session_id,
            LiveEvent::Complete {
                session_id: session_id.to_string(),
                message: "Debate completed".to_string(),
            },
        );
    }

    fn publish_error(&self, session_id: &str, error: &ArenaError) {
        self.live.publish(
            session_id,
            LiveEvent::Error {
                session_id: session_id.to_string(),
                message: error.to_string(),
            },
        );
    }

    /// Score the exchange asynchronously. A turn never waits on its
    /// evaluation, and evaluation failures never roll the turn back.
    fn spawn_evaluation(
        &self,
        session_id: &str,
        topic: String,
        user_text: String,
        ai_text: String,
        context: Vec<(String, String)>,
    ) {
        let judge = Arc::clone(&self.judge);
        let live = Arc::clone(&self.live);
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            match judge
                .evaluate_exchange(&session_id, &topic, &user_text, &ai_text, &context)
                .await
            {
                Ok(evaluation) => live.publish(
                    &session_id,
                    LiveEvent::Evaluation {
                        session_id: session_id.clone(),
                        evaluation,
                    },
                ),
                Err(e) => {
                    tracing::warn!("Evaluation for session {} unavailable: {}", session_id, e);
                }
            }
        });
    }
}

/// Earlier (user, persona) exchange pairs for judge context, excluding the
/// exchange currently being evaluated.
pub(crate) fn exchange_context(messages: &[DebateMessage]) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut i = 0;
    while i + 1 < messages.len() {
        if messages[i].role == SpeakerRole::User
            && messages[i + 1].role == SpeakerRole::Participant
        {
            pairs.push((messages[i].content.clone(), messages[i + 1].content.clone()));
            i += 2;
        } else {
            i += 1;
        }
    }
    pairs.pop();
    let keep_from = pairs.len().saturating_sub(JUDGE_CONTEXT_EXCHANGES);
    pairs.split_off(keep_from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::LiveEvent;
    use crate::test_support::TestArena;

    fn replies(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("Reply number {i}")).collect()
    }

    #[tokio::test]
    async fn test_create_session_validates_topic() {
        let arena = TestArena::new(vec![], vec![]);
        let err = arena
            .orchestrator
            .create_session("   ", vec!["lincoln".into()], 2, DebateMode::UserVsPersona)
            .await
            .expect_err("blank topic");
        assert!(matches!(err, ArenaError::Validation(_)));
        assert!(arena.orchestrator.list_sessions().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_session_validates_participant_count() {
        let arena = TestArena::new(vec![], vec![]);
        let err = arena
            .orchestrator
            .create_session(
                "Topic",
                vec!["lincoln".into(), "tesla".into()],
                2,
                DebateMode::UserVsPersona,
            )
            .await
            .expect_err("two participants in user mode");
        assert!(matches!(err, ArenaError::Validation(_)));
        assert!(arena.orchestrator.list_sessions().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_session_validates_persona_ids() {
        let arena = TestArena::new(vec![], vec![]);
        let err = arena
            .orchestrator
            .create_session("Topic", vec!["socrates".into()], 2, DebateMode::UserVsPersona)
            .await
            .expect_err("unknown persona");
        assert!(matches!(err, ArenaError::Validation(_)));
    }

    #[tokio::test]
    async fn test_user_debate_end_to_end() {
        let arena = TestArena::new(replies(2), vec![]);
        let session = arena
            .orchestrator
            .create_session(
                "Should AI be regulated?",
                vec!["lincoln".into()],
                2,
                DebateMode::UserVsPersona,
            )
            .await
            .expect("create");

        // First exchange
        let (user_msg, reply) = arena
            .orchestrator
            .advance_turn_user(&session.id, "AI must be regulated now.")
            .await
            .expect("first turn");
        assert_eq!(user_msg.turn_number, 1);
        assert_eq!(reply.turn_number, 2);
        assert_eq!(reply.speaker_name, "Abraham Lincoln");

        let snapshot = arena.orchestrator.get_session(&session.id).await.expect("get");
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.current_turn, 1);
        assert_eq!(snapshot.status, SessionStatus::Active);

        // Second exchange completes the debate
        arena
            .orchestrator
            .advance_turn_user(&session.id, "What about innovation?")
            .await
            .expect("second turn");
        let snapshot = arena.orchestrator.get_session(&session.id).await.expect("get");
        assert_eq!(snapshot.messages.len(), 4);
        assert_eq!(snapshot.current_turn, 2);
        assert_eq!(snapshot.status, SessionStatus::Completed);

        // Third attempt fails and appends nothing
        let err = arena
            .orchestrator
            .advance_turn_user(&session.id, "One more point.")
            .await
            .expect_err("completed session");
        assert!(matches!(err, ArenaError::SessionCompleted(_)));
        let snapshot = arena.orchestrator.get_session(&session.id).await.expect("get");
        assert_eq!(snapshot.messages.len(), 4);

        // Turn numbers are strictly increasing from 1 with no gaps
        let numbers: Vec<u32> = snapshot.messages.iter().map(|m| m.turn_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_auto_debate_alternates_speakers() {
        let arena = TestArena::new(replies(2), vec![]);
        let session = arena
            .orchestrator
            .create_session(
                "Electricity or unity?",
                vec!["lincoln".into(), "tesla".into()],
                1,
                DebateMode::PersonaVsPersona,
            )
            .await
            .expect("create");

        let first = arena
            .orchestrator
            .advance_turn_auto(&session.id)
            .await
            .expect("turn 1");
        assert_eq!(first.speaker_id, "lincoln");

        let second = arena
            .orchestrator
            .advance_turn_auto(&session.id)
            .await
            .expect("turn 2");
        assert_eq!(second.speaker_id, "tesla");

        let snapshot = arena.orchestrator.get_session(&session.id).await.expect("get");
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.status, SessionStatus::Completed);
        assert!(snapshot.current_turn <= snapshot.turn_limit());

        let err = arena
            .orchestrator
            .advance_turn_auto(&session.id)
            .await
            .expect_err("completed");
        assert!(matches!(err, ArenaError::SessionCompleted(_)));
    }

    #[tokio::test]
    async fn test_upstream_failure_keeps_user_message_but_not_turn() {
        let arena = TestArena::new(vec![], vec![]); // backend exhausted immediately
        let session = arena
            .orchestrator
            .create_session("Topic", vec!["lincoln".into()], 2, DebateMode::UserVsPersona)
            .await
            .expect("create");

        let err = arena
            .orchestrator
            .advance_turn_user(&session.id, "Opening argument")
            .await
            .expect_err("agent fails");
        assert!(matches!(err, ArenaError::UpstreamAgent(_)));

        let snapshot = arena.orchestrator.get_session(&session.id).await.expect("get");
        assert_eq!(snapshot.messages.len(), 1); // no rollback of the user message
        assert_eq!(snapshot.current_turn, 0); // but the turn did not count
    }

    #[tokio::test]
    async fn test_wrong_mode_operations_rejected() {
        let arena = TestArena::new(replies(4), vec![]);
        let user_session = arena
            .orchestrator
            .create_session("Topic", vec!["lincoln".into()], 2, DebateMode::UserVsPersona)
            .await
            .expect("create");
        let auto_session = arena
            .orchestrator
            .create_session(
                "Topic",
                vec!["lincoln".into(), "tesla".into()],
                2,
                DebateMode::PersonaVsPersona,
            )
            .await
            .expect("create");

        assert!(matches!(
            arena.orchestrator.advance_turn_auto(&user_session.id).await,
            Err(ArenaError::Validation(_))
        ));
        assert!(matches!(
            arena
                .orchestrator
                .advance_turn_user(&auto_session.id, "hello")
                .await,
            Err(ArenaError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_session_is_strict() {
        let arena = TestArena::new(vec![], vec![]);
        let session = arena
            .orchestrator
            .create_session("Topic", vec!["lincoln".into()], 2, DebateMode::UserVsPersona)
            .await
            .expect("create");

        arena
            .orchestrator
            .delete_session(&session.id)
            .await
            .expect("delete");
        assert!(matches!(
            arena.orchestrator.get_session(&session.id).await,
            Err(ArenaError::SessionNotFound(_))
        ));
        assert!(matches!(
            arena.orchestrator.delete_session(&session.id).await,
            Err(ArenaError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_streaming_auto_debate_runs_to_completion() {
        // 1 moderator opening + 2 persona turns
        let arena = TestArena::new(replies(3), vec![]);
        let orchestrator = Arc::clone(&arena.orchestrator);
        let session = orchestrator
            .create_session(
                "Progress",
                vec!["lincoln".into(), "tesla".into()],
                1,
                DebateMode::PersonaVsPersona,
            )
            .await
            .expect("create");

        let mut rx = orchestrator
            .start_streaming(&session.id)
            .await
            .expect("start");

        let mut messages = 0;
        let mut saw_complete = false;
        while let Ok(event) = rx.recv().await {
            match event {
                LiveEvent::Message { .. } => messages += 1,
                LiveEvent::Complete { .. } => {
                    saw_complete = true;
                    break;
                }
                LiveEvent::Error { message, .. } => panic!("unexpected error: {message}"),
                _ => {}
            }
        }
        assert!(saw_complete);
        assert_eq!(messages, 3); // opening + one utterance per side

        let snapshot = orchestrator.get_session(&session.id).await.expect("get");
        assert_eq!(snapshot.status, SessionStatus::Completed);
        assert_eq!(snapshot.messages[0].message_type, MessageType::Opening);
        assert_eq!(snapshot.messages[0].speaker_id, "moderator");
    }

    #[tokio::test]
    async fn test_streaming_rejects_double_start() {
        let arena = TestArena::new(replies(1), vec![]);
        let orchestrator = Arc::clone(&arena.orchestrator);
        let session = orchestrator
            .create_session("Topic", vec!["lincoln".into()], 2, DebateMode::UserVsPersona)
            .await
            .expect("create");

        let _rx = orchestrator.start_streaming(&session.id).await.expect("start");
        let err = orchestrator
            .start_streaming(&session.id)
            .await
            .expect_err("double start");
        assert!(matches!(err, ArenaError::Validation(_)));
    }

    #[tokio::test]
    async fn test_streaming_emits_error_and_halts_on_upstream_failure() {
        // Opening succeeds, first persona turn fails
        let arena = TestArena::new(replies(1), vec![]);
        let orchestrator = Arc::clone(&arena.orchestrator);
        let session = orchestrator
            .create_session(
                "Topic",
                vec!["lincoln".into(), "tesla".into()],
                2,
                DebateMode::PersonaVsPersona,
            )
            .await
            .expect("create");

        let mut rx = orchestrator
            .start_streaming(&session.id)
            .await
            .expect("start");

        let mut saw_opening = false;
        let mut saw_error = false;
        while let Ok(event) = rx.recv().await {
            match event {
                LiveEvent::Message { message } => {
                    assert_eq!(message.message_type, MessageType::Opening);
                    saw_opening = true;
                }
                LiveEvent::Error { .. } => {
                    saw_error = true;
                    break;
                }
                LiveEvent::Complete { .. } => panic!("run must not complete"),
                _ => {}
            }
        }
        assert!(saw_opening);
        assert!(saw_error);

        // The opening already produced remains in history
        let snapshot = orchestrator.get_session(&session.id).await.expect("get");
        assert_eq!(snapshot.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_evaluation_arrives_asynchronously() {
        let judge_reply = r#"{
            "user_scores": {"logic": 8, "factual_accuracy": 8, "rhetoric": 8, "relevance": 8, "rebuttal": 8},
            "ai_scores": {"logic": 6, "factual_accuracy": 6, "rhetoric": 6, "relevance": 6, "rebuttal": 6}
        }"#;
        let arena = TestArena::new(replies(1), vec![judge_reply.to_string()]);
        let session = arena
            .orchestrator
            .create_session("Topic", vec!["lincoln".into()], 2, DebateMode::UserVsPersona)
            .await
            .expect("create");

        let mut rx = arena.orchestrator.subscribe(&session.id).await.expect("subscribe");
        arena
            .orchestrator
            .advance_turn_user(&session.id, "My argument")
            .await
            .expect("turn");

        let mut saw_evaluation = false;
        while let Ok(event) = rx.recv().await {
            if let LiveEvent::Evaluation { evaluation, .. } = event {
                assert_eq!(evaluation.user_scores.total, 40);
                saw_evaluation = true;
                break;
            }
        }
        assert!(saw_evaluation);
        assert_eq!(arena.judge.cumulative(&session.id).exchanges_evaluated, 1);
    }

    #[tokio::test]
    async fn test_evaluation_failure_never_blocks_turns() {
        // Judge script is empty: every evaluation fails
        let arena = TestArena::new(replies(2), vec![]);
        let session = arena
            .orchestrator
            .create_session("Topic", vec!["lincoln".into()], 2, DebateMode::UserVsPersona)
            .await
            .expect("create");

        arena
            .orchestrator
            .advance_turn_user(&session.id, "First")
            .await
            .expect("turn 1");
        arena
            .orchestrator
            .advance_turn_user(&session.id, "Second")
            .await
            .expect("turn 2");

        let snapshot = arena.orchestrator.get_session(&session.id).await.expect("get");
        assert_eq!(snapshot.status, SessionStatus::Completed);
        assert_eq!(arena.judge.cumulative(&session.id).exchanges_evaluated, 0);
    }

    #[tokio::test]
    async fn test_persona_deletion_preserves_session_history() {
        use crate::personas::CreateCustomPersona;

        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/page/summary/Marie%20Curie")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"extract": "Polish physicist and chemist."}"#)
            .create_async()
            .await;

        let arena = TestArena::with_wiki(replies(1), vec![], &server.url());
        let persona = arena
            .registry
            .create_custom(CreateCustomPersona {
                name: "Marie Curie".into(),
                topic: "Marie Curie".into(),
                related_topics: vec![],
                specialty: None,
                era: None,
            })
            .await
            .expect("create persona");

        let session = arena
            .orchestrator
            .create_session(
                "Is radium safe?",
                vec![persona.id.clone()],
                3,
                DebateMode::UserVsPersona,
            )
            .await
            .expect("create");
        arena
            .orchestrator
            .advance_turn_user(&session.id, "Radium cures everything, surely.")
            .await
            .expect("turn");

        arena.registry.delete_custom(&persona.id).expect("delete persona");

        // Historical messages keep their copied speaker identity
        let snapshot = arena.orchestrator.get_session(&session.id).await.expect("get");
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.messages[1].speaker_id, persona.id);
        assert_eq!(snapshot.messages[1].speaker_name, "Marie Curie");
    }

    #[test]
    fn test_exchange_context_excludes_current_pair() {
        let mut session = DebateSession::new(
            "Topic".into(),
            vec!["lincoln".into()],
            10,
            DebateMode::UserVsPersona,
        );
        for i in 0..3 {
            session.append_message(
                "user",
                "User",
                SpeakerRole::User,
                MessageType::Argument,
                format!("user {i}"),
                None,
            );
            session.append_message(
                "lincoln",
                "Abraham Lincoln",
                SpeakerRole::Participant,
                MessageType::Rebuttal,
                format!("reply {i}"),
                None,
            );
        }
        let context = exchange_context(&session.messages);
        assert_eq!(context.len(), 2);
        assert_eq!(context[0].0, "user 0");
        assert_eq!(context[1].1, "reply 1");
    }
}
