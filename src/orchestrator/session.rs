//! Debate session data model.
//!
//! Sessions are owned exclusively by the orchestrator and mutated only through
//! its turn-advance operations. Messages are append-only: a message's
//! `turn_number` equals its 1-based position in the list and never changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who a message speaks as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerRole {
    Moderator,
    Participant,
    User,
}

/// What kind of contribution a message is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Opening,
    Argument,
    Rebuttal,
    Closing,
    Question,
    Answer,
    Moderator,
}

/// How a debate is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebateMode {
    /// The user argues against a single persona.
    UserVsPersona,
    /// Two personas argue; each turn is generated on client request.
    PersonaVsPersona,
}

impl DebateMode {
    /// Participants required by the mode.
    pub fn required_participants(self) -> usize {
        match self {
            Self::UserVsPersona => 1,
            Self::PersonaVsPersona => 2,
        }
    }
}

/// Session lifecycle. Transitions are monotonic:
/// `Waiting -> Active -> Completed`, nothing leaves `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Waiting,
    Active,
    Completed,
}

/// A single message in a debate. Append-only once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateMessage {
    pub id: String,
    pub session_id: String,
    /// Persona id, `"moderator"`, or `"user"`. Display names are copied in so
    /// history stays resolvable after a persona is deleted.
    pub speaker_id: String,
    pub speaker_name: String,
    pub role: SpeakerRole,
    pub message_type: MessageType,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// 1-based position in the session's message list.
    pub turn_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

/// A debate session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateSession {
    pub id: String,
    pub topic: String,
    /// Persona ids, in speaking order.
    pub participants: Vec<String>,
    pub mode: DebateMode,
    pub status: SessionStatus,
    /// Completed turn-advances. One user/persona pair in user-vs-persona mode,
    /// one utterance in persona-vs-persona mode.
    pub current_turn: u32,
    pub max_turns: u32,
    pub messages: Vec<DebateMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Summary row for session listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub topic: String,
    pub participants: Vec<String>,
    pub mode: DebateMode,
    pub status: SessionStatus,
    pub current_turn: u32,
    pub max_turns: u32,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
}

impl DebateSession {
    pub fn new(topic: String, participants: Vec<String>, max_turns: u32, mode: DebateMode) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            topic,
            participants,
            mode,
            status: SessionStatus::Waiting,
            current_turn: 0,
            max_turns,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Turn-advance ceiling: one advance per exchange in user mode, one per
    /// utterance per participant in auto mode.
    pub fn turn_limit(&self) -> u32 {
        match self.mode {
            DebateMode::UserVsPersona => self.max_turns,
            DebateMode::PersonaVsPersona => self.max_turns * self.participants.len() as u32,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    /// Append a message at the next turn number.
    pub fn append_message(
        &mut self,
        speaker_id: &str,
        speaker_name: &str,
        role: SpeakerRole,
        message_type: MessageType,
        content: String,
        audio_url: Option<String>,
    ) -> DebateMessage {
        let message = DebateMessage {
            id: Uuid::new_v4().to_string(),
            session_id: self.id.clone(),
            speaker_id: speaker_id.to_string(),
            speaker_name: speaker_name.to_string(),
            role,
            message_type,
            content,
            timestamp: Utc::now(),
            turn_number: self.messages.len() as u32 + 1,
            audio_url,
        };
        self.messages.push(message.clone());
        self.updated_at = message.timestamp;
        message
    }

    /// Count one completed turn-advance and derive the resulting status.
    /// First advance performs the implicit `Waiting -> Active` transition.
    pub fn complete_turn(&mut self) {
        self.current_turn += 1;
        self.status = if self.current_turn >= self.turn_limit() {
            SessionStatus::Completed
        } else {
            SessionStatus::Active
        };
        self.updated_at = Utc::now();
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            topic: self.topic.clone(),
            participants: self.participants.clone(),
            mode: self.mode,
            status: self.status,
            current_turn: self.current_turn,
            max_turns: self.max_turns,
            message_count: self.messages.len(),
            created_at: self.created_at,
        }
    }
}
