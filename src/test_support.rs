//! Shared fixtures for unit tests: a scripted agent backend and a fully wired
//! orchestrator with temp-dir storage, no network, and speech disabled.

use crate::agent::{AgentBackend, AgentClient, ChatMessage};
use crate::config::SpeechConfig;
use crate::error::{ArenaError, Result};
use crate::judge::JudgeService;
use crate::live::LiveHub;
use crate::orchestrator::Orchestrator;
use crate::personas::factory::WikipediaClient;
use crate::personas::store::CustomPersonaStore;
use crate::personas::PersonaRegistry;
use crate::speech::SpeechSynthesizer;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Backend that pops pre-scripted replies in order and fails with
/// `UpstreamAgent` once exhausted.
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<String>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
        }
    }
}

#[async_trait]
impl AgentBackend for ScriptedBackend {
    async fn complete(&self, _system: &str, _messages: &[ChatMessage]) -> Result<String> {
        self.replies
            .lock()
            .expect("script lock poisoned")
            .pop_front()
            .ok_or_else(|| ArenaError::UpstreamAgent("scripted backend exhausted".to_string()))
    }
}

/// Agent client over a scripted backend with a generous deadline.
pub fn scripted_agent(replies: Vec<String>) -> Arc<AgentClient> {
    Arc::new(AgentClient::new(
        Arc::new(ScriptedBackend::new(replies)),
        Duration::from_secs(5),
    ))
}

/// A wired-up arena for orchestrator and server tests. Persona and judge
/// scripts are separate so asynchronous evaluations never steal the replies
/// meant for persona turns.
pub struct TestArena {
    pub orchestrator: Arc<Orchestrator>,
    pub registry: Arc<PersonaRegistry>,
    pub judge: Arc<JudgeService>,
    pub live: Arc<LiveHub>,
    _data_dir: tempfile::TempDir,
}

impl TestArena {
    pub fn new(persona_replies: Vec<String>, judge_replies: Vec<String>) -> Self {
        // Unroutable address: any accidental Wikipedia call fails fast.
        Self::with_wiki(persona_replies, judge_replies, "http://127.0.0.1:1/api/rest_v1")
    }

    /// Build the arena against a specific Wikipedia base URL (mock server).
    pub fn with_wiki(
        persona_replies: Vec<String>,
        judge_replies: Vec<String>,
        wiki_url: &str,
    ) -> Self {
        let data_dir = tempfile::tempdir().expect("tempdir");
        let store = CustomPersonaStore::open(data_dir.path()).expect("open store");
        Self::with_store(persona_replies, judge_replies, store, data_dir, wiki_url)
    }

    /// Build the arena around a pre-populated persona store.
    pub fn with_store(
        persona_replies: Vec<String>,
        judge_replies: Vec<String>,
        store: CustomPersonaStore,
        data_dir: tempfile::TempDir,
        wiki_url: &str,
    ) -> Self {
        let wiki = WikipediaClient::new(wiki_url);
        let registry = Arc::new(PersonaRegistry::new(store, wiki));
        let judge = Arc::new(JudgeService::new(scripted_agent(judge_replies)));
        let speech = Arc::new(SpeechSynthesizer::new(
            &SpeechConfig::default(),
            data_dir.path(),
        ));
        let live = Arc::new(LiveHub::new());
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&registry),
            scripted_agent(persona_replies),
            Arc::clone(&judge),
            speech,
            Arc::clone(&live),
        ));
        Self {
            orchestrator,
            registry,
            judge,
            live,
            _data_dir: data_dir,
        }
    }
}
