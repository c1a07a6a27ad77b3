//! Configuration loading, defaults, and environment overrides.
//!
//! Priority (lowest to highest): built-in defaults, system config
//! (`~/.debateiq/config.toml`), local config (`./debateiq.toml`),
//! `DEBATEIQ_*` environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// LLM agent backend configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// Text-to-speech configuration
    #[serde(default)]
    pub speech: SpeechConfig,

    /// On-disk storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (default: "127.0.0.1")
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Server port (default: 8000)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins for the browser frontend
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
    ]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

/// LLM agent backend configuration.
///
/// Any endpoint that speaks the OpenAI chat completions protocol works here,
/// including OpenRouter and local servers (LM Studio, Ollama).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Chat completions endpoint URL
    #[serde(default = "default_agent_base_url")]
    pub base_url: String,

    /// Bearer token for the endpoint; omit for local servers
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model identifier sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-utterance token cap
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Deadline for one upstream call, in seconds. Expiry maps to
    /// `ArenaError::UpstreamTimeout`; there is no retry.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Wikipedia REST API base used to validate and ground custom personas
    #[serde(default = "default_wikipedia_api")]
    pub wikipedia_api: String,
}

fn default_agent_base_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_wikipedia_api() -> String {
    "https://en.wikipedia.org/api/rest_v1".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: default_agent_base_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            wikipedia_api: default_wikipedia_api(),
        }
    }
}

impl AgentConfig {
    /// Upstream call deadline as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Text-to-speech configuration. Speech is disabled unless an endpoint is set;
/// a missing or failing endpoint never fails a turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// HTTP synthesis endpoint; `None` disables audio generation
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Bearer token for the synthesis endpoint
    #[serde(default)]
    pub api_key: Option<String>,
}

/// On-disk storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding `figures.json` and the audio cache
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".debateiq"))
        .unwrap_or_else(|| PathBuf::from(".debateiq"))
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Config {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(system_path) = Self::system_config_path()
            && system_path.exists()
        {
            tracing::debug!("Loading system config from: {:?}", system_path);
            config = Self::from_file(&system_path)?;
        }

        let local_path = Self::local_config_path();
        if local_path.exists() {
            tracing::debug!("Loading local config from: {:?}", local_path);
            config = Self::from_file(&local_path)?;
        }

        Ok(Self::apply_env_overrides(config))
    }

    /// Load configuration from a specific file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file not found: {:?}", path);
        }
        let config = Self::from_file(path)?;
        Ok(Self::apply_env_overrides(config))
    }

    /// Get the system config path: ~/.debateiq/config.toml
    pub fn system_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".debateiq").join("config.toml"))
    }

    /// Get the local config path: ./debateiq.toml
    fn local_config_path() -> PathBuf {
        PathBuf::from("./debateiq.toml")
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut config: Self) -> Self {
        if let Ok(bind) = std::env::var("DEBATEIQ_BIND") {
            config.server.bind = bind;
        }
        if let Ok(port) = std::env::var("DEBATEIQ_PORT")
            && let Ok(port) = port.parse()
        {
            config.server.port = port;
        }
        if let Ok(url) = std::env::var("DEBATEIQ_AGENT_URL") {
            config.agent.base_url = url;
        }
        if let Ok(key) = std::env::var("DEBATEIQ_API_KEY")
            && !key.is_empty()
        {
            config.agent.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("DEBATEIQ_MODEL") {
            config.agent.model = model;
        }
        if let Ok(dir) = std::env::var("DEBATEIQ_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(dir);
        }
        if let Ok(endpoint) = std::env::var("DEBATEIQ_TTS_URL")
            && !endpoint.is_empty()
        {
            config.speech.endpoint = Some(endpoint);
        }
        config
    }
}
