//! Text-to-speech adapter for persona replies.
//!
//! Audio is strictly optional: the synthesizer is disabled unless an endpoint
//! is configured, and any failure degrades to "no audio" rather than failing
//! the turn. Generated MP3s are cached on disk keyed by a digest of
//! speaker + text, and served by the router under `/audio/`.

use crate::config::SpeechConfig;
use reqwest::Client;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;

const SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-speaker voice parameters sent to the synthesis endpoint.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct VoiceProfile {
    pub voice: &'static str,
    pub speaking_rate: f32,
    pub pitch: f32,
}

const DEFAULT_VOICE: VoiceProfile = VoiceProfile {
    voice: "en-US-Standard-C",
    speaking_rate: 1.0,
    pitch: 0.0,
};

fn voice_for(speaker_id: &str) -> VoiceProfile {
    match speaker_id {
        // Slightly slower and deeper: authoritative
        "lincoln" => VoiceProfile {
            voice: "en-US-Standard-D",
            speaking_rate: 0.95,
            pitch: -2.0,
        },
        // Slightly faster: energetic
        "tesla" => VoiceProfile {
            voice: "en-US-Standard-B",
            speaking_rate: 1.1,
            pitch: 0.0,
        },
        "moderator" => VoiceProfile {
            voice: "en-US-Standard-A",
            speaking_rate: 1.0,
            pitch: 0.0,
        },
        _ => DEFAULT_VOICE,
    }
}

#[derive(Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    #[serde(flatten)]
    voice: VoiceProfile,
}

/// HTTP TTS client with an on-disk MP3 cache.
pub struct SpeechSynthesizer {
    endpoint: Option<String>,
    api_key: Option<String>,
    client: Client,
    audio_dir: PathBuf,
}

impl SpeechSynthesizer {
    pub fn new(config: &SpeechConfig, data_dir: &Path) -> Self {
        let audio_dir = data_dir.join("audio");
        if config.endpoint.is_some()
            && let Err(e) = std::fs::create_dir_all(&audio_dir)
        {
            tracing::warn!("Failed to create audio cache dir: {}", e);
        }

        let client = Client::builder()
            .timeout(SYNTHESIS_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            client,
            audio_dir,
        }
    }

    /// Directory served under `/audio/`, when speech is enabled.
    pub fn audio_dir(&self) -> Option<&Path> {
        self.endpoint.as_ref().map(|_| self.audio_dir.as_path())
    }

    fn cache_filename(speaker_id: &str, text: &str) -> String {
        let digest = Sha256::digest(format!("{speaker_id}:{text}").as_bytes());
        format!("{speaker_id}_{digest:x}.mp3")
    }

    /// Generate (or reuse cached) speech audio. Returns the public URL path,
    /// or `None` when speech is disabled or synthesis fails.
    pub async fn synthesize(&self, text: &str, speaker_id: &str) -> Option<String> {
        let endpoint = self.endpoint.as_ref()?;

        let filename = Self::cache_filename(speaker_id, text);
        let cache_path = self.audio_dir.join(&filename);
        if cache_path.exists() {
            tracing::debug!("Using cached audio for {}", speaker_id);
            return Some(format!("/audio/{filename}"));
        }

        tracing::info!("Generating speech for {}", speaker_id);
        let mut request = self.client.post(endpoint).json(&SynthesisRequest {
            text,
            voice: voice_for(speaker_id),
        });
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = match request.send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::warn!("Speech synthesis returned {}", r.status());
                return None;
            }
            Err(e) => {
                tracing::warn!("Speech synthesis failed: {}", e);
                return None;
            }
        };

        let audio = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Speech synthesis read failed: {}", e);
                return None;
            }
        };

        if let Err(e) = tokio::fs::write(&cache_path, &audio).await {
            tracing::warn!("Failed to cache audio file: {}", e);
            return None;
        }
        Some(format!("/audio/{filename}"))
    }
}
