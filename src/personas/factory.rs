//! Wikipedia-backed grounding for custom personas.
//!
//! Validation and context construction both go through the Wikipedia REST
//! summary endpoint: a topic is valid iff it resolves to an article, and the
//! article extracts become the persona's retrieval context. Extracts are split
//! into overlapping chunks; at reply time the chunks that best match the
//! message are injected into the persona's system prompt.

use crate::error::{ArenaError, Result};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(20);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Chunking parameters for retrieval context construction.
const CHUNK_SIZE: usize = 1000;
const CHUNK_OVERLAP: usize = 200;

/// Client for the Wikipedia REST API (`/page/summary/{title}`).
#[derive(Clone)]
pub struct WikipediaClient {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct PageSummary {
    #[serde(default)]
    extract: String,
}

impl WikipediaClient {
    pub fn new(base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(LOOKUP_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("debateiq/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the plain-text extract for a topic. `Ok(None)` means the article
    /// does not exist; transport failures are upstream errors.
    pub async fn fetch_extract(&self, topic: &str) -> Result<Option<String>> {
        let url = format!(
            "{}/page/summary/{}",
            self.base_url,
            urlencoding::encode(topic.trim())
        );
        tracing::debug!("Wikipedia lookup: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ArenaError::UpstreamAgent(format!("wikipedia lookup: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ArenaError::UpstreamAgent(format!(
                "wikipedia lookup returned {}",
                response.status()
            )));
        }

        let summary: PageSummary = response
            .json()
            .await
            .map_err(|e| ArenaError::UpstreamAgent(format!("wikipedia response: {}", e)))?;

        if summary.extract.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(summary.extract))
    }
}

/// A persona's knowledge grounding: article extracts split into overlapping
/// chunks, scored against a query by term overlap at reply time.
#[derive(Debug, Clone)]
pub struct RetrievalContext {
    chunks: Vec<String>,
}

impl RetrievalContext {
    /// Split article extracts into chunks of `CHUNK_SIZE` chars with
    /// `CHUNK_OVERLAP` chars of overlap.
    pub fn build(articles: &[String]) -> Self {
        let mut chunks = Vec::new();
        for article in articles {
            chunk_text(article, CHUNK_SIZE, CHUNK_OVERLAP, &mut chunks);
        }
        Self { chunks }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// The `k` chunks most relevant to `query`, by case-insensitive term
    /// overlap. Ties keep document order, so with a blank query the leading
    /// chunks (article openings) win.
    pub fn top_chunks(&self, query: &str, k: usize) -> Vec<&str> {
        let terms: HashSet<String> = query
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() > 3)
            .map(str::to_string)
            .collect();

        let mut scored: Vec<(usize, &str)> = self
            .chunks
            .iter()
            .map(|chunk| {
                let lower = chunk.to_lowercase();
                let score = terms.iter().filter(|t| lower.contains(t.as_str())).count();
                (score, chunk.as_str())
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().take(k).map(|(_, c)| c).collect()
    }
}

fn chunk_text(text: &str, size: usize, overlap: usize, out: &mut Vec<String>) {
    debug_assert!(overlap < size);
    let chars: Vec<char> = text.chars().collect();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + size).min(chars.len());
        let chunk: String = chars[start..end].iter().collect();
        if !chunk.trim().is_empty() {
            out.push(chunk);
        }
        if end == chars.len() {
            break;
        }
        start = end - overlap;
    }
}
