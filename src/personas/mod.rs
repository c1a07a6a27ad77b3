//! Persona registry: the built-in roster plus user-created custom figures.
//!
//! Built-ins are process-wide constants; custom personas live in a JSON-backed
//! store ([`store::CustomPersonaStore`]) and carry a retrieval context built
//! from Wikipedia extracts ([`factory`]). Both sources resolve through one
//! [`PersonaRegistry::resolve`] call.

pub mod factory;
pub mod store;

use crate::error::{ArenaError, Result};
use factory::{RetrievalContext, WikipediaClient};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use store::CustomPersonaStore;

/// A debate participant profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    /// Slug key, e.g. `lincoln` or `king_mahendra`
    pub id: String,
    /// Display name
    pub name: String,
    /// Short title shown under the name
    pub title: String,
    /// Era label, e.g. `1809-1865`
    pub era: String,
    /// One-line description of expertise
    pub specialty: String,
    /// Historical-context disclaimer, when one is warranted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Which source the persona comes from
    #[serde(flatten)]
    pub kind: PersonaKind,
}

/// Persona source. Custom personas record the Wikipedia topics their
/// retrieval context is grounded in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PersonaKind {
    BuiltIn,
    Custom {
        topic: String,
        #[serde(default)]
        related_topics: Vec<String>,
    },
}

impl Persona {
    pub fn is_custom(&self) -> bool {
        matches!(self.kind, PersonaKind::Custom { .. })
    }
}

/// Request to create a custom persona.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCustomPersona {
    /// Display name of the historical figure
    pub name: String,
    /// Main Wikipedia topic grounding the persona
    pub topic: String,
    /// Related Wikipedia topics for additional context
    #[serde(default)]
    pub related_topics: Vec<String>,
    /// Brief description of expertise
    #[serde(default)]
    pub specialty: Option<String>,
    /// Historical era or time period
    #[serde(default)]
    pub era: Option<String>,
}

fn builtin(id: &str, name: &str, title: &str, era: &str, specialty: &str) -> Persona {
    Persona {
        id: id.to_string(),
        name: name.to_string(),
        title: title.to_string(),
        era: era.to_string(),
        specialty: specialty.to_string(),
        warning: None,
        kind: PersonaKind::BuiltIn,
    }
}

/// The built-in roster.
static BUILT_INS: Lazy<Vec<Persona>> = Lazy::new(|| {
    vec![
        builtin(
            "lincoln",
            "Abraham Lincoln",
            "16th President of the United States",
            "1809-1865",
            "Democracy, Civil Rights, Unity",
        ),
        builtin(
            "tesla",
            "Nikola Tesla",
            "Inventor and Electrical Engineer",
            "1856-1943",
            "Innovation, Science, Future Technology",
        ),
        Persona {
            warning: Some(
                "Depicted for historical education; era-specific views do not \
                 reflect modern values."
                    .to_string(),
            ),
            ..builtin(
                "machiavelli",
                "Niccolo Machiavelli",
                "Political Philosopher and Diplomat",
                "1469-1527",
                "Statecraft, Power, Political Realism",
            )
        },
    ]
});

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Turn a display name into a persona id slug
/// (e.g. "King Mahendra" -> "king_mahendra").
pub fn slugify(name: &str) -> String {
    let lower = name.to_lowercase();
    let cleaned = NON_WORD.replace_all(&lower, "");
    let mut id = WHITESPACE
        .replace_all(cleaned.trim(), "_")
        .trim_matches('_')
        .to_string();
    if id.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        id = format!("figure_{id}");
    }
    id
}

/// Uniform lookup over built-in and custom personas, plus the lifecycle of
/// custom figures and their cached retrieval contexts.
pub struct PersonaRegistry {
    store: CustomPersonaStore,
    wiki: WikipediaClient,
    /// Runtime cache of retrieval contexts, keyed by persona id.
    contexts: RwLock<HashMap<String, Arc<RetrievalContext>>>,
}

impl PersonaRegistry {
    pub fn new(store: CustomPersonaStore, wiki: WikipediaClient) -> Self {
        Self {
            store,
            wiki,
            contexts: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a persona id, built-ins first, then the custom store.
    pub fn resolve(&self, persona_id: &str) -> Result<Persona> {
        BUILT_INS
            .iter()
            .find(|p| p.id == persona_id)
            .cloned()
            .or_else(|| self.store.get(persona_id))
            .ok_or_else(|| ArenaError::PersonaNotFound(persona_id.to_string()))
    }

    /// All personas: built-ins followed by custom figures.
    pub fn list(&self) -> Vec<Persona> {
        let mut personas = BUILT_INS.clone();
        personas.extend(self.store.list());
        personas
    }

    /// Create a custom persona grounded in Wikipedia.
    ///
    /// Validates the topic against Wikipedia, fetches extracts for it and any
    /// related topics, builds the retrieval context, and persists the record.
    /// Slow (external retrieval) — callers must await the full call. Nothing
    /// is persisted when validation fails.
    pub async fn create_custom(&self, req: CreateCustomPersona) -> Result<Persona> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(ArenaError::Validation("figure name is required".into()));
        }
        if req.topic.trim().is_empty() {
            return Err(ArenaError::Validation("topic is required".into()));
        }

        let id = slugify(name);
        if id.is_empty() {
            return Err(ArenaError::Validation(format!(
                "figure name '{}' does not produce a usable identifier",
                name
            )));
        }
        if self.resolve(&id).is_ok() {
            return Err(ArenaError::Validation(format!(
                "figure '{}' already exists; use the existing figure or choose a different name",
                name
            )));
        }

        tracing::info!("Validating Wikipedia existence for: {}", req.topic);
        let Some(main_extract) = self.wiki.fetch_extract(&req.topic).await? else {
            return Err(ArenaError::PersonaValidation(format!(
                "could not find '{}' on Wikipedia; verify the name is correct and the figure \
                 is well-known enough to have an article",
                req.topic
            )));
        };

        let mut articles = vec![main_extract];
        for topic in &req.related_topics {
            match self.wiki.fetch_extract(topic).await {
                Ok(Some(extract)) => articles.push(extract),
                Ok(None) => tracing::warn!("No Wikipedia article for related topic: {}", topic),
                Err(e) => tracing::warn!("Failed to load related topic {}: {}", topic, e),
            }
        }

        let context = RetrievalContext::build(&articles);
        tracing::info!(
            "Retrieval context for {}: {} chunks indexed",
            name,
            context.len()
        );

        let persona = Persona {
            id: id.clone(),
            name: name.to_string(),
            title: "Community-created figure".to_string(),
            era: req.era.unwrap_or_else(|| "Historical Figure".to_string()),
            specialty: req
                .specialty
                .unwrap_or_else(|| "Historical perspective".to_string()),
            warning: None,
            kind: PersonaKind::Custom {
                topic: req.topic,
                related_topics: req.related_topics,
            },
        };

        self.store.insert(persona.clone())?;
        self.contexts
            .write()
            .expect("context cache lock poisoned")
            .insert(id, Arc::new(context));

        tracing::info!("Created custom persona: {} ({})", persona.name, persona.id);
        Ok(persona)
    }

    /// Delete a custom persona and evict its cached retrieval context.
    /// Built-ins cannot be deleted.
    pub fn delete_custom(&self, persona_id: &str) -> Result<()> {
        if BUILT_INS.iter().any(|p| p.id == persona_id) {
            return Err(ArenaError::Validation(format!(
                "'{}' is a built-in persona and cannot be deleted",
                persona_id
            )));
        }
        if !self.store.remove(persona_id)? {
            return Err(ArenaError::PersonaNotFound(persona_id.to_string()));
        }
        self.contexts
            .write()
            .expect("context cache lock poisoned")
            .remove(persona_id);
        tracing::info!("Deleted custom persona: {}", persona_id);
        Ok(())
    }

    /// Retrieval context for a persona, rebuilding it from Wikipedia when the
    /// process has restarted since the persona was created. Built-ins and
    /// rebuild failures yield `None`; persona replies then run without
    /// grounding context rather than failing the turn.
    pub async fn context_for(&self, persona: &Persona) -> Option<Arc<RetrievalContext>> {
        let PersonaKind::Custom {
            topic,
            related_topics,
        } = &persona.kind
        else {
            return None;
        };

        if let Some(ctx) = self
            .contexts
            .read()
            .expect("context cache lock poisoned")
            .get(&persona.id)
        {
            return Some(Arc::clone(ctx));
        }

        tracing::info!("Rebuilding retrieval context for: {}", persona.id);
        let mut articles = Vec::new();
        for topic in std::iter::once(topic).chain(related_topics.iter()) {
            match self.wiki.fetch_extract(topic).await {
                Ok(Some(extract)) => articles.push(extract),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Context rebuild failed for {}: {}", persona.id, e);
                    return None;
                }
            }
        }
        if articles.is_empty() {
            return None;
        }

        let context = Arc::new(RetrievalContext::build(&articles));
        self.contexts
            .write()
            .expect("context cache lock poisoned")
            .insert(persona.id.clone(), Arc::clone(&context));
        Some(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_registry(dir: &std::path::Path) -> PersonaRegistry {
        let store = CustomPersonaStore::open(dir).expect("open store");
        let wiki = WikipediaClient::new("http://127.0.0.1:1/api/rest_v1");
        PersonaRegistry::new(store, wiki)
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("King Mahendra"), "king_mahendra");
        assert_eq!(slugify("W.E.B. Du Bois"), "web_du_bois");
        assert_eq!(slugify("  Ada   Lovelace  "), "ada_lovelace");
        assert_eq!(slugify("14th Dalai Lama"), "figure_14th_dalai_lama");
    }

    #[test]
    fn test_resolve_builtin() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = test_registry(dir.path());
        let persona = registry.resolve("lincoln").expect("lincoln exists");
        assert_eq!(persona.name, "Abraham Lincoln");
        assert_eq!(persona.kind, PersonaKind::BuiltIn);
    }

    #[test]
    fn test_resolve_unknown_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = test_registry(dir.path());
        let err = registry.resolve("socrates").expect_err("unknown persona");
        assert!(matches!(err, ArenaError::PersonaNotFound(_)));
    }

    #[test]
    fn test_list_merges_sources() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = test_registry(dir.path());
        registry
            .store
            .insert(Persona {
                id: "curie".into(),
                name: "Marie Curie".into(),
                title: "Community-created figure".into(),
                era: "1867-1934".into(),
                specialty: "Radioactivity".into(),
                warning: None,
                kind: PersonaKind::Custom {
                    topic: "Marie Curie".into(),
                    related_topics: vec![],
                },
            })
            .expect("insert");

        let personas = registry.list();
        assert_eq!(personas.len(), BUILT_INS.len() + 1);
        assert!(personas.iter().any(|p| p.id == "curie"));
        // Built-ins come first
        assert_eq!(personas[0].kind, PersonaKind::BuiltIn);
    }

    #[test]
    fn test_builtin_warning_flag() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = test_registry(dir.path());
        let persona = registry.resolve("machiavelli").expect("machiavelli exists");
        assert!(persona.warning.is_some());
    }

    #[test]
    fn test_delete_builtin_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = test_registry(dir.path());
        let err = registry.delete_custom("lincoln").expect_err("must reject");
        assert!(matches!(err, ArenaError::Validation(_)));
    }

    #[test]
    fn test_delete_unknown_custom_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = test_registry(dir.path());
        let err = registry.delete_custom("nobody").expect_err("absent");
        assert!(matches!(err, ArenaError::PersonaNotFound(_)));
    }

    #[tokio::test]
    async fn test_create_custom_rejects_blank_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = test_registry(dir.path());
        let err = registry
            .create_custom(CreateCustomPersona {
                name: "   ".into(),
                topic: "Marie Curie".into(),
                related_topics: vec![],
                specialty: None,
                era: None,
            })
            .await
            .expect_err("blank name");
        assert!(matches!(err, ArenaError::Validation(_)));
        assert!(registry.list().iter().all(|p| !p.is_custom()));
    }

    #[tokio::test]
    async fn test_create_custom_duplicate_of_builtin_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = test_registry(dir.path());
        let err = registry
            .create_custom(CreateCustomPersona {
                name: "Tesla".into(),
                topic: "Nikola Tesla".into(),
                related_topics: vec![],
                specialty: None,
                era: None,
            })
            .await
            .expect_err("collides with built-in id");
        assert!(matches!(err, ArenaError::Validation(_)));
    }
}
