//! JSON-file-backed store for custom personas.
//!
//! One `figures.json` under the data directory holds an array of custom
//! persona records. The file is read once at startup; every mutation rewrites
//! it through a temp-file + rename so a crash mid-write never corrupts the
//! store. All access goes through an internal lock, which also serializes
//! concurrent creations onto the file.

use super::Persona;
use crate::error::{ArenaError, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

const FIGURES_FILE: &str = "figures.json";

#[derive(Debug)]
pub struct CustomPersonaStore {
    path: PathBuf,
    records: RwLock<HashMap<String, Persona>>,
}

impl CustomPersonaStore {
    /// Open (or initialize) the store under `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .map_err(|e| ArenaError::Storage(format!("create {}: {}", data_dir.display(), e)))?;
        let path = data_dir.join(FIGURES_FILE);

        let records = if path.exists() {
            let contents = fs::read_to_string(&path)
                .map_err(|e| ArenaError::Storage(format!("read {}: {}", path.display(), e)))?;
            let personas: Vec<Persona> = serde_json::from_str(&contents)
                .map_err(|e| ArenaError::Storage(format!("parse {}: {}", path.display(), e)))?;
            tracing::info!("Loaded {} custom personas from storage", personas.len());
            personas.into_iter().map(|p| (p.id.clone(), p)).collect()
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    pub fn get(&self, persona_id: &str) -> Option<Persona> {
        self.records
            .read()
            .expect("persona store lock poisoned")
            .get(persona_id)
            .cloned()
    }

    /// All stored personas, ordered by id for stable listings.
    pub fn list(&self) -> Vec<Persona> {
        let records = self.records.read().expect("persona store lock poisoned");
        let mut personas: Vec<Persona> = records.values().cloned().collect();
        personas.sort_by(|a, b| a.id.cmp(&b.id));
        personas
    }

    /// Insert a new persona and persist the store. Fails if the id is taken.
    pub fn insert(&self, persona: Persona) -> Result<()> {
        let mut records = self.records.write().expect("persona store lock poisoned");
        if records.contains_key(&persona.id) {
            return Err(ArenaError::Validation(format!(
                "persona '{}' already exists",
                persona.id
            )));
        }
        records.insert(persona.id.clone(), persona);
        self.persist(&records)
    }

    /// Remove a persona and persist the store. Returns whether it existed.
    pub fn remove(&self, persona_id: &str) -> Result<bool> {
        let mut records = self.records.write().expect("persona store lock poisoned");
        if records.remove(persona_id).is_none() {
            return Ok(false);
        }
        self.persist(&records)?;
        Ok(true)
    }

    fn persist(&self, records: &HashMap<String, Persona>) -> Result<()> {
        let mut personas: Vec<&Persona> = records.values().collect();
        personas.sort_by(|a, b| a.id.cmp(&b.id));

        let json = serde_json::to_string_pretty(&personas)
            .map_err(|e| ArenaError::Storage(format!("serialize personas: {}", e)))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .map_err(|e| ArenaError::Storage(format!("write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| ArenaError::Storage(format!("rename {}: {}", self.path.display(), e)))?;

        tracing::debug!("Saved {} custom personas to storage", personas.len());
        Ok(())
    }
}
