//! Local preferences persisted as one JSON object in the data directory.
//!
//! Values are opaque JSON blobs per key; typed helpers cover the
//! well-known keys.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::data_dir;
use crate::error::ClientError;

pub const PREFS_FILE: &str = "prefs.json";
pub const PHYSICS_KEY: &str = "physics";
pub const TUTORIAL_KEY: &str = "tutorial";
pub const TEMPLATES_KEY: &str = "prompt_templates";

/// Force-layout tuning kept for whichever renderer runs a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsPrefs {
    pub enabled: bool,
    pub gravitational_constant: f64,
    pub central_gravity: f64,
    pub spring_length: f64,
    pub spring_constant: f64,
    pub damping: f64,
    pub avoid_overlap: f64,
}

impl Default for PhysicsPrefs {
    fn default() -> Self {
        Self {
            enabled: true,
            gravitational_constant: -8000.0,
            central_gravity: 0.3,
            spring_length: 95.0,
            spring_constant: 0.04,
            damping: 0.09,
            avoid_overlap: 0.2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TutorialFlags {
    pub completed: bool,
    pub seen_steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub name: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PromptTemplate {
    /// Replace `{{var}}` placeholders. Unknown placeholders are left as is.
    pub fn render(&self, vars: &BTreeMap<String, String>) -> String {
        let mut out = self.body.clone();
        for (name, value) in vars {
            out = out.replace(&format!("{{{{{name}}}}}"), value);
        }
        out
    }
}

pub struct PrefsStore {
    path: PathBuf,
    values: Map<String, Value>,
}

impl PrefsStore {
    pub fn default_path() -> PathBuf {
        data_dir().join(PREFS_FILE)
    }

    pub fn open_default() -> Result<Self, ClientError> {
        Self::open(Self::default_path())
    }

    /// A missing file is an empty store. A corrupt file is logged and
    /// treated as empty; it is replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ClientError> {
        let path = path.into();
        let values = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
                Ok(Value::Object(map)) => map,
                Ok(_) | Err(_) => {
                    tracing::warn!(path = %path.display(), "Preferences file is corrupt, starting empty");
                    Map::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: Value) -> Result<(), ClientError> {
        self.values.insert(key.to_string(), value);
        self.save()
    }

    pub fn remove(&mut self, key: &str) -> Result<bool, ClientError> {
        let removed = self.values.remove(key).is_some();
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    pub fn physics(&self) -> PhysicsPrefs {
        self.typed(PHYSICS_KEY)
    }

    pub fn set_physics(&mut self, physics: &PhysicsPrefs) -> Result<(), ClientError> {
        self.set(PHYSICS_KEY, to_value(physics)?)
    }

    pub fn tutorial(&self) -> TutorialFlags {
        self.typed(TUTORIAL_KEY)
    }

    pub fn mark_tutorial_step(&mut self, step: &str) -> Result<(), ClientError> {
        let mut flags = self.tutorial();
        if !flags.seen_steps.iter().any(|s| s == step) {
            flags.seen_steps.push(step.to_string());
        }
        self.set(TUTORIAL_KEY, to_value(&flags)?)
    }

    pub fn complete_tutorial(&mut self) -> Result<(), ClientError> {
        let mut flags = self.tutorial();
        flags.completed = true;
        self.set(TUTORIAL_KEY, to_value(&flags)?)
    }

    pub fn templates(&self) -> Vec<PromptTemplate> {
        self.typed(TEMPLATES_KEY)
    }

    pub fn template(&self, name: &str) -> Option<PromptTemplate> {
        self.templates().into_iter().find(|t| t.name == name)
    }

    /// Insert or replace by name.
    pub fn upsert_template(&mut self, template: PromptTemplate) -> Result<(), ClientError> {
        let mut all = self.templates();
        match all.iter_mut().find(|t| t.name == template.name) {
            Some(existing) => *existing = template,
            None => all.push(template),
        }
        self.set(TEMPLATES_KEY, to_value(&all)?)
    }

    pub fn remove_template(&mut self, name: &str) -> Result<bool, ClientError> {
        let mut all = self.templates();
        let before = all.len();
        all.retain(|t| t.name != name);
        if all.len() == before {
            return Ok(false);
        }
        self.set(TEMPLATES_KEY, to_value(&all)?)?;
        Ok(true)
    }

    fn typed<T: serde::de::DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.values.get(key) {
            Some(raw) => serde_json::from_value(raw.clone()).unwrap_or_else(|e| {
                tracing::warn!(key, error = %e, "Ignoring unreadable preference");
                T::default()
            }),
            None => T::default(),
        }
    }

    /// Write to a sibling temp file, then rename over the target.
    fn save(&self) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(&self.values)
            .map_err(|e| ClientError::Config(format!("cannot encode preferences: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = %self.path.display(), keys = self.values.len(), "Preferences saved");
        Ok(())
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, ClientError> {
    serde_json::to_value(value)
        .map_err(|e| ClientError::Config(format!("cannot encode preference: {e}")))
}
