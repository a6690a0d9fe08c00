//! The institutional knowledge document.
//!
//! A free-form YAML mapping (courses, contacts, programs, ...) that grounds
//! both the canned replies and the completion fallback. No schema is
//! enforced; readers fall back to defaults when a field is missing.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde_yaml::{Mapping, Value};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("failed to read '{}': {source}", .path.display())]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to parse '{}': {source}", .path.display())]
    Parse { path: PathBuf, source: serde_yaml::Error },
    #[error("failed to write '{}': {source}", .path.display())]
    Write { path: PathBuf, source: std::io::Error },
    #[error("{0}")]
    InvalidJson(serde_json::Error),
    #[error("update must be a JSON object")]
    NotAnObject,
    #[error("cannot represent update as YAML: {0}")]
    Convert(serde_yaml::Error),
}

/// Merge `source` into `target`. Nested mappings merge key-wise; every
/// other value in `source` replaces the one in `target`.
pub fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Mapping(target), Value::Mapping(source)) => merge_mappings(target, source),
        (target, source) => *target = source,
    }
}

fn merge_mappings(target: &mut Mapping, source: Mapping) {
    for (key, value) in source {
        let nested = matches!(
            (target.get(&key), &value),
            (Some(Value::Mapping(_)), Value::Mapping(_))
        );
        if !nested {
            target.insert(key, value);
        } else if let Some(existing) = target.get_mut(&key) {
            deep_merge(existing, value);
        }
    }
}

/// Render a scalar for display. Mappings, sequences and null have no text.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

/// Whether a value counts as "set": not null, false, zero or empty.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Sequence(items) => !items.is_empty(),
        Value::Mapping(map) => !map.is_empty(),
        Value::Tagged(tagged) => is_truthy(&tagged.value),
    }
}

/// A read-only snapshot of the document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Knowledge(Value);

impl Knowledge {
    pub fn new(doc: Value) -> Self {
        Self(doc)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn lookup(&self, path: &[&str]) -> Option<&Value> {
        path.iter().try_fold(&self.0, |node, key| node.get(*key))
    }

    /// Scalar at `path` as text, or `default` when absent or not a scalar.
    pub fn text_or(&self, path: &[&str], default: &str) -> String {
        self.lookup(path)
            .and_then(scalar_text)
            .unwrap_or_else(|| default.to_string())
    }

    /// The general enquiries phone number.
    pub fn contact_phone(&self) -> String {
        self.text_or(&["contacts", "phone"], "N/A")
    }

    /// Entries of the mapping at `path`, in document order.
    pub fn entries(&self, path: &[&str]) -> Vec<&Value> {
        match self.lookup(path) {
            Some(Value::Mapping(map)) => map.values().collect(),
            _ => Vec::new(),
        }
    }

    /// Items of the sequence at `path`.
    pub fn items(&self, path: &[&str]) -> &[Value] {
        match self.lookup(path) {
            Some(Value::Sequence(items)) => items,
            _ => &[],
        }
    }

    /// The whole document as YAML, keys in document order.
    pub fn text_summary(&self) -> String {
        serde_yaml::to_string(&self.0).unwrap_or_default()
    }
}

/// The document held in memory, persisted to a YAML file on update.
pub struct KnowledgeStore {
    path: PathBuf,
    doc: RwLock<Knowledge>,
    /// Serializes read-merge-persist cycles of concurrent updates.
    update_lock: Mutex<()>,
}

impl KnowledgeStore {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, KnowledgeError> {
        let path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&path).map_err(|source| KnowledgeError::Read {
            path: path.clone(),
            source,
        })?;
        let doc: Value = serde_yaml::from_str(&content).map_err(|source| KnowledgeError::Parse {
            path: path.clone(),
            source,
        })?;
        info!("Loaded knowledge from {}", path.display());
        Ok(Self::with_document(path, doc))
    }

    pub fn with_document(path: PathBuf, doc: Value) -> Self {
        Self {
            path,
            doc: RwLock::new(Knowledge::new(doc)),
            update_lock: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Knowledge {
        self.doc.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Deep-merge a JSON object into the document and persist it.
    /// Returns the top-level keys of the update.
    pub async fn apply_update(&self, payload: &str) -> Result<Vec<String>, KnowledgeError> {
        let update: serde_json::Value =
            serde_json::from_str(payload).map_err(KnowledgeError::InvalidJson)?;
        let keys: Vec<String> = match &update {
            serde_json::Value::Object(map) => map.keys().cloned().collect(),
            _ => return Err(KnowledgeError::NotAnObject),
        };
        let update: Value = serde_yaml::to_value(update).map_err(KnowledgeError::Convert)?;

        let _guard = self.update_lock.lock().await;
        let mut next = self.snapshot().0;
        deep_merge(&mut next, update);
        self.persist(&next).await?;
        *self.doc.write().unwrap_or_else(PoisonError::into_inner) = Knowledge::new(next);

        info!("Knowledge updated: {}", keys.join(", "));
        Ok(keys)
    }

    /// Write to a sibling temp file, then rename over the original.
    async fn persist(&self, doc: &Value) -> Result<(), KnowledgeError> {
        let yaml = serde_yaml::to_string(doc).map_err(KnowledgeError::Convert)?;
        let tmp = self.path.with_extension("yaml.tmp");
        let write_err = |source| KnowledgeError::Write {
            path: self.path.clone(),
            source,
        };
        tokio::fs::write(&tmp, yaml).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(write_err)?;
        Ok(())
    }
}
