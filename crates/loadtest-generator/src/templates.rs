//! Payload templates loaded from a directory.
//!
//! One file per event type. The event-type key is the file name up to the
//! first `.`, so `track.json` and `track.json.tmpl` both provide `track`.

use crate::error::GeneratorError;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Named payload templates, immutable after loading.
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    templates: BTreeMap<String, Arc<str>>,
}

impl TemplateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every template file in `dir`.
    ///
    /// Hidden files and sub-directories are skipped. Two files resolving to
    /// the same key are rejected.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self, GeneratorError> {
        let dir = dir.as_ref();
        let mut store = Self::new();

        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            let Some(key) = template_key(&file_name) else {
                debug!("Skipping template candidate '{}'", file_name);
                continue;
            };

            let body = std::fs::read_to_string(entry.path())?;
            if store.templates.contains_key(key) {
                return Err(GeneratorError::Io(std::io::Error::other(format!(
                    "duplicate template for event type '{key}' in {}",
                    dir.display()
                ))));
            }
            store.insert(key, body);
        }

        info!(
            "Loaded {} templates from {}: {:?}",
            store.len(),
            dir.display(),
            store.names().collect::<Vec<_>>()
        );

        Ok(store)
    }

    /// Add or replace a template.
    pub fn insert(&mut self, name: impl Into<String>, body: impl Into<String>) {
        let body: String = body.into();
        self.templates.insert(name.into(), Arc::from(body.trim_end()));
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_template(mut self, name: impl Into<String>, body: impl Into<String>) -> Self {
        self.insert(name, body);
        self
    }

    /// Template body for an event type.
    pub fn get(&self, name: &str) -> Option<Arc<str>> {
        self.templates.get(name).cloned()
    }

    /// Template body for an event type, or a configuration error.
    pub fn require(&self, name: &str) -> Result<Arc<str>, GeneratorError> {
        self.get(name)
            .ok_or_else(|| GeneratorError::TemplateNotFound(name.to_string()))
    }

    /// Template keys in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Event-type key for a template file name.
fn template_key(file_name: &str) -> Option<&str> {
    if file_name.starts_with('.') {
        return None;
    }
    let key = file_name.split('.').next().unwrap_or(file_name);
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}
