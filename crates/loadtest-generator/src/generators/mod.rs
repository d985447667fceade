//! Event generators bound to payload templates.
//!
//! Built-in shapes (`page`, `track`, `identify`, `batch`) are resolved to
//! [`EventKind`] variants. Any template whose name starts with
//! [`CUSTOM_PREFIX`] is registered as [`EventKind::Custom`] and rendered with
//! the generic single-element generator, so a new custom event type needs only
//! a template file and a config entry.

pub mod batch;
pub mod render;
pub mod timestamp;
pub mod uuid;

use crate::error::GeneratorError;
use crate::event_type::EventTypeSpec;
use crate::templates::TemplateStore;
use batch::{render_batch, BatchComposition, BatchTemplates};
use render::{render, Placeholders};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Name prefix that marks an event type as custom.
pub const CUSTOM_PREFIX: &str = "custom-";

/// Shape of a generated event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    Page,
    Track,
    Identify,
    Batch,
    /// Template-only event type, carrying its full name.
    Custom(String),
}

impl EventKind {
    /// Event type name as used in `EVENT_TYPES` and template keys.
    pub fn name(&self) -> &str {
        match self {
            EventKind::Page => "page",
            EventKind::Track => "track",
            EventKind::Identify => "identify",
            EventKind::Batch => "batch",
            EventKind::Custom(name) => name,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Name to [`EventKind`] registration table, built once at startup.
#[derive(Debug, Clone)]
pub struct EventRegistry {
    kinds: HashMap<String, EventKind>,
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl EventRegistry {
    /// Registry containing the built-in shapes.
    pub fn with_builtins() -> Self {
        let kinds = [
            EventKind::Page,
            EventKind::Track,
            EventKind::Identify,
            EventKind::Batch,
        ]
        .into_iter()
        .map(|kind| (kind.name().to_string(), kind))
        .collect();
        Self { kinds }
    }

    /// Register a custom event type.
    ///
    /// Returns `false` and does nothing unless `name` carries
    /// [`CUSTOM_PREFIX`].
    pub fn register_custom(&mut self, name: &str) -> bool {
        if !name.starts_with(CUSTOM_PREFIX) || name.len() == CUSTOM_PREFIX.len() {
            return false;
        }
        self.kinds
            .insert(name.to_string(), EventKind::Custom(name.to_string()));
        true
    }

    /// Register every custom template found in `store`.
    pub fn register_templates(&mut self, store: &TemplateStore) -> usize {
        let mut registered = 0;
        for name in store.names() {
            if self.register_custom(name) {
                debug!("Registered custom event type '{}'", name);
                registered += 1;
            }
        }
        if registered > 0 {
            info!("Registered {} custom event types", registered);
        }
        registered
    }

    pub fn resolve(&self, name: &str) -> Option<&EventKind> {
        self.kinds.get(name)
    }
}

/// Per-message values shared by every element rendered for it.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub user_id: &'a str,
    pub run_id: &'a str,
}

#[derive(Debug, Clone)]
enum Shape {
    Single(Arc<str>),
    Batch {
        templates: BatchTemplates,
        composition: Option<BatchComposition>,
    },
}

/// Generator for one configured event type.
#[derive(Debug, Clone)]
pub struct EventGenerator {
    spec: EventTypeSpec,
    kind: EventKind,
    shape: Shape,
}

impl EventGenerator {
    /// Resolve `spec` against the registry and bind its templates.
    pub fn build(
        spec: &EventTypeSpec,
        registry: &EventRegistry,
        store: &TemplateStore,
    ) -> Result<Self, GeneratorError> {
        let kind = registry
            .resolve(&spec.name)
            .cloned()
            .ok_or_else(|| GeneratorError::UnknownEventType(spec.name.clone()))?;

        let shape = match kind {
            EventKind::Batch => {
                let composition = if spec.values.is_empty() {
                    None
                } else {
                    Some(BatchComposition::from_values(&spec.values).map_err(|reason| {
                        GeneratorError::InvalidEventTypes {
                            input: spec.to_string(),
                            reason,
                        }
                    })?)
                };
                let templates = BatchTemplates {
                    envelope: store.require("batch")?,
                    page: store.get("page"),
                    track: store.get("track"),
                    identify: store.get("identify"),
                };
                templates.validate(composition.as_ref())?;
                Shape::Batch {
                    templates,
                    composition,
                }
            }
            _ => Shape::Single(store.require(kind.name())?),
        };

        Ok(Self {
            spec: spec.clone(),
            kind,
            shape,
        })
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    pub fn spec(&self) -> &EventTypeSpec {
        &self.spec
    }

    /// Whether this generator draws its size from the batch-size table.
    pub fn uses_batch_size(&self) -> bool {
        matches!(
            self.shape,
            Shape::Batch {
                composition: None,
                ..
            }
        )
    }

    /// Number of events a message from this generator carries.
    pub fn event_count(&self, batch_count: u32) -> u64 {
        match &self.shape {
            Shape::Single(_) => 1,
            Shape::Batch {
                composition: Some(c),
                ..
            } => c.total(),
            Shape::Batch {
                composition: None, ..
            } => u64::from(batch_count),
        }
    }

    /// Render one payload.
    ///
    /// `batch_count` is only used by plain `batch` generators.
    pub fn generate(&self, ctx: &RenderContext<'_>, batch_count: u32) -> Vec<u8> {
        let timestamp = timestamp::now_rfc3339();
        match &self.shape {
            Shape::Single(template) => {
                let message_id = uuid::new_message_id();
                render(
                    template,
                    &Placeholders {
                        message_id: &message_id,
                        user_id: ctx.user_id,
                        run_id: ctx.run_id,
                        timestamp: &timestamp,
                        events: None,
                    },
                )
                .into_bytes()
            }
            Shape::Batch {
                templates,
                composition,
            } => render_batch(
                templates,
                composition.as_ref(),
                batch_count,
                ctx.user_id,
                ctx.run_id,
                &timestamp,
            )
            .into_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> TemplateStore {
        TemplateStore::new()
            .with_template("page", r#"{"type":"page","userId":"{{user_id}}"}"#)
            .with_template(
                "track",
                r#"{"type":"track","userId":"{{user_id}}","runId":"{{run_id}}"}"#,
            )
            .with_template("identify", r#"{"type":"identify"}"#)
            .with_template("batch", r#"{"batch":[{{events}}]}"#)
            .with_template("custom-checkout", r#"{"type":"checkout","id":"{{message_id}}"}"#)
            .with_template("other", r#"{"type":"other"}"#)
    }

    fn ctx() -> RenderContext<'static> {
        RenderContext {
            user_id: "user-1",
            run_id: "run-1",
        }
    }

    #[test]
    fn test_builtins_resolve() {
        let registry = EventRegistry::with_builtins();
        assert_eq!(registry.resolve("page"), Some(&EventKind::Page));
        assert_eq!(registry.resolve("batch"), Some(&EventKind::Batch));
        assert_eq!(registry.resolve("custom-checkout"), None);
    }

    #[test]
    fn test_register_custom_requires_prefix() {
        let mut registry = EventRegistry::with_builtins();
        assert!(!registry.register_custom("checkout"));
        assert!(registry.resolve("checkout").is_none());
        assert!(!registry.register_custom("custom-"));

        assert!(registry.register_custom("custom-checkout"));
        assert_eq!(
            registry.resolve("custom-checkout"),
            Some(&EventKind::Custom("custom-checkout".to_string()))
        );
    }

    #[test]
    fn test_register_templates() {
        let mut registry = EventRegistry::with_builtins();
        assert_eq!(registry.register_templates(&store()), 1);
        assert!(registry.resolve("custom-checkout").is_some());
        assert!(registry.resolve("other").is_none());
    }

    #[test]
    fn test_custom_generator_renders_template() {
        let store = store();
        let mut registry = EventRegistry::with_builtins();
        registry.register_templates(&store);

        let generator =
            EventGenerator::build(&EventTypeSpec::new("custom-checkout"), &registry, &store)
                .unwrap();
        let payload: serde_json::Value =
            serde_json::from_slice(&generator.generate(&ctx(), 1)).unwrap();
        assert_eq!(payload["type"], "checkout");
        assert_eq!(generator.event_count(5), 1);
    }

    #[test]
    fn test_single_generator() {
        let store = store();
        let registry = EventRegistry::with_builtins();
        let generator =
            EventGenerator::build(&EventTypeSpec::new("track"), &registry, &store).unwrap();

        let payload: serde_json::Value =
            serde_json::from_slice(&generator.generate(&ctx(), 3)).unwrap();
        assert_eq!(payload["type"], "track");
        assert_eq!(payload["userId"], "user-1");
        assert_eq!(payload["runId"], "run-1");
        assert!(!generator.uses_batch_size());
    }

    #[test]
    fn test_batch_generator_uses_batch_count() {
        let store = store();
        let registry = EventRegistry::with_builtins();
        let generator =
            EventGenerator::build(&EventTypeSpec::new("batch"), &registry, &store).unwrap();
        assert!(generator.uses_batch_size());
        assert_eq!(generator.event_count(4), 4);

        let payload: serde_json::Value =
            serde_json::from_slice(&generator.generate(&ctx(), 4)).unwrap();
        assert_eq!(payload["batch"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_batch_generator_with_composition() {
        let store = store();
        let registry = EventRegistry::with_builtins();
        let generator = EventGenerator::build(
            &EventTypeSpec::with_values("batch", vec![2, 3]),
            &registry,
            &store,
        )
        .unwrap();
        assert!(!generator.uses_batch_size());
        assert_eq!(generator.event_count(1), 5);

        let payload: serde_json::Value =
            serde_json::from_slice(&generator.generate(&ctx(), 1)).unwrap();
        assert_eq!(payload["batch"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_build_errors() {
        let registry = EventRegistry::with_builtins();
        let store = store();

        assert!(matches!(
            EventGenerator::build(&EventTypeSpec::new("alias"), &registry, &store),
            Err(GeneratorError::UnknownEventType(_))
        ));

        let empty = TemplateStore::new();
        assert!(matches!(
            EventGenerator::build(&EventTypeSpec::new("track"), &registry, &empty),
            Err(GeneratorError::TemplateNotFound(_))
        ));

        assert!(matches!(
            EventGenerator::build(
                &EventTypeSpec::with_values("batch", vec![0, 0, 0]),
                &registry,
                &store
            ),
            Err(GeneratorError::InvalidEventTypes { .. })
        ));
    }
}
