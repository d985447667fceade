//! Message assembly from the four concentration tables.

use crate::concentration::ConcentrationTable;
use crate::error::GeneratorError;
use crate::event_type::EventTypeSpec;
use crate::generators::{EventGenerator, EventRegistry, RenderContext};
use crate::sources::SourceSelector;
use crate::templates::TemplateStore;
use crate::users::UserSelector;
use rand::RngCore;
use std::sync::Arc;
use tracing::info;

/// One unit of work on the publish queue.
#[derive(Debug, Clone)]
pub struct Message {
    pub payload: Vec<u8>,
    pub user_id: String,
    /// Events carried by the payload, charged against the rate limit.
    pub no_of_events: u64,
    pub write_key: Arc<str>,
}

/// Anything that can produce messages for the engine's generator tasks.
///
/// Implementations are shared by every generator task; each task brings its
/// own RNG.
pub trait MessageSource: Send + Sync {
    fn next_message(&self, rng: &mut dyn RngCore) -> Message;
}

/// Inputs for [`MessageFactory::build`].
#[derive(Debug, Clone)]
pub struct FactoryConfig {
    pub total_users: u64,
    pub hot_user_groups: Vec<u32>,
    pub random_user_ids: bool,
    pub user_id_prefix: String,
    pub event_types: Vec<EventTypeSpec>,
    pub hot_event_types: Vec<u32>,
    pub batch_sizes: Vec<u32>,
    pub hot_batch_sizes: Vec<u32>,
    /// Sources owned by this replica.
    pub sources: Vec<String>,
    pub hot_sources: Option<Vec<u32>>,
    /// Correlation id shared by every message of the run.
    pub run_id: String,
}

/// Builds messages by sampling user, event type, batch size and source.
#[derive(Debug)]
pub struct MessageFactory {
    users: UserSelector,
    events: ConcentrationTable<EventGenerator>,
    batch_sizes: ConcentrationTable<u32>,
    sources: SourceSelector,
    run_id: String,
}

impl MessageFactory {
    /// Validate `config` against the templates and build every table.
    ///
    /// Templates carrying the custom prefix are registered as event types
    /// before `event_types` is resolved.
    pub fn build(config: FactoryConfig, store: &TemplateStore) -> Result<Self, GeneratorError> {
        let mut registry = EventRegistry::with_builtins();
        registry.register_templates(store);

        let generators = config
            .event_types
            .iter()
            .map(|spec| EventGenerator::build(spec, &registry, store))
            .collect::<Result<Vec<_>, _>>()?;
        let events =
            ConcentrationTable::new("HOT_EVENT_TYPES", generators, &config.hot_event_types)?;

        if let Some(zero) = config.batch_sizes.iter().position(|&s| s == 0) {
            return Err(GeneratorError::InvalidList {
                name: "BATCH_SIZES".to_string(),
                reason: format!("entry {zero} is 0, batch sizes must be positive"),
            });
        }
        let batch_sizes = ConcentrationTable::new(
            "HOT_BATCH_SIZES",
            config.batch_sizes.clone(),
            &config.hot_batch_sizes,
        )?;

        let users = UserSelector::new(
            config.total_users,
            &config.hot_user_groups,
            config.user_id_prefix.clone(),
            config.random_user_ids,
        )?;
        let sources = SourceSelector::new(&config.sources, config.hot_sources.as_deref())?;

        info!(
            "Message factory ready: event types {:?}, {} users, {} sources, run id {}",
            config
                .event_types
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>(),
            config.total_users,
            config.sources.len(),
            config.run_id
        );

        Ok(Self {
            users,
            events,
            batch_sizes,
            sources,
            run_id: config.run_id,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn event_generators(&self) -> &[EventGenerator] {
        self.events.candidates()
    }
}

impl MessageSource for MessageFactory {
    fn next_message(&self, rng: &mut dyn RngCore) -> Message {
        let user_id = self.users.next_user_id(rng);
        let generator = self.events.sample(rng);
        let batch_count = if generator.uses_batch_size() {
            *self.batch_sizes.sample(rng)
        } else {
            1
        };
        let write_key = self.sources.next_source(rng);

        let payload = generator.generate(
            &RenderContext {
                user_id: &user_id,
                run_id: &self.run_id,
            },
            batch_count,
        );

        Message {
            payload,
            no_of_events: generator.event_count(batch_count),
            user_id,
            write_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_type::parse_event_types;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn store() -> TemplateStore {
        TemplateStore::new()
            .with_template("page", r#"{"type":"page","userId":"{{user_id}}"}"#)
            .with_template(
                "track",
                r#"{"type":"track","userId":"{{user_id}}","messageId":"{{message_id}}"}"#,
            )
            .with_template("identify", r#"{"type":"identify","userId":"{{user_id}}"}"#)
            .with_template("batch", r#"{"batch":[{{events}}],"sentAt":"{{sent_at}}"}"#)
            .with_template("custom-signup", r#"{"type":"signup","runId":"{{run_id}}"}"#)
    }

    fn config(event_types: &str, hot_event_types: Vec<u32>) -> FactoryConfig {
        FactoryConfig {
            total_users: 100,
            hot_user_groups: vec![100],
            random_user_ids: false,
            user_id_prefix: "user".to_string(),
            event_types: parse_event_types(event_types).unwrap(),
            hot_event_types,
            batch_sizes: vec![1, 2, 3],
            hot_batch_sizes: vec![40, 30, 30],
            sources: vec!["wk-a".to_string(), "wk-b".to_string()],
            hot_sources: None,
            run_id: "run-42".to_string(),
        }
    }

    #[test]
    fn test_track_only() {
        let factory = MessageFactory::build(config("track", vec![100]), &store()).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..200 {
            let message = factory.next_message(&mut rng);
            let payload: serde_json::Value = serde_json::from_slice(&message.payload).unwrap();
            assert_eq!(payload["type"], "track");
            assert_eq!(payload["userId"], message.user_id.as_str());
            assert_eq!(message.no_of_events, 1);
            assert!(message.write_key.starts_with("wk-"));
        }
    }

    #[test]
    fn test_hot_event_types_sum_to_ninety() {
        let result = MessageFactory::build(config("track,page", vec![50, 40]), &store());
        match result {
            Err(GeneratorError::InvalidConcentration { name, reason }) => {
                assert_eq!(name, "HOT_EVENT_TYPES");
                assert!(reason.contains("90"));
            }
            other => panic!("expected InvalidConcentration, got {other:?}"),
        }
    }

    #[test]
    fn test_batch_event_count_matches_payload() {
        let factory = MessageFactory::build(config("batch", vec![100]), &store()).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..100 {
            let message = factory.next_message(&mut rng);
            let payload: serde_json::Value = serde_json::from_slice(&message.payload).unwrap();
            let elements = payload["batch"].as_array().unwrap().len() as u64;
            assert_eq!(elements, message.no_of_events);
            assert!((1..=3).contains(&elements));
        }
    }

    #[test]
    fn test_custom_event_type_from_template() {
        let factory = MessageFactory::build(config("custom-signup", vec![100]), &store()).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let message = factory.next_message(&mut rng);
        let payload: serde_json::Value = serde_json::from_slice(&message.payload).unwrap();
        assert_eq!(payload["type"], "signup");
        assert_eq!(payload["runId"], "run-42");
    }

    #[test]
    fn test_build_errors() {
        let store = store();
        assert!(matches!(
            MessageFactory::build(config("checkout", vec![100]), &store),
            Err(GeneratorError::UnknownEventType(_))
        ));

        let mut bad_batch = config("track", vec![100]);
        bad_batch.batch_sizes = vec![0, 1, 2];
        assert!(matches!(
            MessageFactory::build(bad_batch, &store),
            Err(GeneratorError::InvalidList { .. })
        ));

        let mut bad_users = config("track", vec![100]);
        bad_users.hot_user_groups = vec![50, 40];
        assert!(MessageFactory::build(bad_users, &store).is_err());
    }
}
