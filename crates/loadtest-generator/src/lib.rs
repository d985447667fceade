//! Message generation for the event-loadtest traffic generator.
//!
//! This crate turns configuration (event types, hot percentages, user counts,
//! sources) into a [`MessageFactory`] that produces one [`Message`] per call.
//! Every weighted choice goes through a [`ConcentrationTable`]: a 100-slot
//! lookup array built once at startup and sampled with a uniform index.
//!
//! # Architecture
//!
//! ```text
//! TEMPLATES_PATH/*.json          EVENT_TYPES / HOT_* percentages
//!        │                                 │
//!        ▼                                 ▼
//! ┌─────────────────┐            ┌────────────────────┐
//! │  TemplateStore  │──────────▶ │ ConcentrationTable │ x4
//! └─────────────────┘            │ users / events /   │
//!                                │ batch / sources    │
//!                                └─────────┬──────────┘
//!                                          ▼
//!                                 ┌─────────────────┐
//!                                 │ MessageFactory  │
//!                                 └────────┬────────┘
//!                                          ▼
//!                    Message { payload, user_id, no_of_events, write_key }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use loadtest_generator::{FactoryConfig, MessageFactory, MessageSource, TemplateStore};
//!
//! let store = TemplateStore::load_dir("./templates")?;
//! let factory = MessageFactory::build(config, &store)?;
//! let mut rng = rand::rngs::StdRng::from_os_rng();
//! let message = factory.next_message(&mut rng);
//! ```

pub mod concentration;
pub mod error;
pub mod event_type;
pub mod generators;
pub mod message;
pub mod sources;
pub mod templates;
pub mod users;

// Re-exports for convenience
pub use concentration::{parse_percentages, ConcentrationTable, CONCENTRATION_SLOTS};
pub use error::GeneratorError;
pub use event_type::{parse_event_types, parse_int_list, EventTypeSpec};
pub use generators::{EventGenerator, EventKind, EventRegistry, RenderContext, CUSTOM_PREFIX};
pub use message::{FactoryConfig, Message, MessageFactory, MessageSource};
pub use sources::{partition_sources, SourceSelector};
pub use templates::TemplateStore;
pub use users::UserSelector;
