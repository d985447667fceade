//! Publishing engine for the event-loadtest traffic generator.
//!
//! This crate runs the generate → queue → admit → publish pipeline:
//! 1. Generator tasks draw messages from a [`MessageSource`](loadtest_generator::MessageSource)
//! 2. Worker tasks pop them from a bounded queue
//! 3. Each worker asks the [`RateLimiter`] for budget, then publishes through
//!    a [`Publisher`](loadtest_transport::Publisher)
//!
//! # Example
//!
//! ```ignore
//! use loadtest_framework::{limiter_for_rate, EngineConfig, EngineMetrics, PublishingEngine};
//! use loadtest_transport::{connect, TransportConfig};
//!
//! let engine = PublishingEngine::new(
//!     EngineConfig::new(200, 4),
//!     Arc::new(factory),
//!     limiter_for_rate(10_000),
//!     EngineMetrics::new()?,
//! );
//! let transport = TransportConfig::Stdout;
//! let report = engine
//!     .run(&|slot| connect(&transport, slot), cancel.clone())
//!     .await?;
//! println!("{}", report.summary());
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod log_throttle;
pub mod metrics;
pub mod rate_limiter;
pub mod report;
pub mod run_state;
pub mod validator;

pub use config::EngineConfig;
pub use engine::{PublisherFactory, PublishingEngine, WorkerExit, GENERATION_LAG_THRESHOLD};
pub use error::EngineError;
pub use log_throttle::LogThrottle;
pub use metrics::EngineMetrics;
pub use rate_limiter::{limiter_for_rate, Admission, RateLimiter, TokenBucket, Unlimited};
pub use report::RunReport;
pub use run_state::RunState;
pub use validator::{BodyContains, ResponseValidator};
