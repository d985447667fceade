//! event-loadtest
//!
//! Synthetic event traffic generator for load-testing ingestion backends.
//! Payloads are rendered from templates, spread over simulated users, event
//! types, batch sizes and sources by weighted concentration tables, and
//! published concurrently under a global events-per-second ceiling.
//!
//! # Usage
//!
//! ```bash
//! MODE=http ENDPOINT=http://ingest:8080/v1/batch \
//! CONCURRENCY=200 MESSAGE_GENERATORS=8 \
//! TOTAL_USERS=10000 HOT_USER_GROUPS=80,20 \
//! EVENT_TYPES='track,page,batch(2,3)' HOT_EVENT_TYPES=60,30,10 \
//! BATCH_SIZES=1,5,10 HOT_BATCH_SIZES=50,30,20 \
//! MAX_EVENTS_PER_SECOND=5000 SOURCES=wk-a,wk-b SHARED_SOURCES=true \
//! DURATION=5m event-loadtest
//! ```
//!
//! # Crates
//!
//! - `loadtest_generator` - templates, concentration tables and messages
//! - `loadtest_transport` - stdout, http, http2 and pub/sub publishers
//! - `loadtest_framework` - the publishing engine, rate limiter and metrics

pub mod config;
pub mod identity;
pub mod observability;
pub mod run;

pub use config::{Args, Settings};
pub use identity::ReplicaIdentity;
