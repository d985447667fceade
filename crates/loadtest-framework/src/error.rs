//! Error types for the publishing engine.

use loadtest_transport::TransportError;
use thiserror::Error;

/// Errors that stop a run before or after traffic, never during it.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Invalid engine settings.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A publisher could not be opened.
    #[error("Failed to open publisher for slot {slot}: {source}")]
    Publisher {
        slot: usize,
        #[source]
        source: TransportError,
    },

    /// Metric registration or encoding failed.
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}
