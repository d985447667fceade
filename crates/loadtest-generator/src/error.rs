//! Error types for message generation setup.

use thiserror::Error;

/// Errors raised while building generators from configuration.
///
/// All of these are configuration errors: they are detected at startup,
/// before any message is generated.
#[derive(Error, Debug)]
pub enum GeneratorError {
    /// Percentages do not sum to 100 or do not match the candidate count.
    #[error("Invalid concentration for {name}: {reason}")]
    InvalidConcentration { name: String, reason: String },

    /// Malformed `EVENT_TYPES` expression.
    #[error("Invalid event types '{input}': {reason}")]
    InvalidEventTypes { input: String, reason: String },

    /// Malformed comma-separated integer list.
    #[error("Invalid list for {name}: {reason}")]
    InvalidList { name: String, reason: String },

    /// Event type configured without a template file.
    #[error("Template not found for event type: {0}")]
    TemplateNotFound(String),

    /// Event type name that is neither built-in nor registered as custom.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// Inconsistent source (write key) configuration.
    #[error("Invalid sources: {0}")]
    InvalidSources(String),

    /// Inconsistent user configuration.
    #[error("Invalid users: {0}")]
    InvalidUsers(String),

    /// IO error while reading templates.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
