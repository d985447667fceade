//! Error types for publish adapters.

use thiserror::Error;

/// Coarse classification of a publish failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Timeout,
    Connect,
    Status,
    Broker,
    Cancelled,
    Io,
    Config,
    Other,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::Connect => "connect",
            ErrorKind::Status => "status",
            ErrorKind::Broker => "broker",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Io => "io",
            ErrorKind::Config => "config",
            ErrorKind::Other => "other",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by [`Publisher`](crate::Publisher) implementations.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The request did not complete within the client timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    /// The endpoint answered with a non-2xx status.
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Broker error: {0}")]
    Broker(#[from] rdkafka::error::KafkaError),

    /// The run was cancelled while the publish was in flight.
    #[error("Publish cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid adapter settings, detected when the client is built.
    #[error("Invalid transport configuration: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::Timeout(_) => ErrorKind::Timeout,
            TransportError::Connect(_) => ErrorKind::Connect,
            TransportError::Status { .. } => ErrorKind::Status,
            TransportError::Broker(_) => ErrorKind::Broker,
            TransportError::Cancelled => ErrorKind::Cancelled,
            TransportError::Io(_) => ErrorKind::Io,
            TransportError::Config(_) => ErrorKind::Config,
            TransportError::Other(_) => ErrorKind::Other,
        }
    }

    /// Whether the worker that hit this error may carry on with its next
    /// message. Only network timeouts qualify.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_builder() {
            TransportError::Config(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}
