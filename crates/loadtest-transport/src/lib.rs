//! Publish adapters for the event-loadtest engine.
//!
//! Every backend implements [`Publisher`]. The engine only sees
//! `Arc<dyn Publisher>` handles, so switching `MODE` changes nothing
//! upstream of this crate.
//!
//! # Architecture
//!
//! ```text
//!                      TransportConfig
//!                            │ connect(slot)
//!        ┌──────────────┬────┴─────────┬──────────────┐
//!        ▼              ▼              ▼              ▼
//! ┌─────────────┐ ┌───────────┐ ┌────────────┐ ┌─────────────┐
//! │   stdout    │ │   http    │ │   http2    │ │   pubsub    │
//! │ line sink   │ │ reqwest   │ │ reqwest h2 │ │ rdkafka     │
//! └─────────────┘ └───────────┘ └────────────┘ └─────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use loadtest_transport::{connect, TransportConfig, EXTRA_AUTH};
//! use tokio_util::sync::CancellationToken;
//!
//! let publisher = connect(&TransportConfig::Stdout, 0)?;
//! let cancel = CancellationToken::new();
//! publisher
//!     .publish_to(&cancel, "user-1", b"{}", &[(EXTRA_AUTH, "write-key")])
//!     .await?;
//! publisher.close().await?;
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod http2;
pub mod pubsub;
pub mod stdout;

// Re-exports for convenience
pub use config::{HttpConfig, Http2Config, Mode, PubSubCompression, PubSubConfig, TransportConfig};
pub use error::{ErrorKind, TransportError};
pub use http::HttpPublisher;
pub use pubsub::PubSubPublisher;
pub use stdout::StdoutPublisher;

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Extra field carrying the source write key, sent as Basic auth.
pub const EXTRA_AUTH: &str = "auth";
/// Extra field carrying the anonymous id, sent as the `AnonymousId` header.
pub const EXTRA_ANONYMOUS_ID: &str = "anonymous_id";

/// Per-publish extra fields as `(name, value)` pairs.
pub type Extras<'a> = [(&'a str, &'a str)];

/// Value of the extra field `name`, if present.
pub fn extra<'a>(extras: &Extras<'a>, name: &str) -> Option<&'a str> {
    extras
        .iter()
        .find(|(k, _)| *k == name)
        .map(|(_, v)| *v)
}

/// Publish capability shared by all adapters.
///
/// Handles may be shared across workers. `close` is called once per distinct
/// handle after every worker using it has stopped.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Send one payload routed by `key` and return the response body.
    ///
    /// Returns [`TransportError::Cancelled`] if `cancel` fires first.
    async fn publish_to(
        &self,
        cancel: &CancellationToken,
        key: &str,
        payload: &[u8],
        extras: &Extras<'_>,
    ) -> Result<Vec<u8>, TransportError>;

    /// Release the handle's connections.
    async fn close(&self) -> Result<(), TransportError>;

    /// Adapter name for logs.
    fn name(&self) -> &'static str;
}

/// Open a publisher for worker `slot`.
///
/// `slot` only matters for pub/sub with per-slot topics.
pub fn connect(config: &TransportConfig, slot: usize) -> Result<Arc<dyn Publisher>, TransportError> {
    let publisher: Arc<dyn Publisher> = match config {
        TransportConfig::Stdout => Arc::new(StdoutPublisher::new()),
        TransportConfig::Http(http) => Arc::new(HttpPublisher::new(http.clone())?),
        TransportConfig::Http2(http2) => Arc::new(http2::connect(http2.clone())?),
        TransportConfig::Pulsar(pubsub) => Arc::new(PubSubPublisher::new(pubsub, slot)?),
    };
    Ok(publisher)
}
