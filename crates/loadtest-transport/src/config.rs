//! Adapter selection and per-adapter settings.

use crate::error::TransportError;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Publishing backend, selected by `MODE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Stdout,
    Http,
    Http2,
    Pulsar,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Stdout => "stdout",
            Mode::Http => "http",
            Mode::Http2 => "http2",
            Mode::Pulsar => "pulsar",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdout" => Ok(Mode::Stdout),
            "http" => Ok(Mode::Http),
            "http2" => Ok(Mode::Http2),
            "pulsar" => Ok(Mode::Pulsar),
            other => Err(TransportError::Config(format!(
                "unknown mode '{other}', expected stdout|http|http2|pulsar"
            ))),
        }
    }
}

/// Settings shared by the HTTP/1.1 and HTTP/2 adapters.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub endpoint: String,
    /// Gzip request bodies and send `Content-Encoding: gzip`.
    pub compression: bool,
    pub content_type: String,
    /// Header carrying the partition key.
    pub key_header: String,
    /// Whole-request timeout.
    pub timeout: Duration,
    pub max_idle_per_host: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/v1/batch".to_string(),
            compression: false,
            content_type: "application/json".to_string(),
            key_header: "X-Partition-Key".to_string(),
            timeout: Duration::from_secs(10),
            max_idle_per_host: 256,
        }
    }
}

/// HTTP/2 adapter settings.
#[derive(Debug, Clone)]
pub struct Http2Config {
    pub http: HttpConfig,
    /// How long an idle pooled connection is kept.
    pub idle_timeout: Duration,
    /// Speak h2c without upgrade on `http://` endpoints.
    pub prior_knowledge: bool,
}

impl Default for Http2Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            idle_timeout: Duration::from_secs(90),
            prior_knowledge: true,
        }
    }
}

/// Broker-side compression codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PubSubCompression {
    #[default]
    None,
    Lz4,
    Zlib,
    Zstd,
    Snappy,
}

impl PubSubCompression {
    /// Value for the producer's `compression.type` property.
    pub fn producer_codec(&self) -> &'static str {
        match self {
            PubSubCompression::None => "none",
            PubSubCompression::Lz4 => "lz4",
            PubSubCompression::Zlib => "gzip",
            PubSubCompression::Zstd => "zstd",
            PubSubCompression::Snappy => "snappy",
        }
    }
}

impl FromStr for PubSubCompression {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(PubSubCompression::None),
            "lz4" => Ok(PubSubCompression::Lz4),
            "zlib" => Ok(PubSubCompression::Zlib),
            "zstd" => Ok(PubSubCompression::Zstd),
            "snappy" => Ok(PubSubCompression::Snappy),
            other => Err(TransportError::Config(format!(
                "unknown compression '{other}', expected none|lz4|zlib|zstd|snappy"
            ))),
        }
    }
}

/// Pub/sub adapter settings.
#[derive(Debug, Clone)]
pub struct PubSubConfig {
    /// Broker bootstrap address.
    pub url: String,
    /// Fully qualified topic, e.g. `persistent://public/default/events`.
    pub topic: String,
    pub batching_enabled: bool,
    pub batching_max_messages: u32,
    pub batching_max_size: u64,
    pub batching_max_publish_delay: Duration,
    pub compression: PubSubCompression,
    /// Publish slot `n` to `{topic}-{n}`.
    pub topic_per_slot: bool,
    /// Upper bound for a single delivery.
    pub send_timeout: Duration,
}

impl Default for PubSubConfig {
    fn default() -> Self {
        Self {
            url: "localhost:9092".to_string(),
            topic: "events".to_string(),
            batching_enabled: true,
            batching_max_messages: 1000,
            batching_max_size: 128 * 1024,
            batching_max_publish_delay: Duration::from_millis(10),
            compression: PubSubCompression::None,
            topic_per_slot: false,
            send_timeout: Duration::from_secs(30),
        }
    }
}

/// Everything needed to open publishers for one run.
#[derive(Debug, Clone)]
pub enum TransportConfig {
    Stdout,
    Http(HttpConfig),
    Http2(Http2Config),
    Pulsar(PubSubConfig),
}

impl TransportConfig {
    pub fn mode(&self) -> Mode {
        match self {
            TransportConfig::Stdout => Mode::Stdout,
            TransportConfig::Http(_) => Mode::Http,
            TransportConfig::Http2(_) => Mode::Http2,
            TransportConfig::Pulsar(_) => Mode::Pulsar,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode() {
        assert_eq!("stdout".parse::<Mode>().unwrap(), Mode::Stdout);
        assert_eq!("HTTP2".parse::<Mode>().unwrap(), Mode::Http2);
        assert_eq!(" pulsar ".parse::<Mode>().unwrap(), Mode::Pulsar);
        assert!("grpc".parse::<Mode>().is_err());
    }

    #[test]
    fn test_compression_codec() {
        assert_eq!(
            "zlib".parse::<PubSubCompression>().unwrap().producer_codec(),
            "gzip"
        );
        assert_eq!(
            "".parse::<PubSubCompression>().unwrap(),
            PubSubCompression::None
        );
        assert!("brotli".parse::<PubSubCompression>().is_err());
    }
}
