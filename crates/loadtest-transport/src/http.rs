//! HTTP publisher, shared by the HTTP/1.1 and HTTP/2 modes.

use crate::config::HttpConfig;
use crate::error::TransportError;
use crate::{extra, Extras, Publisher, EXTRA_ANONYMOUS_ID, EXTRA_AUTH};
use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::{Client, Url};
use std::io::Write;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Longest response body quoted in a status error.
const MAX_ERROR_BODY: usize = 512;

/// POSTs payloads to a single endpoint over a pooled client.
pub struct HttpPublisher {
    client: Client,
    endpoint: Url,
    config: HttpConfig,
    name: &'static str,
}

impl HttpPublisher {
    /// HTTP/1.1 publisher.
    pub fn new(config: HttpConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .http1_only()
            .timeout(config.timeout)
            .pool_max_idle_per_host(config.max_idle_per_host)
            .build()?;
        Self::with_client(client, config, "http")
    }

    /// Publisher around a pre-built client.
    pub(crate) fn with_client(
        client: Client,
        config: HttpConfig,
        name: &'static str,
    ) -> Result<Self, TransportError> {
        let endpoint = parse_endpoint(&config.endpoint)?;
        info!(
            "{} publisher ready: endpoint={}, compression={}, key header={}",
            name, endpoint, config.compression, config.key_header
        );
        Ok(Self {
            client,
            endpoint,
            config,
            name,
        })
    }

    async fn send(
        &self,
        key: &str,
        payload: &[u8],
        extras: &Extras<'_>,
    ) -> Result<Vec<u8>, TransportError> {
        let body = if self.config.compression {
            gzip(payload)?
        } else {
            payload.to_vec()
        };

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, &self.config.content_type)
            .header(self.config.key_header.as_str(), key);
        if self.config.compression {
            request = request.header(CONTENT_ENCODING, "gzip");
        }
        if let Some(auth) = extra(extras, EXTRA_AUTH) {
            request = request.basic_auth(auth, None::<&str>);
        }
        if let Some(anonymous_id) = extra(extras, EXTRA_ANONYMOUS_ID) {
            request = request.header("AnonymousId", anonymous_id);
        }

        let response = request.body(body).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes[..bytes.len().min(MAX_ERROR_BODY)]);
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text.into_owned(),
            });
        }
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    async fn publish_to(
        &self,
        cancel: &CancellationToken,
        key: &str,
        payload: &[u8],
        extras: &Extras<'_>,
    ) -> Result<Vec<u8>, TransportError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            result = self.send(key, payload, extras) => result,
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        // Pooled connections are released when the last clone of the client
        // is dropped.
        debug!("{} publisher closed", self.name);
        Ok(())
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url, TransportError> {
    let url = Url::parse(endpoint)
        .map_err(|e| TransportError::Config(format!("invalid endpoint '{endpoint}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(TransportError::Config(format!(
            "endpoint '{endpoint}' has unsupported scheme '{other}'"
        ))),
    }
}

/// Gzip `payload` with the default compression level.
pub fn gzip(payload: &[u8]) -> Result<Vec<u8>, TransportError> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(payload.len() / 2), Compression::default());
    encoder.write_all(payload)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    #[test]
    fn test_gzip_roundtrip() {
        let payload = br#"{"type":"track","userId":"user-1"}"#;
        let compressed = gzip(payload).unwrap();
        let mut decoded = Vec::new();
        GzDecoder::new(&compressed[..])
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_parse_endpoint() {
        assert!(parse_endpoint("http://localhost:8080/v1/batch").is_ok());
        assert!(parse_endpoint("https://ingest.example.com").is_ok());
        assert!(matches!(
            parse_endpoint("ftp://example.com"),
            Err(TransportError::Config(_))
        ));
        assert!(parse_endpoint("localhost:8080").is_err());
    }
}
