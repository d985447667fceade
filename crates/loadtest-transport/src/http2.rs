//! HTTP/2 client construction.
//!
//! `http://` endpoints use h2c with prior knowledge. `https://` endpoints
//! negotiate HTTP/2 through ALPN during the TLS handshake.

use crate::config::Http2Config;
use crate::error::TransportError;
use crate::http::HttpPublisher;
use reqwest::Client;

/// Build an HTTP/2 publisher.
pub fn connect(config: Http2Config) -> Result<HttpPublisher, TransportError> {
    let cleartext = config.http.endpoint.starts_with("http://");
    let mut builder = Client::builder()
        .timeout(config.http.timeout)
        .pool_max_idle_per_host(config.http.max_idle_per_host)
        .pool_idle_timeout(config.idle_timeout)
        .http2_keep_alive_while_idle(true);
    if cleartext && config.prior_knowledge {
        builder = builder.http2_prior_knowledge();
    }
    HttpPublisher::with_client(builder.build()?, config.http, "http2")
}
