//! Local sink that prints every publish.

use crate::error::TransportError;
use crate::{Extras, Publisher};
use async_trait::async_trait;
use std::io::Write;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Writes `key=<key> extras=<k=v,...> payload=<utf8>` lines.
///
/// Never fails a publish; write errors are logged and swallowed.
pub struct StdoutPublisher {
    out: Mutex<Box<dyn Write + Send>>,
}

impl Default for StdoutPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl StdoutPublisher {
    pub fn new() -> Self {
        Self::with_writer(Box::new(std::io::stdout()))
    }

    /// Sink writing to `out` instead of standard output.
    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

/// Render one sink line, without the trailing newline.
pub fn format_line(key: &str, payload: &[u8], extras: &Extras<'_>) -> String {
    let extras = extras
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "key={key} extras={extras} payload={}",
        String::from_utf8_lossy(payload)
    )
}

#[async_trait]
impl Publisher for StdoutPublisher {
    async fn publish_to(
        &self,
        _cancel: &CancellationToken,
        key: &str,
        payload: &[u8],
        extras: &Extras<'_>,
    ) -> Result<Vec<u8>, TransportError> {
        let line = format_line(key, payload, extras);
        match self.out.lock() {
            Ok(mut out) => {
                if let Err(e) = writeln!(out, "{line}") {
                    warn!("stdout sink write failed: {}", e);
                }
            }
            Err(_) => warn!("stdout sink lock poisoned, dropping line"),
        }
        Ok(Vec::new())
    }

    async fn close(&self) -> Result<(), TransportError> {
        if let Ok(mut out) = self.out.lock() {
            if let Err(e) = out.flush() {
                warn!("stdout sink flush failed: {}", e);
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdout"
    }
}
