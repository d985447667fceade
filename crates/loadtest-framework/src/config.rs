//! Engine configuration.

use crate::error::EngineError;
use std::time::Duration;

/// Sizing and behaviour of the publishing engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Publish workers, also the queue depth.
    pub concurrency: usize,
    /// Message generator tasks.
    pub message_generators: usize,
    /// Open one publisher per worker instead of a shared one.
    pub one_client_per_slot: bool,
    /// Minimum spacing of retryable-error log lines per worker.
    pub log_throttle_interval: Duration,
}

impl EngineConfig {
    /// Create a configuration with a shared publisher.
    pub fn new(concurrency: usize, message_generators: usize) -> Self {
        Self {
            concurrency,
            message_generators,
            one_client_per_slot: false,
            log_throttle_interval: Duration::from_secs(1),
        }
    }

    /// Give every worker its own publisher.
    pub fn with_one_client_per_slot(mut self, enabled: bool) -> Self {
        self.one_client_per_slot = enabled;
        self
    }

    /// Set the retryable-error log interval.
    pub fn with_log_throttle_interval(mut self, interval: Duration) -> Self {
        self.log_throttle_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.concurrency == 0 {
            return Err(EngineError::Config(
                "CONCURRENCY must be at least 1".to_string(),
            ));
        }
        if self.message_generators == 0 {
            return Err(EngineError::Config(
                "MESSAGE_GENERATORS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = EngineConfig::new(8, 2)
            .with_one_client_per_slot(true)
            .with_log_throttle_interval(Duration::from_millis(250));
        assert_eq!(config.concurrency, 8);
        assert!(config.one_client_per_slot);
        assert_eq!(config.log_throttle_interval, Duration::from_millis(250));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        assert!(EngineConfig::new(0, 1).validate().is_err());
        assert!(EngineConfig::new(1, 0).validate().is_err());
    }
}
