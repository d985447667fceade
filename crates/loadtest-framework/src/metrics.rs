//! Prometheus metrics for the publishing engine.

use crate::error::EngineError;
use prometheus::{
    exponential_buckets, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge,
    Opts, Registry, TextEncoder,
};

/// Error label for transient failures the worker survives.
pub const ERROR_RETRYABLE: &str = "retryable";
/// Error label for failures that stop the worker.
pub const ERROR_FATAL: &str = "fatal";
/// Error label for bodies rejected by the response validator.
pub const ERROR_VALIDATION: &str = "validation";

/// Engine metrics, registered in their own registry.
#[derive(Clone)]
pub struct EngineMetrics {
    registry: Registry,
    pub messages_published: IntCounter,
    pub events_published: IntCounter,
    pub publish_errors: IntCounterVec,
    pub throttled: IntCounter,
    pub generation_lag: IntCounter,
    pub payload_size_bytes: Histogram,
    pub publish_duration_seconds: Histogram,
    pub active_workers: IntGauge,
    pub process_resident_bytes: IntGauge,
}

impl EngineMetrics {
    pub fn new() -> Result<Self, EngineError> {
        let registry = Registry::new();

        let messages_published = IntCounter::new(
            "loadtest_messages_published_total",
            "Messages published successfully",
        )?;
        let events_published = IntCounter::new(
            "loadtest_events_published_total",
            "Events carried by successfully published messages",
        )?;
        let publish_errors = IntCounterVec::new(
            Opts::new("loadtest_publish_errors_total", "Failed publishes by class"),
            &["kind"],
        )?;
        let throttled = IntCounter::new(
            "loadtest_throttled_total",
            "Admission requests denied by the rate limiter",
        )?;
        let generation_lag = IntCounter::new(
            "loadtest_generation_lag_total",
            "Times a worker waited more than 1ms for a generated message",
        )?;
        let payload_size_bytes = Histogram::with_opts(
            HistogramOpts::new("loadtest_payload_size_bytes", "Published payload size")
                .buckets(exponential_buckets(64.0, 2.0, 16)?),
        )?;
        let publish_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "loadtest_publish_duration_seconds",
                "Time spent in the transport per publish",
            )
            .buckets(exponential_buckets(0.0005, 2.0, 16)?),
        )?;
        let active_workers =
            IntGauge::new("loadtest_active_workers", "Publish workers currently running")?;
        let process_resident_bytes = IntGauge::new(
            "loadtest_process_resident_bytes",
            "Resident memory of this process",
        )?;

        registry.register(Box::new(messages_published.clone()))?;
        registry.register(Box::new(events_published.clone()))?;
        registry.register(Box::new(publish_errors.clone()))?;
        registry.register(Box::new(throttled.clone()))?;
        registry.register(Box::new(generation_lag.clone()))?;
        registry.register(Box::new(payload_size_bytes.clone()))?;
        registry.register(Box::new(publish_duration_seconds.clone()))?;
        registry.register(Box::new(active_workers.clone()))?;
        registry.register(Box::new(process_resident_bytes.clone()))?;

        Ok(Self {
            registry,
            messages_published,
            events_published,
            publish_errors,
            throttled,
            generation_lag,
            payload_size_bytes,
            publish_duration_seconds,
            active_workers,
            process_resident_bytes,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Count a failed publish of class `kind`.
    pub fn record_error(&self, kind: &str) {
        self.publish_errors.with_label_values(&[kind]).inc();
    }

    /// Render the registry in Prometheus text format.
    pub fn encode(&self) -> Result<String, EngineError> {
        Ok(TextEncoder::new().encode_to_string(&self.registry.gather())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_metrics() {
        let metrics = EngineMetrics::new().unwrap();
        metrics.messages_published.inc_by(3);
        metrics.record_error(ERROR_RETRYABLE);
        metrics.payload_size_bytes.observe(512.0);

        let text = metrics.encode().unwrap();
        assert!(text.contains("loadtest_messages_published_total 3"));
        assert!(text.contains(r#"loadtest_publish_errors_total{kind="retryable"} 1"#));
        assert!(text.contains("loadtest_payload_size_bytes_count 1"));
    }

    #[test]
    fn test_instances_are_independent() {
        let a = EngineMetrics::new().unwrap();
        let b = EngineMetrics::new().unwrap();
        a.throttled.inc();
        assert_eq!(a.throttled.get(), 1);
        assert_eq!(b.throttled.get(), 0);
    }
}
