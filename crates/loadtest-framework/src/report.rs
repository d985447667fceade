//! Final run summary.

use std::time::Duration;

/// Counters of a finished run, read after the engine has drained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// Messages published successfully.
    pub published_messages: u64,
    /// Events carried by the published messages.
    pub published_events: u64,
    /// Payload bytes of the published messages.
    pub sent_bytes: u64,
    /// Payload bytes generated, published or not.
    pub processed_bytes: u64,
    /// Publishes that failed, including rejected response bodies.
    pub failed_publishes: u64,
    /// Admission requests denied by the rate limiter.
    pub throttled: u64,
    /// Dequeues that waited more than 1ms on an empty queue.
    pub generation_lag: u64,
    /// Workers stopped by a non-retryable error.
    pub fatal_workers: u64,
    /// Wall time from engine start to the end of the drain.
    pub elapsed: Duration,
}

impl RunReport {
    /// Calculate messages per second.
    pub fn messages_per_second(&self) -> f64 {
        rate(self.published_messages, self.elapsed)
    }

    /// Calculate events per second.
    pub fn events_per_second(&self) -> f64 {
        rate(self.published_events, self.elapsed)
    }

    /// Generate a summary string.
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Load Test Report\n\
             ================\n\
             Duration: {:?}\n\
             Published: {} messages, {} events, {} bytes\n\
             Throughput: {:.2} msg/sec, {:.2} events/sec\n\
             Generated: {} bytes\n\
             Failed publishes: {}\n\
             Throttled: {}\n\
             Generation lag: {}\n",
            self.elapsed,
            self.published_messages,
            self.published_events,
            self.sent_bytes,
            self.messages_per_second(),
            self.events_per_second(),
            self.processed_bytes,
            self.failed_publishes,
            self.throttled,
            self.generation_lag,
        );
        if self.fatal_workers > 0 {
            summary.push_str(&format!(
                "Workers stopped on fatal errors: {}\n",
                self.fatal_workers
            ));
        }
        summary
    }
}

fn rate(count: u64, elapsed: Duration) -> f64 {
    if elapsed.as_secs_f64() > 0.0 {
        count as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    }
}
