//! Process-wide run counters.

use crate::report::RunReport;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters updated by generator and worker tasks.
///
/// Every field is an atomic so the publish path never takes a lock. Read a
/// [`RunReport`] only after the engine has drained.
#[derive(Debug)]
pub struct RunState {
    published_messages: AtomicU64,
    published_events: AtomicU64,
    sent_bytes: AtomicU64,
    processed_bytes: AtomicU64,
    failed_publishes: AtomicU64,
    throttled: AtomicU64,
    generation_lag: AtomicU64,
    fatal_workers: AtomicU64,
    started: Instant,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    pub fn new() -> Self {
        Self {
            published_messages: AtomicU64::new(0),
            published_events: AtomicU64::new(0),
            sent_bytes: AtomicU64::new(0),
            processed_bytes: AtomicU64::new(0),
            failed_publishes: AtomicU64::new(0),
            throttled: AtomicU64::new(0),
            generation_lag: AtomicU64::new(0),
            fatal_workers: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// A generated payload of `bytes`.
    pub fn record_generated(&self, bytes: usize) {
        self.processed_bytes
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// A successful publish.
    pub fn record_published(&self, events: u64, bytes: usize) {
        self.published_messages.fetch_add(1, Ordering::Relaxed);
        self.published_events.fetch_add(events, Ordering::Relaxed);
        self.sent_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed_publishes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_throttled(&self) {
        self.throttled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_generation_lag(&self) {
        self.generation_lag.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fatal_worker(&self) {
        self.fatal_workers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn published_messages(&self) -> u64 {
        self.published_messages.load(Ordering::Relaxed)
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    /// Snapshot of the counters with the elapsed time since start.
    pub fn report(&self) -> RunReport {
        RunReport {
            published_messages: self.published_messages.load(Ordering::Acquire),
            published_events: self.published_events.load(Ordering::Acquire),
            sent_bytes: self.sent_bytes.load(Ordering::Acquire),
            processed_bytes: self.processed_bytes.load(Ordering::Acquire),
            failed_publishes: self.failed_publishes.load(Ordering::Acquire),
            throttled: self.throttled.load(Ordering::Acquire),
            generation_lag: self.generation_lag.load(Ordering::Acquire),
            fatal_workers: self.fatal_workers.load(Ordering::Acquire),
            elapsed: self.started.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_concurrent_updates() {
        let state = Arc::new(RunState::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        state.record_published(3, 100);
                        state.record_generated(100);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let report = state.report();
        assert_eq!(report.published_messages, 8000);
        assert_eq!(report.published_events, 24_000);
        assert_eq!(report.sent_bytes, 800_000);
        assert_eq!(report.processed_bytes, 800_000);
        assert_eq!(report.failed_publishes, 0);
    }
}
