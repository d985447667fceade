//! Global admission control.
//!
//! Uses a token bucket holding at most one second of budget. Workers ask
//! for `NoOfEvents` tokens before each publish and sleep for the suggested
//! `retry_after` when throttled.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shortest wait handed back to a throttled caller.
const MIN_RETRY_AFTER: Duration = Duration::from_millis(1);

/// Outcome of an admission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// Not enough budget; ask again after `retry_after`.
    Throttled { retry_after: Duration },
}

/// Admission control shared by every worker.
pub trait RateLimiter: Send + Sync {
    /// Ask to publish `events` events now.
    fn admit(&self, events: u64) -> Admission;
}

/// Limiter that admits everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unlimited;

impl RateLimiter for Unlimited {
    fn admit(&self, _events: u64) -> Admission {
        Admission::Admitted
    }
}

/// Token bucket state.
#[derive(Debug)]
struct Bucket {
    /// Available tokens. Negative after an oversize admission.
    tokens: f64,
    last_update: Instant,
}

/// Token bucket limiter with capacity and refill rate `events_per_second`.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64,
    bucket: Mutex<Bucket>,
}

impl TokenBucket {
    /// Create a full bucket.
    ///
    /// # Panics
    ///
    /// Panics if `events_per_second` is 0; use [`limiter_for_rate`] to get
    /// [`Unlimited`] in that case.
    pub fn new(events_per_second: u64) -> Self {
        assert!(events_per_second > 0, "token bucket rate must be positive");
        let rate = events_per_second as f64;
        Self {
            capacity: rate,
            refill_rate: rate,
            bucket: Mutex::new(Bucket {
                tokens: rate,
                last_update: Instant::now(),
            }),
        }
    }

    fn admit_at(&self, events: u64, now: Instant) -> Admission {
        let requested = events as f64;
        let mut bucket = self.bucket.lock();

        let elapsed = now.saturating_duration_since(bucket.last_update).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_rate).min(self.capacity);
        bucket.last_update = now;

        // A request larger than the bucket goes through once the bucket is
        // full and leaves a debt that refill repays.
        let needed = requested.min(self.capacity);
        if bucket.tokens >= needed {
            bucket.tokens -= requested;
            return Admission::Admitted;
        }

        let wait = (needed - bucket.tokens) / self.refill_rate;
        Admission::Throttled {
            retry_after: Duration::from_secs_f64(wait).max(MIN_RETRY_AFTER),
        }
    }
}

impl RateLimiter for TokenBucket {
    fn admit(&self, events: u64) -> Admission {
        self.admit_at(events, Instant::now())
    }
}

/// Limiter for `MAX_EVENTS_PER_SECOND`; 0 disables limiting.
pub fn limiter_for_rate(events_per_second: u64) -> Arc<dyn RateLimiter> {
    if events_per_second == 0 {
        Arc::new(Unlimited)
    } else {
        Arc::new(TokenBucket::new(events_per_second))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits_until_empty() {
        let limiter = TokenBucket::new(10);
        let now = Instant::now();
        for _ in 0..10 {
            assert_eq!(limiter.admit_at(1, now), Admission::Admitted);
        }
        match limiter.admit_at(1, now) {
            Admission::Throttled { retry_after } => {
                assert!(retry_after >= Duration::from_millis(99));
                assert!(retry_after <= Duration::from_millis(101));
            }
            other => panic!("expected throttle, got {other:?}"),
        }
    }

    #[test]
    fn test_refill_over_time() {
        let limiter = TokenBucket::new(100);
        let start = Instant::now();
        assert_eq!(limiter.admit_at(100, start), Admission::Admitted);
        assert!(matches!(
            limiter.admit_at(10, start),
            Admission::Throttled { .. }
        ));
        assert_eq!(
            limiter.admit_at(10, start + Duration::from_millis(100)),
            Admission::Admitted
        );
    }

    #[test]
    fn test_refill_is_capped() {
        let limiter = TokenBucket::new(10);
        let start = Instant::now();
        let later = start + Duration::from_secs(60);
        assert_eq!(limiter.admit_at(10, later), Admission::Admitted);
        assert!(matches!(
            limiter.admit_at(1, later),
            Admission::Throttled { .. }
        ));
    }

    #[test]
    fn test_oversize_request_admitted_when_full() {
        let limiter = TokenBucket::new(10);
        let start = Instant::now();
        assert_eq!(limiter.admit_at(25, start), Admission::Admitted);

        // 15 tokens of debt plus one token: 1.6s of refill.
        match limiter.admit_at(1, start) {
            Admission::Throttled { retry_after } => {
                assert!(retry_after >= Duration::from_millis(1590));
                assert!(retry_after <= Duration::from_millis(1610));
            }
            other => panic!("expected throttle, got {other:?}"),
        }
        assert_eq!(
            limiter.admit_at(1, start + Duration::from_millis(1700)),
            Admission::Admitted
        );
    }

    #[test]
    fn test_zero_rate_is_unlimited() {
        let limiter = limiter_for_rate(0);
        for _ in 0..1000 {
            assert_eq!(limiter.admit(1_000_000), Admission::Admitted);
        }
    }
}
