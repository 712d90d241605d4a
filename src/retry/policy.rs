/// Backoff policy for retryable failures
///
/// Delays grow exponentially per attempt, capped, with uniform random jitter
/// added to avoid synchronized retry storms across callers. Rate-limit
/// failures back off harder than generic transient ones.
use std::time::Duration;

use rand::Rng;

use crate::constants::{RATE_LIMIT_BACKOFF_FACTOR, RATE_LIMIT_CAP_FACTOR};
use crate::errors::ErrorKind;

/// Immutable retry parameters for one call-site category
///
/// Constructed fresh per call; plain reads and transaction submissions use
/// different presets.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total invocation budget, including the first attempt
    pub max_attempts: u32,
    /// Delay before the second attempt, pre-jitter
    pub base_delay: Duration,
    /// Exponential growth factor between attempts
    pub multiplier: f64,
    /// Ceiling on any single computed delay, pre-jitter
    pub max_delay: Duration,
    /// Upper bound of the uniform random jitter added to every delay
    pub jitter: Duration,
    /// Fixed delay before the first attempt; used by transaction submission
    /// to avoid hammering a node immediately after a prior call
    pub warmup: Option<Duration>,
}

impl RetryPolicy {
    /// Preset for idempotent reads going through the batching queue
    pub fn read() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_secs(5),
            jitter: Duration::from_millis(50),
            warmup: None,
        }
    }

    /// Preset for transaction submission; longer delays, short warm-up
    pub fn transaction() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: Duration::from_millis(250),
            warmup: Some(Duration::from_millis(500)),
        }
    }

    /// Delay to sleep after the given failed attempt (1-based)
    ///
    /// Rate-limit failures use a doubled multiplier and a raised cap so the
    /// provider gets breathing room; everything else follows the base curve.
    pub fn delay_for(&self, kind: ErrorKind, attempt: u32) -> Duration {
        let (multiplier, cap) = match kind {
            ErrorKind::RateLimited => (
                self.multiplier * RATE_LIMIT_BACKOFF_FACTOR,
                self.max_delay * RATE_LIMIT_CAP_FACTOR,
            ),
            _ => (self.multiplier, self.max_delay),
        };

        let exponent = attempt.saturating_sub(1).min(16);
        let scaled = self.base_delay.as_millis() as f64 * multiplier.powi(exponent as i32);
        let capped = Duration::from_millis(scaled as u64).min(cap);

        capped + random_jitter(self.jitter)
    }
}

fn random_jitter(bound: Duration) -> Duration {
    let bound_ms = bound.as_millis() as u64;
    if bound_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=bound_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter(mut policy: RetryPolicy) -> RetryPolicy {
        policy.jitter = Duration::ZERO;
        policy
    }

    #[test]
    fn delays_grow_exponentially() {
        let policy = no_jitter(RetryPolicy::read());
        assert_eq!(
            policy.delay_for(ErrorKind::TransientRpc, 1),
            Duration::from_millis(100)
        );
        assert_eq!(
            policy.delay_for(ErrorKind::TransientRpc, 2),
            Duration::from_millis(200)
        );
        assert_eq!(
            policy.delay_for(ErrorKind::TransientRpc, 3),
            Duration::from_millis(400)
        );
    }

    #[test]
    fn delays_are_capped() {
        let policy = no_jitter(RetryPolicy::read());
        assert_eq!(
            policy.delay_for(ErrorKind::TransientRpc, 12),
            policy.max_delay
        );
    }

    #[test]
    fn rate_limit_backs_off_harder_than_transient() {
        let policy = no_jitter(RetryPolicy::read());
        let transient = policy.delay_for(ErrorKind::TransientRpc, 2);
        let rate_limited = policy.delay_for(ErrorKind::RateLimited, 2);
        assert!(rate_limited > transient);

        // the raised cap applies too
        let deep = policy.delay_for(ErrorKind::RateLimited, 12);
        assert_eq!(deep, policy.max_delay * 2);
    }

    #[test]
    fn jitter_stays_within_bound() {
        let policy = RetryPolicy::read();
        let floor = Duration::from_millis(100);
        for _ in 0..50 {
            let delay = policy.delay_for(ErrorKind::TransientRpc, 1);
            assert!(delay >= floor);
            assert!(delay <= floor + policy.jitter);
        }
    }
}
