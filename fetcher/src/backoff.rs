/// Exponential backoff for RPC retries
/// Tracks attempts against a bounded budget and yields the wait before the next try

use std::time::Duration;
use tracing::{error, info, warn};

/// Retry budget and delay curve for one logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_interval_secs: u64,
    pub max_interval_secs: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_interval_secs: u64, max_interval_secs: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_interval_secs,
            max_interval_secs,
        }
    }

    /// A single attempt, no waiting.
    pub fn no_retry() -> Self {
        Self::new(1, 0, 0)
    }
}

/// Per-request backoff state
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    policy: RetryPolicy,
    failed_attempts: u32,
}

impl ExponentialBackoff {
    pub fn new(policy: RetryPolicy) -> Self {
        ExponentialBackoff {
            policy,
            failed_attempts: 0,
        }
    }

    /// Wait after the `attempt`-th failure: base * 2^(attempt - 1), capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        let secs = self
            .policy
            .base_interval_secs
            .saturating_mul(factor)
            .min(self.policy.max_interval_secs);
        Duration::from_secs(secs)
    }

    /// Record a failure. Returns the wait before the next attempt, or `None`
    /// when the budget is spent.
    pub fn on_failure(&mut self, error_message: &str) -> Option<Duration> {
        self.failed_attempts += 1;

        if self.exhausted() {
            error!(
                attempts = self.failed_attempts,
                error = error_message,
                "Giving up after {} attempts",
                self.failed_attempts
            );
            return None;
        }

        let wait = self.delay_for(self.failed_attempts);
        warn!(
            attempt = self.failed_attempts,
            max_attempts = self.policy.max_attempts,
            error = error_message,
            "retry {}/{} in {} second(s)",
            self.failed_attempts,
            self.policy.max_attempts,
            wait.as_secs()
        );
        Some(wait)
    }

    pub fn on_success(&mut self) {
        if self.failed_attempts > 0 {
            info!(
                attempts = self.failed_attempts,
                "RPC recovered after {} failed attempts", self.failed_attempts
            );
        }
        self.failed_attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.failed_attempts
    }

    pub fn exhausted(&self) -> bool {
        self.failed_attempts >= self.policy.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_from_base() {
        let backoff = ExponentialBackoff::new(RetryPolicy::new(10, 2, 600));
        let secs: Vec<u64> = (1..=5).map(|a| backoff.delay_for(a).as_secs()).collect();
        assert_eq!(secs, vec![2, 4, 8, 16, 32]);
    }

    #[test]
    fn test_delay_is_capped() {
        let backoff = ExponentialBackoff::new(RetryPolicy::new(100, 2, 10));
        assert_eq!(backoff.delay_for(3).as_secs(), 8);
        assert_eq!(backoff.delay_for(4).as_secs(), 10);
        assert_eq!(backoff.delay_for(64).as_secs(), 10);
    }

    #[test]
    fn test_budget_counts_every_attempt() {
        let mut backoff = ExponentialBackoff::new(RetryPolicy::new(3, 2, 60));

        assert_eq!(backoff.on_failure("e1"), Some(Duration::from_secs(2)));
        assert_eq!(backoff.on_failure("e2"), Some(Duration::from_secs(4)));
        assert_eq!(backoff.on_failure("e3"), None);
        assert!(backoff.exhausted());
        assert_eq!(backoff.attempts(), 3);
    }

    #[test]
    fn test_single_attempt_never_waits() {
        let mut backoff = ExponentialBackoff::new(RetryPolicy::no_retry());
        assert_eq!(backoff.on_failure("boom"), None);
    }

    #[test]
    fn test_reset_on_success() {
        let mut backoff = ExponentialBackoff::new(RetryPolicy::new(5, 1, 60));
        backoff.on_failure("e1");
        backoff.on_failure("e2");
        assert_eq!(backoff.attempts(), 2);

        backoff.on_success();
        assert_eq!(backoff.attempts(), 0);
        assert!(!backoff.exhausted());
    }

    #[test]
    fn test_zero_attempts_is_clamped() {
        assert_eq!(RetryPolicy::new(0, 2, 60).max_attempts, 1);
    }
}
