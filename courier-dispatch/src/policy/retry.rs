//! Retry policy for backend attempts.
//!
//! Pure configuration and arithmetic; the executor that actually sleeps and
//! calls backends lives in [`crate::retry`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How many times to try one backend within a dispatch cycle, and how long to
/// wait between tries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts per backend per dispatch cycle.
    ///
    /// Default: 3 attempts
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff (in milliseconds).
    ///
    /// The delay after the failed attempt with zero-based index `n` is
    /// `retry_delay_ms * 2^n`.
    ///
    /// Default: 1000 milliseconds
    #[serde(default = "defaults::retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: defaults::max_retries(),
            retry_delay_ms: defaults::retry_delay_ms(),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if another attempt may follow the one at `attempt_index`.
    #[must_use]
    pub const fn should_retry(&self, attempt_index: u32) -> bool {
        attempt_index.saturating_add(1) < self.max_retries
    }

    /// Delay to apply after the failed attempt at `attempt_index` (zero-based).
    ///
    /// Saturates instead of overflowing for very large indices.
    #[must_use]
    pub fn backoff_delay(&self, attempt_index: u32) -> Duration {
        let factor = 2u64.checked_pow(attempt_index).unwrap_or(u64::MAX);
        Duration::from_millis(self.retry_delay_ms.saturating_mul(factor))
    }

    /// Number of attempts left after `attempts_made`.
    #[must_use]
    pub const fn remaining_attempts(&self, attempts_made: u32) -> u32 {
        self.max_retries.saturating_sub(attempts_made)
    }

    /// Sum of every backoff delay a fully exhausted backend incurs.
    #[must_use]
    pub fn total_backoff(&self) -> Duration {
        (0..self.max_retries.saturating_sub(1))
            .map(|index| self.backoff_delay(index))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

mod defaults {
    pub const fn max_retries() -> u32 {
        3
    }

    pub const fn retry_delay_ms() -> u64 {
        1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.retry_delay_ms, 1000);
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::default();

        assert!(policy.should_retry(0));
        assert!(policy.should_retry(1));

        // Never after the final attempt
        assert!(!policy.should_retry(2));
        assert!(!policy.should_retry(10));
    }

    #[test]
    fn test_backoff_delay_doubles() {
        let policy = RetryPolicy {
            max_retries: 5,
            retry_delay_ms: 100,
        };

        assert_eq!(policy.backoff_delay(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(400));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_delay_saturates() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(200), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_remaining_attempts() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.remaining_attempts(0), 3);
        assert_eq!(policy.remaining_attempts(2), 1);
        assert_eq!(policy.remaining_attempts(5), 0);
    }

    #[test]
    fn test_total_backoff() {
        let policy = RetryPolicy {
            max_retries: 3,
            retry_delay_ms: 1000,
        };
        // 1000 + 2000, nothing after the last attempt
        assert_eq!(policy.total_backoff(), Duration::from_millis(3000));

        let single = RetryPolicy {
            max_retries: 1,
            retry_delay_ms: 1000,
        };
        assert_eq!(single.total_backoff(), Duration::ZERO);
    }
}
