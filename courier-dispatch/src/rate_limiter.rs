//! Spacing rate limiter for the dispatch queue
//!
//! Unlike a token bucket this limiter never lets a burst through: every
//! dispatch cycle after the first waits until `window / count` has passed
//! since the previous cycle finished.
//!
//! # Example
//!
//! ```text
//! Rate limit: 5 per 60s → spacing 12s
//! - 10 sends arrive at t=0
//! - cycle 1 starts at t=0 and takes 2s
//! - cycle 2 starts at t=14s, cycle 3 at t=26s+, ...
//! ```

use std::time::Duration;

use courier_common::tracing;
use tokio::time::Instant;

use crate::policy::RateLimitConfig;

#[derive(Debug)]
pub struct RateLimiter {
    spacing: Duration,
    /// Earliest instant the next cycle may start
    next_permit: Option<Instant>,
}

impl RateLimiter {
    /// Limiter whose first permit is available immediately
    #[must_use]
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            spacing: config.spacing(),
            next_permit: None,
        }
    }

    /// `window / count`, the gap enforced between cycles
    pub const fn spacing(&self) -> Duration {
        self.spacing
    }

    /// How long the caller would have to wait right now
    pub fn time_until_available(&self) -> Duration {
        self.next_permit
            .map_or(Duration::ZERO, |permit| {
                permit.saturating_duration_since(Instant::now())
            })
    }

    /// Wait until the next cycle is allowed to start
    pub async fn acquire(&self) {
        if let Some(permit) = self.next_permit {
            let wait = self.time_until_available();
            if !wait.is_zero() {
                tracing::debug!(
                    wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                    "Rate limit spacing, waiting"
                );
            }
            tokio::time::sleep_until(permit).await;
        }
    }

    /// Mark the current cycle as finished, starting the spacing interval
    pub fn release(&mut self) {
        self.next_permit = Some(Instant::now() + self.spacing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(count: u32, window_ms: u64) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig { count, window_ms })
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_acquire_is_immediate() {
        let limiter = limiter(1, 1000);
        let start = Instant::now();

        limiter.acquire().await;

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.time_until_available(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spacing_after_release() {
        let mut limiter = limiter(4, 1000);
        assert_eq!(limiter.spacing(), Duration::from_millis(250));

        limiter.acquire().await;
        limiter.release();
        assert_eq!(limiter.time_until_available(), Duration::from_millis(250));

        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_time_counts_toward_spacing() {
        let mut limiter = limiter(1, 1000);

        limiter.release();
        tokio::time::advance(Duration::from_millis(600)).await;
        assert_eq!(limiter.time_until_available(), Duration::from_millis(400));

        tokio::time::advance(Duration::from_millis(600)).await;
        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
