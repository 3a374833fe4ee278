//! Rate limit policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// `count` dispatch cycles per `window_ms`, smoothed into a constant spacing
/// of `window_ms / count` between cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Permits per window
    #[serde(default = "default_count")]
    pub count: u32,

    /// Window length in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            count: default_count(),
            window_ms: default_window_ms(),
        }
    }
}

const fn default_count() -> u32 {
    5
}

const fn default_window_ms() -> u64 {
    60_000 // 5 per minute, one every 12s
}

impl RateLimitConfig {
    /// Minimum gap between the end of one cycle and the start of the next.
    ///
    /// A zero `count` is rejected by validation; here it is treated as one
    /// permit per window.
    #[must_use]
    pub fn spacing(&self) -> Duration {
        Duration::from_millis(self.window_ms) / self.count.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spacing() {
        assert_eq!(RateLimitConfig::default().spacing(), Duration::from_secs(12));

        let one_per_second = RateLimitConfig {
            count: 1,
            window_ms: 1000,
        };
        assert_eq!(one_per_second.spacing(), Duration::from_millis(1000));

        let fractional = RateLimitConfig {
            count: 3,
            window_ms: 1000,
        };
        assert_eq!(fractional.spacing(), Duration::from_nanos(333_333_333));
    }

    #[test]
    fn test_spacing_zero_count() {
        let config = RateLimitConfig {
            count: 0,
            window_ms: 500,
        };
        assert_eq!(config.spacing(), Duration::from_millis(500));
    }
}
