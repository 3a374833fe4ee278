//! Dispatch engine configuration
//!
//! Every field has a default, so an empty section is a valid config:
//!
//! ```text
//! (
//!     retry: (max_retries: 3, retry_delay_ms: 1000),
//!     circuit_breaker: (threshold: 3, cooldown_ms: 30000),
//!     rate_limit: (count: 5, window_ms: 60000),
//! )
//! ```

use serde::{Deserialize, Serialize};

use crate::{
    circuit_breaker::CircuitBreakerConfig,
    error::ValidationError,
    policy::{RateLimitConfig, RetryPolicy},
};

/// Settings fixed when a [`crate::DispatchEngine`] is built
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl DispatchConfig {
    /// Check every section, reporting all problems at once
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] listing each invalid field
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut problems = Vec::new();

        if self.retry.max_retries == 0 {
            problems.push("retry.max_retries must be at least 1".to_string());
        }

        if self.circuit_breaker.threshold == 0 {
            problems.push("circuit_breaker.threshold must be at least 1".to_string());
        }

        if self.rate_limit.count == 0 {
            problems.push("rate_limit.count must be at least 1".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { problems })
        }
    }
}
