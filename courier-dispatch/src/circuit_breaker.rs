//! Circuit breaker guarding the primary backend
//!
//! The breaker counts consecutive dispatch cycles in which the primary backend
//! was exhausted. Once that count reaches the threshold the breaker opens and
//! the primary is skipped without being invoked. After the cooldown the
//! breaker closes again on its own; there is no probe, the reset is
//! optimistic.
//!
//! # State Transitions
//!
//! ```text
//! ┌─────────┐  consecutive_failures >= threshold  ┌──────┐
//! │ Closed  │ ──────────────────────────────────> │ Open │
//! └─────────┘                                     └──────┘
//!      ^                                              │
//!      │              cooldown elapsed                │
//!      └──────────────────────────────────────────────┘
//! ```
//!
//! Failures recorded while open still bump the counter but neither extend the
//! cooldown nor grow it. Only a primary success resets the counter, so a
//! failure straight after an optimistic reset reopens the breaker.
//!
//! # Example
//!
//! ```text
//! Threshold: 3 failures
//! Cooldown: 30 seconds
//!
//! t=0s:   Closed (normal)
//! t=12s:  3rd exhausted cycle → Open
//! t=12s-42s: primary skipped, fallback used directly
//! t=42s:  Closed again, next cycle tries the primary
//! ```
//!
//! Time is read from [`tokio::time::Instant`], so the open window is evaluated
//! against the runtime's monotonic clock and no reset timer has to outlive the
//! breaker.

use std::time::Duration;

use courier_common::tracing;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive exhausted cycles required to open the circuit
    #[serde(default = "default_threshold")]
    pub threshold: u32,

    /// How long the circuit stays open (milliseconds)
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

impl CircuitBreakerConfig {
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

const fn default_threshold() -> u32 {
    3
}

const fn default_cooldown_ms() -> u64 {
    30_000
}

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Normal operation, the primary is tried
    Closed,
    /// Tripped, the primary is skipped
    Open,
}

#[derive(Debug)]
struct CircuitBreakerData {
    /// Exhausted cycles since the last primary success
    consecutive_failures: u32,
    /// When the circuit was opened, `None` while closed
    opened_at: Option<Instant>,
    /// Number of times the circuit has opened
    trips: u64,
}

impl CircuitBreakerData {
    const fn new() -> Self {
        Self {
            consecutive_failures: 0,
            opened_at: None,
            trips: 0,
        }
    }

    /// Close the circuit if the cooldown has run out
    fn refresh(&mut self, cooldown: Duration) {
        if let Some(opened_at) = self.opened_at
            && opened_at.elapsed() >= cooldown
        {
            self.opened_at = None;
            tracing::info!(
                consecutive_failures = self.consecutive_failures,
                "Circuit breaker reset after cooldown"
            );
        }
    }

    const fn state(&self) -> CircuitState {
        if self.opened_at.is_some() {
            CircuitState::Open
        } else {
            CircuitState::Closed
        }
    }
}

/// Breaker for a single backend
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    data: Mutex<CircuitBreakerData>,
}

impl CircuitBreaker {
    /// Create a closed circuit breaker
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            data: Mutex::new(CircuitBreakerData::new()),
        }
    }

    /// Threshold and cooldown this breaker was built with
    pub const fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Record an exhausted cycle.
    ///
    /// Returns `true` if this call opened the circuit.
    pub fn record_failure(&self) -> bool {
        let mut data = self.data.lock();
        data.refresh(self.config.cooldown());
        data.consecutive_failures = data.consecutive_failures.saturating_add(1);

        if data.opened_at.is_some() || data.consecutive_failures < self.config.threshold {
            return false;
        }

        data.opened_at = Some(Instant::now());
        data.trips = data.trips.saturating_add(1);
        tracing::warn!(
            failure_count = data.consecutive_failures,
            threshold = self.config.threshold,
            cooldown_ms = self.config.cooldown_ms,
            "Circuit breaker OPENED - skipping primary backend"
        );
        true
    }

    /// Record a successful delivery.
    ///
    /// Resets the failure count but leaves an open circuit open; only the
    /// cooldown closes it.
    pub fn record_success(&self) {
        self.data.lock().consecutive_failures = 0;
    }

    /// Whether calls to the guarded backend should be skipped
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Current state, closing the circuit first if the cooldown has run out
    pub fn state(&self) -> CircuitState {
        let mut data = self.data.lock();
        data.refresh(self.config.cooldown());
        data.state()
    }

    /// Snapshot for monitoring
    pub fn stats(&self) -> CircuitBreakerStats {
        let mut data = self.data.lock();
        data.refresh(self.config.cooldown());
        CircuitBreakerStats {
            state: data.state(),
            consecutive_failures: data.consecutive_failures,
            trips: data.trips,
        }
    }
}

/// Circuit breaker statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CircuitBreakerStats {
    /// Current circuit state
    pub state: CircuitState,
    /// Exhausted cycles since the last success
    pub consecutive_failures: u32,
    /// Number of times the circuit has opened
    pub trips: u64,
}
