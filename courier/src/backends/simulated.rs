use std::time::Duration;

use async_trait::async_trait;
use courier_common::{outgoing, tracing};
use courier_dispatch::{Backend, BackendError};
use rand::Rng;
use serde::{Deserialize, Serialize};

mod defaults {
    pub const fn success_rate() -> f64 {
        0.5
    }
}

/// Settings for a [`SimulatedBackend`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedBackendConfig {
    /// Name reported in delivery statuses
    pub name: String,

    /// Probability in `[0, 1]` that a single attempt is accepted
    #[serde(default = "defaults::success_rate")]
    pub success_rate: f64,

    /// How long every attempt takes to answer
    #[serde(default)]
    pub latency_ms: u64,
}

impl SimulatedBackendConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success_rate: defaults::success_rate(),
            latency_ms: 0,
        }
    }

    #[must_use]
    pub fn with_success_rate(mut self, success_rate: f64) -> Self {
        self.success_rate = success_rate;
        self
    }

    #[must_use]
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Problems with this backend's settings, prefixed with `field`
    pub fn problems(&self, field: &str) -> Vec<String> {
        let mut problems = Vec::new();

        if self.name.trim().is_empty() {
            problems.push(format!("{field}.name must not be empty"));
        }

        if !(0.0..=1.0).contains(&self.success_rate) {
            problems.push(format!(
                "{field}.success_rate must be between 0 and 1, got {}",
                self.success_rate
            ));
        }

        problems
    }
}

/// A stand-in transport that accepts messages at random.
///
/// Nothing is actually sent anywhere. Each attempt waits out the configured
/// latency, then succeeds with probability `success_rate`.
#[derive(Debug, Clone)]
pub struct SimulatedBackend {
    name: String,
    success_rate: f64,
    latency: Duration,
}

impl SimulatedBackend {
    /// Out of range rates are clamped. NaN never delivers.
    pub fn new(config: &SimulatedBackendConfig) -> Self {
        let success_rate = if config.success_rate.is_nan() {
            0.0
        } else {
            config.success_rate.clamp(0.0, 1.0)
        };

        Self {
            name: config.name.clone(),
            success_rate,
            latency: Duration::from_millis(config.latency_ms),
        }
    }

    pub const fn success_rate(&self) -> f64 {
        self.success_rate
    }
}

#[async_trait]
impl Backend for SimulatedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attempt_delivery(
        &self,
        recipient: &str,
        subject: &str,
        _body: &str,
    ) -> Result<bool, BackendError> {
        outgoing!(
            level = DEBUG,
            backend = self.name.as_str(),
            recipient,
            subject,
            "Sending message"
        );

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let delivered = rand::rng().random_bool(self.success_rate);
        outgoing!(
            backend = self.name.as_str(),
            recipient,
            delivered,
            "Simulated result"
        );

        Ok(delivered)
    }
}
