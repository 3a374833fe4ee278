//! Bounded retries with exponential backoff against a single backend

use std::sync::Arc;

use courier_common::{outgoing, tracing};

use crate::{
    backend::{Backend, BackendRole},
    circuit_breaker::CircuitBreaker,
    error::DeliveryError,
    policy::RetryPolicy,
};

/// Drives [`RetryPolicy`] against one backend at a time.
///
/// The executor owns the primary's [`CircuitBreaker`]: it is the only place
/// the breaker is consulted and the only place it is told about outcomes.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    breaker: Arc<CircuitBreaker>,
}

impl RetryExecutor {
    #[must_use]
    pub const fn new(policy: RetryPolicy, breaker: Arc<CircuitBreaker>) -> Self {
        Self { policy, breaker }
    }

    /// Retry settings applied to every backend
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Breaker guarding the primary backend
    pub const fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Attempt delivery through `backend` until it succeeds or the policy's
    /// attempts run out.
    ///
    /// A primary backend behind an open breaker is skipped without being
    /// invoked and without consuming an attempt. A failed attempt is followed
    /// by a `retry_delay * 2^index` sleep, except after the last one.
    ///
    /// Returns the number of attempts used on success.
    ///
    /// # Errors
    ///
    /// - [`DeliveryError::CircuitOpen`] if the primary was skipped
    /// - [`DeliveryError::Exhausted`] wrapping the last attempt's error
    pub async fn send_with_retry(
        &self,
        backend: &dyn Backend,
        role: BackendRole,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<u32, DeliveryError> {
        if role.is_primary() && self.breaker.is_open() {
            tracing::info!(
                backend = backend.name(),
                recipient,
                "Circuit breaker open, skipping backend"
            );
            return Err(DeliveryError::CircuitOpen {
                backend: backend.name().to_string(),
            });
        }

        let mut last_error = None;

        for attempt in 0..self.policy.max_retries {
            outgoing!(
                backend = backend.name(),
                %role,
                recipient,
                attempt = attempt + 1,
                "Attempting delivery"
            );

            let error = match backend.attempt_delivery(recipient, subject, body).await {
                Ok(true) => {
                    if role.is_primary() {
                        self.breaker.record_success();
                    }
                    tracing::debug!(
                        backend = backend.name(),
                        recipient,
                        attempt = attempt + 1,
                        "Delivery accepted"
                    );
                    return Ok(attempt + 1);
                }
                Ok(false) => DeliveryError::Declined {
                    backend: backend.name().to_string(),
                },
                Err(source) => DeliveryError::Backend {
                    backend: backend.name().to_string(),
                    source,
                },
            };

            if self.policy.should_retry(attempt) {
                let delay = self.policy.backoff_delay(attempt);
                tracing::warn!(
                    backend = backend.name(),
                    recipient,
                    attempt = attempt + 1,
                    remaining = self.policy.remaining_attempts(attempt + 1),
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %error,
                    "Delivery attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
            } else {
                tracing::warn!(
                    backend = backend.name(),
                    recipient,
                    attempt = attempt + 1,
                    error = %error,
                    "Final delivery attempt failed"
                );
            }

            last_error = Some(error);
        }

        if role.is_primary() {
            self.breaker.record_failure();
        }

        Err(DeliveryError::Exhausted {
            backend: backend.name().to_string(),
            attempts: self.policy.max_retries,
            last: Box::new(last_error.unwrap_or(DeliveryError::Declined {
                backend: backend.name().to_string(),
            })),
        })
    }
}
