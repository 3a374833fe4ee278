//! Read-only view of dispatch state
//!
//! Lets monitoring and control code inspect a running engine without
//! depending on [`DispatchEngine`] directly.

use courier_common::{DeliveryStatus, Outcome};

use crate::{CircuitBreakerStats, DispatchEngine, DispatchStats};

/// Service trait for querying dispatch state
///
/// # Example
///
/// ```rust,ignore
/// fn report(service: &dyn DispatchQueryService) -> usize {
///     service.list_statuses(Some(Outcome::Failed)).len()
/// }
/// ```
pub trait DispatchQueryService: Send + Sync {
    /// Record for a recipient, `None` if nothing was ever sent to it
    fn get_status(&self, recipient: &str) -> Option<DeliveryStatus>;

    /// All records, optionally only those with the given outcome
    fn list_statuses(&self, outcome: Option<Outcome>) -> Vec<DeliveryStatus>;

    /// Dispatch cycles queued or running
    fn pending_count(&self) -> usize;

    /// State of the primary backend's circuit breaker
    fn circuit_breaker_stats(&self) -> CircuitBreakerStats;

    /// Counters over finished dispatch cycles
    fn dispatch_stats(&self) -> DispatchStats;
}

impl DispatchQueryService for DispatchEngine {
    fn get_status(&self, recipient: &str) -> Option<DeliveryStatus> {
        Self::get_status(self, recipient)
    }

    fn list_statuses(&self, outcome: Option<Outcome>) -> Vec<DeliveryStatus> {
        Self::list_statuses(self, outcome)
    }

    fn pending_count(&self) -> usize {
        Self::pending_count(self)
    }

    fn circuit_breaker_stats(&self) -> CircuitBreakerStats {
        Self::circuit_breaker_stats(self)
    }

    fn dispatch_stats(&self) -> DispatchStats {
        self.stats()
    }
}
