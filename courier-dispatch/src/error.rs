//! Typed error handling for dispatch operations.
//!
//! Backend failures are all treated as transient: they drive retry with
//! backoff. Exhaustion of one backend drives fallthrough to the next, and an
//! open circuit breaker is a policy skip rather than a failure of the call.

use thiserror::Error;

/// Failure reported by a delivery backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Could not reach the transport.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The transport did not answer in time.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The transport refused the message.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Anything else the backend wants to report.
    #[error("Internal backend error: {0}")]
    Internal(String),
}

/// Error produced while dispatching a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The backend reported an unsuccessful delivery without raising.
    #[error("{backend} declined delivery")]
    Declined { backend: String },

    /// The backend raised an error.
    #[error("{backend} failed: {source}")]
    Backend {
        backend: String,
        #[source]
        source: BackendError,
    },

    /// The backend was skipped because its circuit breaker is open.
    #[error("Circuit breaker open for {backend}")]
    CircuitOpen { backend: String },

    /// Every retry against the backend failed.
    #[error("{backend} exhausted after {attempts} attempts: {last}")]
    Exhausted {
        backend: String,
        attempts: u32,
        last: Box<DeliveryError>,
    },

    /// The dispatch queue no longer accepts work.
    #[error("Dispatch queue is closed")]
    QueueClosed,
}

/// Error raised while building the dispatcher.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The supplied configuration failed validation.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// The dispatcher must be built inside a Tokio runtime.
    #[error("No Tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

/// Every problem found in a dispatch configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid dispatch configuration: {}", .problems.join(", "))]
pub struct ValidationError {
    pub problems: Vec<String>,
}

impl DeliveryError {
    /// Returns `true` for a single failed attempt that may succeed on retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Declined { .. } | Self::Backend { .. })
    }

    /// Returns `true` if all retries against a backend were spent.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    /// Returns `true` if the backend was skipped by its circuit breaker.
    #[must_use]
    pub const fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// The innermost error, i.e. the last attempt that actually failed.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Exhausted { last, .. } => last.root_cause(),
            other => other,
        }
    }
}
