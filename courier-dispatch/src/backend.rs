//! The delivery capability consumed by the dispatcher
//!
//! A backend is anything that can attempt to hand one message to a transport
//! (SMTP relay, HTTP API, message bus) and say whether that worked. The
//! dispatcher imposes no timeout on these calls, so implementations are
//! expected to bound their own I/O.

use std::{fmt, sync::Arc};

use async_trait::async_trait;

use crate::error::BackendError;

/// An interchangeable delivery backend
#[async_trait]
pub trait Backend: Send + Sync {
    /// Name used in logs and recorded as `backend_used` on delivery records
    fn name(&self) -> &str;

    /// Attempt delivery of a single message.
    ///
    /// `Ok(true)` means the message was accepted, `Ok(false)` that the backend
    /// declined it. Both `Ok(false)` and `Err` are retried by the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] describing why the transport failed.
    async fn attempt_delivery(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<bool, BackendError>;
}

/// Which slot a backend occupies.
///
/// Only the primary is protected by the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendRole {
    Primary,
    Fallback,
}

impl BackendRole {
    pub const fn is_primary(self) -> bool {
        matches!(self, Self::Primary)
    }
}

impl fmt::Display for BackendRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
        })
    }
}

/// Shared handle to a backend
pub type SharedBackend = Arc<dyn Backend>;
