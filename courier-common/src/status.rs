use core::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Resolution of a dispatch cycle
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum Outcome {
    /// Queued, or currently being dispatched
    #[default]
    Pending,
    /// A backend accepted the message
    Delivered,
    /// Both backends were exhausted
    Failed,
}

impl Outcome {
    /// Checks if the cycle has finished, either way
    pub const fn is_resolved(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl Display for Outcome {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        fmt.pad(match self {
            Self::Pending => "pending",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        })
    }
}

/// Delivery record for a single recipient.
///
/// Created when the first send for a recipient is accepted and resolved
/// exactly once, when that send's dispatch cycle completes. A recipient
/// never has more than one record.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct DeliveryStatus {
    /// Recipient identity, the record key
    pub recipient: String,
    /// Subject of the message, fixed at creation
    pub subject: String,
    /// Completed dispatch cycles (not individual backend attempts)
    pub attempts: u32,
    /// Name of the backend that produced the final outcome, empty while pending
    pub backend_used: String,
    /// Current resolution
    pub outcome: Outcome,
    /// Last failure seen by the cycle that failed
    pub error: Option<String>,
}

impl DeliveryStatus {
    /// A fresh record for a message that has just been queued
    #[must_use]
    pub fn pending(recipient: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            subject: subject.into(),
            attempts: 0,
            backend_used: String::new(),
            outcome: Outcome::Pending,
            error: None,
        }
    }

    /// `None` while pending, otherwise whether delivery succeeded
    pub const fn success(&self) -> Option<bool> {
        match self.outcome {
            Outcome::Pending => None,
            Outcome::Delivered => Some(true),
            Outcome::Failed => Some(false),
        }
    }

    pub const fn is_pending(&self) -> bool {
        !self.outcome.is_resolved()
    }

    /// Record the result of a finished dispatch cycle.
    ///
    /// Counts exactly one attempt no matter how many backend calls the cycle
    /// made.
    pub fn resolve(&mut self, backend: impl Into<String>, result: Result<(), String>) {
        self.attempts = self.attempts.saturating_add(1);
        self.backend_used = backend.into();

        match result {
            Ok(()) => {
                self.outcome = Outcome::Delivered;
                self.error = None;
            }
            Err(error) => {
                self.outcome = Outcome::Failed;
                self.error = Some(error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{DeliveryStatus, Outcome};

    #[test]
    fn test_pending_record() {
        let status = DeliveryStatus::pending("alice@example.com", "Hello");

        assert_eq!(status.attempts, 0);
        assert!(status.backend_used.is_empty());
        assert_eq!(status.success(), None);
        assert!(status.is_pending());
    }

    #[test]
    fn test_resolve_delivered() {
        let mut status = DeliveryStatus::pending("alice@example.com", "Hello");
        status.resolve("PrimaryProvider", Ok(()));

        assert_eq!(
            status,
            DeliveryStatus {
                recipient: "alice@example.com".to_string(),
                subject: "Hello".to_string(),
                attempts: 1,
                backend_used: "PrimaryProvider".to_string(),
                outcome: Outcome::Delivered,
                error: None,
            }
        );
        assert_eq!(status.success(), Some(true));
    }

    #[test]
    fn test_resolve_failed() {
        let mut status = DeliveryStatus::pending("bob@example.com", "Hi");
        status.resolve("SecondaryProvider", Err("connection refused".to_string()));

        assert_eq!(status.attempts, 1);
        assert_eq!(status.outcome, Outcome::Failed);
        assert_eq!(status.success(), Some(false));
        assert_eq!(status.error.as_deref(), Some("connection refused"));
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(Outcome::Pending.to_string(), "pending");
        assert_eq!(Outcome::Delivered.to_string(), "delivered");
        assert_eq!(Outcome::Failed.to_string(), "failed");
        assert!(Outcome::Failed.is_resolved());
    }
}
