//! Types and logging shared by every courier crate

pub mod logging;
pub mod status;

pub use status::{DeliveryStatus, Outcome};
pub use tracing;

/// Lifecycle signal broadcast to long running tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
}
