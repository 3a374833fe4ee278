//! Policy abstractions for dispatch operations.
//!
//! Policies are plain serde structs with pure helper methods; the components
//! that act on them (`RetryExecutor`, `RateLimiter`, `CircuitBreaker`) hold no
//! configuration of their own.
//!
//! - [`RetryPolicy`]: attempts per backend and exponential backoff
//! - [`RateLimitConfig`]: constant spacing between dispatch cycles

pub mod rate;
pub mod retry;

pub use rate::RateLimitConfig;
pub use retry::RetryPolicy;
