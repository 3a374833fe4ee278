//! Resilient dispatch of outbound messages
//!
//! This crate provides:
//! - A primary/fallback [`DispatchEngine`] with per-recipient status tracking
//! - Bounded retries with exponential backoff ([`RetryPolicy`])
//! - A circuit breaker guarding the primary backend
//! - A single-worker, rate limited dispatch queue

mod backend;
mod circuit_breaker;
mod config;
mod engine;
mod error;
pub mod policy;
pub mod queue;
mod rate_limiter;
mod retry;
mod service;

pub use backend::{Backend, BackendRole, SharedBackend};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
pub use config::DispatchConfig;
// Re-export common types
pub use courier_common::{DeliveryStatus, Outcome};
pub use engine::{CYCLE_PANICKED, DispatchEngine, DispatchStats, Submission};
pub use error::{BackendError, DeliveryError, SetupError, ValidationError};
pub use policy::{RateLimitConfig, RetryPolicy};
pub use queue::DispatchQueue;
pub use rate_limiter::RateLimiter;
pub use retry::RetryExecutor;
pub use service::DispatchQueryService;
