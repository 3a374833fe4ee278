//! Dispatch engine orchestration
//!
//! ```text
//! send(recipient, subject, body)
//!     → pending DeliveryStatus (one per recipient, duplicates ignored)
//!     → DispatchQueue (FIFO, single worker, rate limited)
//!     → RetryExecutor against the primary (skipped while the breaker is open)
//!     → RetryExecutor against the fallback, if the primary failed
//!     → DeliveryStatus resolved with outcome and backend used
//! ```

use std::{
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use courier_common::{DeliveryStatus, Outcome, internal, tracing};
use dashmap::{DashMap, mapref::entry::Entry};
use futures_util::FutureExt;
use serde::Serialize;

use crate::{
    backend::{BackendRole, SharedBackend},
    circuit_breaker::{CircuitBreaker, CircuitBreakerStats, CircuitState},
    config::DispatchConfig,
    error::SetupError,
    queue::DispatchQueue,
    retry::RetryExecutor,
};

/// What happened to a call to [`DispatchEngine::send`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// A dispatch cycle was queued
    Queued,
    /// The recipient already has a record; nothing was queued
    Duplicate,
    /// The engine has been shut down; nothing was queued
    Closed,
}

/// Error recorded when a backend panics mid-cycle
pub const CYCLE_PANICKED: &str = "dispatch cycle panicked";

/// Counters over every dispatch cycle the engine has finished
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Cycles that reached a final outcome
    pub cycles_completed: u64,
    /// Cycles delivered by the primary backend
    pub delivered_primary: u64,
    /// Cycles delivered by the fallback backend
    pub delivered_fallback: u64,
    /// Cycles where both backends were exhausted
    pub failed: u64,
    /// Cycles where the open breaker skipped the primary
    pub primary_skipped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    cycles_completed: AtomicU64,
    delivered_primary: AtomicU64,
    delivered_fallback: AtomicU64,
    failed: AtomicU64,
    primary_skipped: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            delivered_primary: self.delivered_primary.load(Ordering::Relaxed),
            delivered_fallback: self.delivered_fallback.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            primary_skipped: self.primary_skipped.load(Ordering::Relaxed),
        }
    }
}

/// State shared between the engine handle and queued work items
struct Dispatcher {
    primary: SharedBackend,
    fallback: SharedBackend,
    executor: RetryExecutor,
    statuses: DashMap<String, DeliveryStatus>,
    counters: Counters,
}

impl Dispatcher {
    /// Run one cycle and resolve the recipient's record with its outcome.
    ///
    /// A backend that panics fails the cycle instead of leaving the record
    /// pending forever.
    async fn dispatch(&self, recipient: &str, subject: &str, body: &str) {
        let cycle = AssertUnwindSafe(self.run_cycle(recipient, subject, body))
            .catch_unwind()
            .await;

        let (backend, result) = cycle.unwrap_or_else(|_| {
            Counters::bump(&self.counters.failed);
            ("", Err(CYCLE_PANICKED.to_string()))
        });

        match &result {
            Ok(()) => tracing::info!(recipient, backend, "Message delivered"),
            Err(error) => tracing::error!(
                recipient,
                backend,
                error = %error,
                "Delivery failed on every backend"
            ),
        }

        if let Some(mut status) = self.statuses.get_mut(recipient) {
            status.resolve(backend, result);
        }
        Counters::bump(&self.counters.cycles_completed);
    }

    /// Primary, then fallback if needed. Returns the deciding backend's name.
    async fn run_cycle(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> (&str, Result<(), String>) {
        let primary = self
            .executor
            .send_with_retry(
                self.primary.as_ref(),
                BackendRole::Primary,
                recipient,
                subject,
                body,
            )
            .await;

        match primary {
            Ok(_) => {
                Counters::bump(&self.counters.delivered_primary);
                (self.primary.name(), Ok(()))
            }
            Err(primary_error) => {
                if primary_error.is_circuit_open() {
                    Counters::bump(&self.counters.primary_skipped);
                }
                tracing::info!(
                    recipient,
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    reason = %primary_error,
                    "Primary backend failed, switching to fallback"
                );

                let fallback = self
                    .executor
                    .send_with_retry(
                        self.fallback.as_ref(),
                        BackendRole::Fallback,
                        recipient,
                        subject,
                        body,
                    )
                    .await;

                match fallback {
                    Ok(_) => {
                        Counters::bump(&self.counters.delivered_fallback);
                        (self.fallback.name(), Ok(()))
                    }
                    Err(error) => {
                        Counters::bump(&self.counters.failed);
                        (self.fallback.name(), Err(error.root_cause().to_string()))
                    }
                }
            }
        }
    }
}

/// Public entry point of the dispatcher.
///
/// Owns the per-recipient status map, the primary's circuit breaker and the
/// dispatch queue. Nothing is process global: two engines never share state.
/// Dropping the engine aborts its queue worker.
pub struct DispatchEngine {
    config: DispatchConfig,
    dispatcher: Arc<Dispatcher>,
    queue: DispatchQueue,
}

impl DispatchEngine {
    /// Build an engine and start its queue worker.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid or no Tokio runtime is running.
    pub fn new(
        config: DispatchConfig,
        primary: SharedBackend,
        fallback: SharedBackend,
    ) -> Result<Self, SetupError> {
        config.validate()?;

        let breaker = Arc::new(CircuitBreaker::new(config.circuit_breaker.clone()));
        let executor = RetryExecutor::new(config.retry.clone(), breaker);
        let queue = DispatchQueue::new(&config.rate_limit)?;

        internal!(
            level = INFO,
            primary = primary.name(),
            fallback = fallback.name(),
            max_retries = config.retry.max_retries,
            retry_delay_ms = config.retry.retry_delay_ms,
            max_backoff_ms = u64::try_from(config.retry.total_backoff().as_millis())
                .unwrap_or(u64::MAX),
            breaker_threshold = config.circuit_breaker.threshold,
            breaker_cooldown_ms = config.circuit_breaker.cooldown_ms,
            rate_limit_count = config.rate_limit.count,
            rate_limit_window_ms = config.rate_limit.window_ms,
            "Dispatch engine started"
        );

        Ok(Self {
            config,
            dispatcher: Arc::new(Dispatcher {
                primary,
                fallback,
                executor,
                statuses: DashMap::new(),
                counters: Counters::default(),
            }),
            queue,
        })
    }

    /// Queue a message for delivery and return immediately.
    ///
    /// The first send for a recipient creates its pending record. Any later
    /// send for the same recipient is ignored, even once the first one has
    /// resolved. Outcomes are observed through [`Self::get_status`].
    pub fn send(
        &self,
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Submission {
        let recipient = recipient.into();
        let subject = subject.into();

        if self.queue.is_closed() {
            tracing::warn!(%recipient, "Dispatch engine is shut down, message not queued");
            return Submission::Closed;
        }

        match self.dispatcher.statuses.entry(recipient.clone()) {
            Entry::Occupied(_) => {
                tracing::debug!(
                    %recipient,
                    "Message already sent or being sent to this recipient"
                );
                return Submission::Duplicate;
            }
            Entry::Vacant(entry) => {
                entry.insert(DeliveryStatus::pending(recipient.clone(), subject.clone()));
            }
        }

        let dispatcher = Arc::clone(&self.dispatcher);
        let job_recipient = recipient.clone();
        let body = body.into();
        let job = Box::pin(async move {
            dispatcher.dispatch(&job_recipient, &subject, &body).await;
        });

        if let Err(e) = self.queue.enqueue(job) {
            // Never reached the worker, so the record was never real
            self.dispatcher.statuses.remove(&recipient);
            tracing::warn!(%recipient, error = %e, "Message not queued");
            return Submission::Closed;
        }

        tracing::debug!(%recipient, queued = self.queue.len(), "Message queued");
        Submission::Queued
    }

    /// Snapshot of a recipient's record, `None` if it was never sent to
    pub fn get_status(&self, recipient: &str) -> Option<DeliveryStatus> {
        self.dispatcher
            .statuses
            .get(recipient)
            .map(|entry| entry.value().clone())
    }

    /// Every record, optionally only those with the given outcome, sorted by
    /// recipient
    pub fn list_statuses(&self, outcome: Option<Outcome>) -> Vec<DeliveryStatus> {
        let mut statuses: Vec<_> = self
            .dispatcher
            .statuses
            .iter()
            .filter(|entry| outcome.is_none_or(|outcome| entry.value().outcome == outcome))
            .map(|entry| entry.value().clone())
            .collect();
        statuses.sort_by(|a, b| a.recipient.cmp(&b.recipient));
        statuses
    }

    /// Dispatch cycles queued or running
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// State of the breaker guarding the primary
    pub fn circuit_state(&self) -> CircuitState {
        self.dispatcher.executor.breaker().state()
    }

    /// Snapshot of the primary's breaker counters
    pub fn circuit_breaker_stats(&self) -> CircuitBreakerStats {
        self.dispatcher.executor.breaker().stats()
    }

    /// Snapshot of the dispatch cycle counters
    pub fn stats(&self) -> DispatchStats {
        self.dispatcher.counters.snapshot()
    }

    /// Settings the engine was built with
    pub const fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Resolve once every cycle queued so far has finished
    pub async fn wait_idle(&self) {
        self.queue.wait_idle().await;
    }

    /// Stop accepting sends and give queued cycles up to `grace` to finish.
    ///
    /// Returns `true` if everything finished. Records of abandoned cycles stay
    /// pending.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        internal!(
            level = INFO,
            pending = self.queue.len(),
            "Dispatch engine shutting down"
        );
        let drained = self.queue.shutdown(grace).await;
        internal!(level = INFO, drained, "Dispatch engine shutdown complete");
        drained
    }
}

impl std::fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("primary", &self.dispatcher.primary.name())
            .field("fallback", &self.dispatcher.fallback.name())
            .field("config", &self.config)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}
