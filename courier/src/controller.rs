use std::{fmt, sync::Arc, time::Duration};

use courier_common::{DeliveryStatus, Signal, internal, logging, tracing};
use courier_dispatch::{
    CircuitBreakerStats, DispatchEngine, DispatchStats, SharedBackend, Submission,
};
use tokio::sync::broadcast;

use crate::{backends::SimulatedBackend, config::CourierConfig};

/// What was left once the controller stopped
#[derive(Debug, Clone)]
pub struct Report {
    /// Whether every submitted message reached a final outcome
    pub completed: bool,
    pub statuses: Vec<DeliveryStatus>,
    pub stats: DispatchStats,
    pub breaker: CircuitBreakerStats,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<32} {:<10} {:<20} {:>8}  ERROR",
            "RECIPIENT", "OUTCOME", "BACKEND", "ATTEMPTS"
        )?;

        for status in &self.statuses {
            writeln!(
                f,
                "{:<32} {:<10} {:<20} {:>8}  {}",
                status.recipient,
                status.outcome,
                status.backend_used,
                status.attempts,
                status.error.as_deref().unwrap_or("-")
            )?;
        }

        write!(
            f,
            "\n{} completed: {} via primary, {} via fallback, {} failed, primary skipped {} times \
             (circuit {:?}, tripped {} times)",
            self.stats.cycles_completed,
            self.stats.delivered_primary,
            self.stats.delivered_fallback,
            self.stats.failed,
            self.stats.primary_skipped,
            self.breaker.state,
            self.breaker.trips
        )
    }
}

/// Drives one [`DispatchEngine`] for the lifetime of the process
pub struct Controller {
    config: CourierConfig,
    signals: broadcast::Sender<Signal>,
    receiver: broadcast::Receiver<Signal>,
}

impl Controller {
    pub fn new(config: CourierConfig) -> Self {
        let (signals, receiver) = broadcast::channel(16);
        Self {
            config,
            signals,
            receiver,
        }
    }

    /// Handle for requesting a shutdown with [`Signal::Shutdown`]
    pub fn signals(&self) -> broadcast::Sender<Signal> {
        self.signals.clone()
    }

    /// Build the engine, submit every configured message and wait until they
    /// have all resolved or a shutdown is requested.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine can't be built
    pub async fn run(mut self) -> anyhow::Result<Report> {
        logging::init();

        let primary: SharedBackend = Arc::new(SimulatedBackend::new(&self.config.primary));
        let fallback: SharedBackend = Arc::new(SimulatedBackend::new(&self.config.fallback));
        let engine = DispatchEngine::new(self.config.dispatch.clone(), primary, fallback)?;

        internal!(
            level = INFO,
            messages = self.config.messages.len(),
            "Controller running"
        );

        for message in std::mem::take(&mut self.config.messages) {
            let recipient = message.recipient.clone();
            match engine.send(message.recipient, message.subject, message.body) {
                Submission::Queued => {}
                Submission::Duplicate => tracing::warn!(
                    %recipient,
                    "Duplicate recipient in configuration, message skipped"
                ),
                Submission::Closed => tracing::error!(%recipient, "Engine closed during startup"),
            }
        }

        let completed = tokio::select! {
            () = engine.wait_idle() => true,
            () = wait_for_shutdown(&mut self.receiver) => false,
        };

        if !completed {
            internal!(level = INFO, "Shutting down...");
        }

        let grace = Duration::from_secs(self.config.shutdown_grace_secs);
        let drained = engine.shutdown(grace).await;

        Ok(Report {
            completed: completed || drained,
            statuses: engine.list_statuses(None),
            stats: engine.stats(),
            breaker: engine.circuit_breaker_stats(),
        })
    }
}

async fn wait_for_shutdown(receiver: &mut broadcast::Receiver<Signal>) {
    loop {
        match receiver.recv().await {
            Ok(Signal::Shutdown) | Err(broadcast::error::RecvError::Closed) => return,
            Err(e) => tracing::debug!("Received: {e:?}"),
        }
    }
}

/// Wait for CTRL+C or SIGTERM, then broadcast [`Signal::Shutdown`]
///
/// # Errors
///
/// Returns an error if the signal handlers can't be installed
pub async fn listen_for_shutdown(signals: broadcast::Sender<Signal>) -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!(level = INFO, "CTRL+C entered, shutting down");
        }
        _ = terminate.recv() => {
            internal!(level = INFO, "Terminate Signal received, shutting down");
        }
    };

    signals.send(Signal::Shutdown)?;
    Ok(())
}
