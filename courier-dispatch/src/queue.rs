//! Rate limited FIFO of dispatch work
//!
//! Exactly one worker task drains the queue. It is spawned when the queue is
//! built and fed through an unbounded channel, so FIFO order is channel order
//! and no two items ever run at the same time. Between items the worker waits
//! out the [`RateLimiter`] spacing.

use std::{panic::AssertUnwindSafe, sync::Arc, time::Duration};

use courier_common::{internal, tracing};
use futures_util::{FutureExt, future::BoxFuture};
use parking_lot::Mutex;
use tokio::{
    runtime::Handle,
    sync::{mpsc, watch},
    task::JoinHandle,
};

use crate::{
    error::{DeliveryError, SetupError},
    policy::RateLimitConfig,
    rate_limiter::RateLimiter,
};

/// One unit of deferred work: a complete dispatch cycle
pub type QueueItem = BoxFuture<'static, ()>;

#[derive(Debug)]
pub struct DispatchQueue {
    sender: Mutex<Option<mpsc::UnboundedSender<QueueItem>>>,
    /// Items queued or running
    outstanding: Arc<watch::Sender<usize>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    spacing: Duration,
}

impl DispatchQueue {
    /// Build the queue and spawn its worker on the current runtime
    ///
    /// # Errors
    ///
    /// Returns an error if called outside of a Tokio runtime
    pub fn new(config: &RateLimitConfig) -> Result<Self, SetupError> {
        let handle = Handle::try_current()?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let (outstanding, _) = watch::channel(0);
        let outstanding = Arc::new(outstanding);
        let limiter = RateLimiter::new(config);
        let spacing = limiter.spacing();

        let worker = handle.spawn(drain(receiver, limiter, Arc::clone(&outstanding)));

        internal!(
            level = DEBUG,
            spacing_ms = u64::try_from(spacing.as_millis()).unwrap_or(u64::MAX),
            "Dispatch queue started"
        );

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            outstanding,
            worker: Mutex::new(Some(worker)),
            spacing,
        })
    }

    /// Append an item to the tail of the queue
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::QueueClosed`] once the queue has been closed
    pub fn enqueue(&self, item: QueueItem) -> Result<(), DeliveryError> {
        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            return Err(DeliveryError::QueueClosed);
        };

        self.outstanding.send_modify(|count| *count += 1);
        sender.send(item).map_err(|_| {
            self.outstanding
                .send_modify(|count| *count = count.saturating_sub(1));
            DeliveryError::QueueClosed
        })
    }

    /// Items queued or in flight
    pub fn len(&self) -> usize {
        *self.outstanding.borrow()
    }

    /// Whether nothing is queued or in flight
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the queue has stopped accepting items
    pub fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .as_ref()
            .is_none_or(mpsc::UnboundedSender::is_closed)
    }

    /// Minimum gap between the end of one item and the start of the next
    pub const fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Resolve once every item enqueued so far has finished
    pub async fn wait_idle(&self) {
        let mut receiver = self.outstanding.subscribe();
        let _ = receiver.wait_for(|count| *count == 0).await;
    }

    /// Stop accepting new items. Already queued items still run.
    pub fn close(&self) {
        if self.sender.lock().take().is_some() {
            internal!(level = DEBUG, "Dispatch queue closed");
        }
    }

    /// Close the queue and wait up to `grace` for queued items to finish.
    ///
    /// Returns `true` if the worker drained everything in time. Otherwise the
    /// worker is aborted and whatever was left is dropped.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.close();

        let Some(mut worker) = self.worker.lock().take() else {
            return true;
        };

        if tokio::time::timeout(grace, &mut worker).await.is_ok() {
            internal!("All queued dispatches completed");
            true
        } else {
            tracing::warn!(
                remaining = self.len(),
                "Shutdown grace period exceeded, abandoning queued dispatches"
            );
            worker.abort();
            self.outstanding.send_replace(0);
            false
        }
    }
}

impl Drop for DispatchQueue {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.abort();
        }
    }
}

async fn drain(
    mut receiver: mpsc::UnboundedReceiver<QueueItem>,
    mut limiter: RateLimiter,
    outstanding: Arc<watch::Sender<usize>>,
) {
    while let Some(item) = receiver.recv().await {
        limiter.acquire().await;

        if AssertUnwindSafe(item).catch_unwind().await.is_err() {
            tracing::error!("Dispatch cycle panicked, continuing with next item");
        }

        limiter.release();
        outstanding.send_modify(|count| *count = count.saturating_sub(1));
    }

    internal!(level = DEBUG, "Dispatch worker stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use tokio::time::Instant;

    use super::*;

    fn queue(count: u32, window_ms: u64) -> DispatchQueue {
        DispatchQueue::new(&RateLimitConfig { count, window_ms }).unwrap()
    }

    fn record(log: &Arc<Mutex<Vec<(usize, Instant)>>>, index: usize) -> QueueItem {
        let log = Arc::clone(log);
        Box::pin(async move {
            log.lock().push((index, Instant::now()));
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifo_order_and_spacing() {
        let queue = queue(2, 1000);
        let log = Arc::new(Mutex::new(Vec::new()));

        for index in 0..3 {
            queue.enqueue(record(&log, index)).unwrap();
        }
        queue.wait_idle().await;

        let log = log.lock().clone();
        let order: Vec<_> = log.iter().map(|(index, _)| *index).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(log[1].1 - log[0].1, Duration::from_millis(500));
        assert_eq!(log[2].1 - log[1].1, Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_items_never_overlap() {
        let queue = queue(1000, 1000);
        let running = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let overlaps = Arc::new(std::sync::atomic::AtomicU32::new(0));

        for _ in 0..5 {
            let running = Arc::clone(&running);
            let overlaps = Arc::clone(&overlaps);
            queue
                .enqueue(Box::pin(async move {
                    if running.swap(true, std::sync::atomic::Ordering::SeqCst) {
                        overlaps.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    }
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    running.store(false, std::sync::atomic::Ordering::SeqCst);
                }))
                .unwrap();
        }
        queue.wait_idle().await;

        assert_eq!(overlaps.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_len_tracks_outstanding_items() {
        let queue = queue(1, 1000);
        let log = Arc::new(Mutex::new(Vec::new()));

        assert!(queue.is_empty());
        queue.enqueue(record(&log, 0)).unwrap();
        queue.enqueue(record(&log, 1)).unwrap();
        assert_eq!(queue.len(), 2);

        queue.wait_idle().await;
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_after_close() {
        let queue = queue(1, 1000);
        queue.close();

        assert!(queue.is_closed());
        let result = queue.enqueue(Box::pin(async {}));
        assert_eq!(result, Err(DeliveryError::QueueClosed));
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_queued_items() {
        let queue = queue(10, 1000);
        let log = Arc::new(Mutex::new(Vec::new()));

        for index in 0..3 {
            queue.enqueue(record(&log, index)).unwrap();
        }

        assert!(queue.shutdown(Duration::from_secs(5)).await);
        assert_eq!(log.lock().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_aborts_after_grace() {
        let queue = queue(1, 1000);
        queue
            .enqueue(Box::pin(tokio::time::sleep(Duration::from_secs(60))))
            .unwrap();

        assert!(!queue.shutdown(Duration::from_secs(1)).await);
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_survives_panicking_item() {
        let queue = queue(1000, 1000);
        let log = Arc::new(Mutex::new(Vec::new()));

        queue
            .enqueue(Box::pin(async {
                panic!("backend blew up");
            }))
            .unwrap();
        queue.enqueue(record(&log, 1)).unwrap();
        queue.wait_idle().await;

        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn test_new_outside_runtime() {
        let result = DispatchQueue::new(&RateLimitConfig::default());
        assert!(matches!(result, Err(SetupError::NoRuntime(_))));
    }
}
