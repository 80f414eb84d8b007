//! Background worker that owns batch execution.
//!
//! Triggers (cron ticks, the admin endpoint) never run batches themselves:
//! they push a request onto a bounded queue through a [`BatchHandle`] and
//! return. The [`BatchWorker`] drains the queue one request at a time. The
//! queue holds at most one pending request, so a burst of triggers while a
//! batch is running collapses into a single follow-up run.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::scheduler::{BatchOutcome, Scheduler, TriggerKind};

/// Pending requests the queue can hold.
const QUEUE_CAPACITY: usize = 1;

struct BatchRequest {
    trigger: TriggerKind,
    reply: Option<oneshot::Sender<BatchOutcome>>,
}

/// Result of [`BatchHandle::request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EnqueueResult {
    Enqueued,
    /// A request is already waiting; this one was dropped.
    AlreadyPending,
    /// The worker has stopped.
    Closed,
}

impl EnqueueResult {
    pub fn is_queued(&self) -> bool {
        matches!(self, EnqueueResult::Enqueued)
    }
}

/// Cloneable sender side of the batch queue.
#[derive(Clone)]
pub struct BatchHandle {
    tx: mpsc::Sender<BatchRequest>,
}

impl BatchHandle {
    /// Queue a batch without waiting. Never blocks.
    pub fn request(&self, trigger: TriggerKind) -> EnqueueResult {
        match self.tx.try_send(BatchRequest {
            trigger,
            reply: None,
        }) {
            Ok(()) => {
                debug!(%trigger, "Batch request queued");
                EnqueueResult::Enqueued
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(%trigger, "Batch request already pending, dropping");
                EnqueueResult::AlreadyPending
            }
            Err(mpsc::error::TrySendError::Closed(_)) => EnqueueResult::Closed,
        }
    }

    /// Queue a batch, waiting for queue space, and wait for its outcome.
    ///
    /// Returns `None` if the worker stopped before running it.
    pub async fn run_and_wait(&self, trigger: TriggerKind) -> Option<BatchOutcome> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(BatchRequest {
                trigger,
                reply: Some(reply_tx),
            })
            .await
            .ok()?;
        reply_rx.await.ok()
    }
}

/// Receiver side of the batch queue; owns the scheduler.
pub struct BatchWorker {
    scheduler: Arc<Scheduler>,
    rx: mpsc::Receiver<BatchRequest>,
}

impl BatchWorker {
    pub fn new(scheduler: Arc<Scheduler>) -> (Self, BatchHandle) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        (Self { scheduler, rx }, BatchHandle { tx })
    }

    /// Create a worker and run it on the tokio runtime.
    pub fn spawn(scheduler: Arc<Scheduler>) -> (BatchHandle, JoinHandle<()>) {
        let (worker, handle) = Self::new(scheduler);
        let task = tokio::spawn(worker.run());
        (handle, task)
    }

    /// Process requests until every [`BatchHandle`] is dropped.
    pub async fn run(mut self) {
        info!("Batch worker started");
        while let Some(request) = self.rx.recv().await {
            let outcome = self.scheduler.run_batch(request.trigger).await;
            debug!(trigger = %request.trigger, processed = outcome.processed(), "Batch request finished");
            if let Some(reply) = request.reply {
                let _ = reply.send(outcome);
            }
        }
        info!("Batch worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tokio::sync::{Notify, Semaphore};

    use harvest_core::RecordId;
    use harvest_storage::MemoryRecordStore;

    use super::*;
    use crate::client::{FetchError, RecordFetcher};
    use crate::id_source::StaticIdSource;
    use crate::scheduler::SchedulerOptions;

    /// Blocks every version fetch until a permit is available.
    struct GatedFetcher {
        entered: Arc<Notify>,
        permits: Arc<Semaphore>,
    }

    #[async_trait]
    impl RecordFetcher for GatedFetcher {
        async fn fetch_version(&self, id: RecordId) -> Result<Option<Value>, FetchError> {
            self.entered.notify_one();
            self.permits.acquire().await.unwrap().forget();
            Ok(Some(json!([id])))
        }

        async fn fetch_full(&self, id: RecordId) -> Result<Option<Value>, FetchError> {
            Ok(Some(json!({ "id": id })))
        }
    }

    fn scheduler(fetcher: Arc<dyn RecordFetcher>, ids: Vec<RecordId>) -> Arc<Scheduler> {
        let options = SchedulerOptions {
            batch_size: 1,
            item_delay: Duration::ZERO,
            max_item_failures: 3,
        };
        Arc::new(Scheduler::new(
            options,
            Arc::new(StaticIdSource::new(ids)),
            fetcher,
            Arc::new(MemoryRecordStore::new()),
        ))
    }

    #[tokio::test]
    async fn run_and_wait_returns_the_outcome() {
        let permits = Arc::new(Semaphore::new(10));
        let fetcher = Arc::new(GatedFetcher {
            entered: Arc::new(Notify::new()),
            permits,
        });
        let scheduler = scheduler(fetcher, vec![1, 2]);
        let (handle, _task) = BatchWorker::spawn(scheduler.clone());

        let outcome = handle.run_and_wait(TriggerKind::Cli).await.unwrap();
        assert_eq!(outcome.processed(), 1);
        assert_eq!(scheduler.status().current_index, 1);
    }

    #[tokio::test]
    async fn burst_of_requests_collapses_to_one_pending() {
        let entered = Arc::new(Notify::new());
        let permits = Arc::new(Semaphore::new(0));
        let fetcher = Arc::new(GatedFetcher {
            entered: entered.clone(),
            permits: permits.clone(),
        });
        let scheduler = scheduler(fetcher, vec![1, 2, 3, 4]);
        let (handle, _task) = BatchWorker::spawn(scheduler.clone());

        assert_eq!(handle.request(TriggerKind::Manual), EnqueueResult::Enqueued);
        // Worker picked the first request up and is blocked inside the batch.
        entered.notified().await;

        assert_eq!(handle.request(TriggerKind::Manual), EnqueueResult::Enqueued);
        assert_eq!(handle.request(TriggerKind::Manual), EnqueueResult::AlreadyPending);
        assert_eq!(handle.request(TriggerKind::Scheduled), EnqueueResult::AlreadyPending);

        permits.add_permits(10);
        // Queued behind the pending request, so it observes both earlier runs.
        let outcome = handle.run_and_wait(TriggerKind::Manual).await.unwrap();
        assert_eq!(outcome.processed(), 1);
        assert_eq!(scheduler.status().current_index, 3);
    }

    #[tokio::test]
    async fn closed_worker_rejects_requests() {
        let fetcher = Arc::new(GatedFetcher {
            entered: Arc::new(Notify::new()),
            permits: Arc::new(Semaphore::new(10)),
        });
        let (worker, handle) = BatchWorker::new(scheduler(fetcher, vec![1]));
        drop(worker);

        assert_eq!(handle.request(TriggerKind::Manual), EnqueueResult::Closed);
        assert!(handle.run_and_wait(TriggerKind::Manual).await.is_none());
    }
}
