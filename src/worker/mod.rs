//! Crawl worker - per-task processing
//!
//! A worker drives one delivered task through its state machine:
//!
//! ```text
//! Received -> Deduping -> (Skipped | Fetching -> Expanding -> Enqueuing -> Acknowledged)
//! ```
//!
//! or to `Failed` on any error, which returns the delivery for retry (and
//! eventually the DLQ). The ordering rules are the heart of the
//! at-least-once design:
//! - the dedup mark happens before the fetch, so duplicate deliveries of a
//!   completed URL acknowledge without fetching
//! - acknowledgement happens only after every derived enqueue succeeded, so
//!   a partial expansion is retried whole
//! - any failure after a successful mark releases the claim first, so the
//!   redelivered task can re-claim and retry

mod pool;

pub use pool::{PoolStats, WorkerPool};

use crate::fetch::Fetcher;
use crate::queue::{QueueError, ReceiptHandle, WorkQueue};
use crate::store::{DedupStore, MarkOutcome};
use crate::task::CrawlTask;
use crate::Result;
use std::sync::Arc;

/// What happened to one processed delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Fetched, expanded, and acknowledged
    Completed { discovered: usize },

    /// URL already visited in this run; acknowledged without work
    Skipped,

    /// Processing failed; the delivery was returned for retry or diverted
    Failed,

    /// Body was not a valid task; failed without touching store or fetcher
    Malformed,

    /// Nothing was deliverable
    Idle,
}

/// A single crawl worker
///
/// Each worker is single-threaded per task: it processes one delivery at a
/// time and suspends only at queue polling and collaborator calls.
pub struct CrawlWorker {
    queue: Arc<dyn WorkQueue>,
    store: Arc<dyn DedupStore>,
    fetcher: Arc<dyn Fetcher>,
    max_depth: Option<u32>,
}

impl CrawlWorker {
    pub fn new(
        queue: Arc<dyn WorkQueue>,
        store: Arc<dyn DedupStore>,
        fetcher: Arc<dyn Fetcher>,
        max_depth: Option<u32>,
    ) -> Self {
        Self {
            queue,
            store,
            fetcher,
            max_depth,
        }
    }

    /// Receives and processes at most one task
    pub async fn process_one(&self) -> Result<ProcessOutcome> {
        let Some(delivery) = self.queue.receive()? else {
            return Ok(ProcessOutcome::Idle);
        };

        let task = match CrawlTask::from_body(&delivery.body) {
            Ok(task) => task,
            Err(e) => {
                // Fail fast: no fetch attempt for garbage, but the delivery
                // attempt still counts toward the DLQ bound.
                tracing::warn!("Malformed task (attempt {}): {}", delivery.attempt, e);
                self.fail_delivery(delivery.receipt, &format!("malformed task: {}", e))?;
                return Ok(ProcessOutcome::Malformed);
            }
        };

        tracing::debug!(
            "Processing {} (run {}, depth {}, attempt {})",
            task.url,
            task.run_id,
            task.depth,
            delivery.attempt
        );

        match self.store.mark_if_absent(&task.url, &task.run_id) {
            Ok(MarkOutcome::AlreadyPresent) => {
                // Idempotent short-circuit for duplicate deliveries.
                tracing::debug!("Already visited in run {}: {}", task.run_id, task.url);
                self.acknowledge(delivery.receipt)?;
                Ok(ProcessOutcome::Skipped)
            }
            Ok(MarkOutcome::Inserted) => match self.expand(&task).await {
                Ok(discovered) => {
                    self.acknowledge(delivery.receipt)?;
                    tracing::info!("Crawled {} ({} links discovered)", task.url, discovered);
                    Ok(ProcessOutcome::Completed { discovered })
                }
                Err(e) => {
                    tracing::warn!(
                        "Processing {} failed on attempt {}: {}",
                        task.url,
                        delivery.attempt,
                        e
                    );
                    // Release the claim so the retry re-fetches. If even the
                    // release fails, the redelivery will skip; that is the
                    // accepted hazard of a two-store design.
                    if let Err(release_err) = self.store.mark_failed(&task.url, &task.run_id) {
                        tracing::error!(
                            "Could not release claim for {}: {}",
                            task.url,
                            release_err
                        );
                    }
                    self.fail_delivery(delivery.receipt, &e.to_string())?;
                    Ok(ProcessOutcome::Failed)
                }
            },
            Err(e) => {
                // Store unavailable: retryable. No derived work may be
                // enqueued before a successful mark.
                tracing::warn!("Dedup store unavailable for {}: {}", task.url, e);
                self.fail_delivery(delivery.receipt, &format!("dedup store unavailable: {}", e))?;
                Ok(ProcessOutcome::Failed)
            }
        }
    }

    /// Fetches the task's URL and enqueues its discovered links
    ///
    /// Returns the number of derived tasks enqueued. Any error leaves the
    /// expansion incomplete; the caller must not acknowledge. Re-running
    /// the whole expansion on retry may duplicate child messages, which is
    /// safe: the dedup store guards their consumption.
    async fn expand(&self, task: &CrawlTask) -> Result<usize> {
        let links = self.fetcher.fetch(&task.url).await?;

        let mut discovered = 0;
        for link in links {
            let child = task.child(link);
            if let Some(max_depth) = self.max_depth {
                if child.depth > max_depth {
                    tracing::trace!("Depth limit reached, skipping {}", child.url);
                    continue;
                }
            }
            self.queue.enqueue(&child)?;
            discovered += 1;
        }

        Ok(discovered)
    }

    /// Acknowledges a delivery, tolerating a lost visibility window
    ///
    /// A stale receipt means processing outlived the visibility window and
    /// the task was redelivered; the redelivery will short-circuit on the
    /// dedup mark, so this is a duplicate-delivery event, not a failure.
    fn acknowledge(&self, receipt: ReceiptHandle) -> Result<()> {
        match self.queue.acknowledge(receipt) {
            Ok(()) => Ok(()),
            Err(QueueError::StaleReceipt { task_id, attempt }) => {
                tracing::warn!(
                    "Receipt for task {} attempt {} went stale before acknowledge",
                    task_id,
                    attempt
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fails a delivery, tolerating a lost visibility window
    ///
    /// If the window expired mid-processing the queue has already reclaimed
    /// the task, which is exactly what a failure report would have caused.
    fn fail_delivery(&self, receipt: ReceiptHandle, error: &str) -> Result<()> {
        match self.queue.fail(receipt, error) {
            Ok(()) => Ok(()),
            Err(QueueError::StaleReceipt { task_id, attempt }) => {
                tracing::warn!(
                    "Receipt for task {} attempt {} went stale before failure report",
                    task_id,
                    attempt
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
