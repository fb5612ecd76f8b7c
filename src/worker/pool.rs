//! Fixed-size worker pool
//!
//! The pool spawns exactly `worker_concurrency` workers, each pulling from
//! the shared queue. The pool size is the system's only admission control:
//! it bounds concurrent fetches and therefore the load on downstream
//! collaborators. Workers poll with a short sleep when the queue has
//! nothing deliverable and exit once it is drained (zero ready, zero in
//! flight).

use crate::fetch::Fetcher;
use crate::queue::WorkQueue;
use crate::store::DedupStore;
use crate::worker::{CrawlWorker, ProcessOutcome};
use std::sync::Arc;
use std::time::Duration;

/// Sleep between polls when the queue has nothing deliverable
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Consecutive infrastructure errors before a worker gives up
const MAX_CONSECUTIVE_ERRORS: u32 = 5;

/// Aggregate counts of processed deliveries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub completed: u64,
    pub skipped: u64,
    pub failed: u64,
    pub malformed: u64,
}

impl PoolStats {
    fn record(&mut self, outcome: ProcessOutcome) {
        match outcome {
            ProcessOutcome::Completed { .. } => self.completed += 1,
            ProcessOutcome::Skipped => self.skipped += 1,
            ProcessOutcome::Failed => self.failed += 1,
            ProcessOutcome::Malformed => self.malformed += 1,
            ProcessOutcome::Idle => {}
        }
    }

    fn merge(&mut self, other: PoolStats) {
        self.completed += other.completed;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.malformed += other.malformed;
    }
}

/// Fixed-size pool of crawl workers
pub struct WorkerPool {
    queue: Arc<dyn WorkQueue>,
    store: Arc<dyn DedupStore>,
    fetcher: Arc<dyn Fetcher>,
    concurrency: u32,
    max_depth: Option<u32>,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<dyn WorkQueue>,
        store: Arc<dyn DedupStore>,
        fetcher: Arc<dyn Fetcher>,
        concurrency: u32,
        max_depth: Option<u32>,
    ) -> Self {
        Self {
            queue,
            store,
            fetcher,
            concurrency,
            max_depth,
        }
    }

    /// Runs the pool until the queue is drained
    ///
    /// Spawns one tokio task per worker and waits for all of them. Workers
    /// leave when the queue reports no ready and no in-flight tasks, so the
    /// pool returns once the crawl has converged.
    pub async fn run(&self) -> PoolStats {
        tracing::info!("Starting {} workers", self.concurrency);

        let mut handles = Vec::with_capacity(self.concurrency as usize);
        for worker_id in 0..self.concurrency {
            let worker = CrawlWorker::new(
                Arc::clone(&self.queue),
                Arc::clone(&self.store),
                Arc::clone(&self.fetcher),
                self.max_depth,
            );
            let queue = Arc::clone(&self.queue);
            handles.push(tokio::spawn(run_worker(worker_id, worker, queue)));
        }

        let mut stats = PoolStats::default();
        for handle in handles {
            match handle.await {
                Ok(worker_stats) => stats.merge(worker_stats),
                Err(e) => tracing::error!("Worker task panicked: {}", e),
            }
        }

        tracing::info!(
            "Pool drained: {} completed, {} skipped, {} failed, {} malformed",
            stats.completed,
            stats.skipped,
            stats.failed,
            stats.malformed
        );
        stats
    }
}

/// Single worker loop: process until the queue is drained
async fn run_worker(worker_id: u32, worker: CrawlWorker, queue: Arc<dyn WorkQueue>) -> PoolStats {
    let mut stats = PoolStats::default();
    let mut consecutive_errors = 0u32;

    loop {
        match worker.process_one().await {
            Ok(ProcessOutcome::Idle) => {
                consecutive_errors = 0;

                // Idle is only terminal when nothing is in flight anywhere:
                // a task held by another worker may still fan out new work.
                match queue.counts() {
                    Ok(counts) if counts.is_drained() => {
                        tracing::debug!("Worker {} exiting: queue drained", worker_id);
                        break;
                    }
                    Ok(_) => tokio::time::sleep(POLL_INTERVAL).await,
                    Err(e) => {
                        tracing::error!("Worker {} could not read queue counts: {}", worker_id, e);
                        consecutive_errors += 1;
                        if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                            break;
                        }
                        tokio::time::sleep(POLL_INTERVAL).await;
                    }
                }
            }
            Ok(outcome) => {
                consecutive_errors = 0;
                stats.record(outcome);
            }
            Err(e) => {
                tracing::error!("Worker {} error: {}", worker_id, e);
                consecutive_errors += 1;
                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    tracing::error!(
                        "Worker {} giving up after {} consecutive errors",
                        worker_id,
                        consecutive_errors
                    );
                    break;
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchResult;
    use crate::queue::SqliteQueue;
    use crate::store::SqliteDedupStore;
    use crate::task::CrawlTask;
    use async_trait::async_trait;

    /// Fetcher pretending every page links to two children under it
    struct FanOutFetcher {
        fan_out: usize,
    }

    #[async_trait]
    impl crate::fetch::Fetcher for FanOutFetcher {
        async fn fetch(&self, url: &str) -> FetchResult<Vec<String>> {
            Ok((0..self.fan_out)
                .map(|i| format!("{}/child{}", url.trim_end_matches('/'), i))
                .collect())
        }
    }

    #[tokio::test]
    async fn test_pool_drains_a_fan_out_crawl() {
        let queue: Arc<SqliteQueue> =
            Arc::new(SqliteQueue::in_memory(3, Duration::from_secs(30)).unwrap());
        let store = Arc::new(SqliteDedupStore::in_memory().unwrap());
        let fetcher = Arc::new(FanOutFetcher { fan_out: 2 });

        queue
            .enqueue(&CrawlTask::seed("https://example.com", "r1"))
            .unwrap();

        // Depth 2 fan-out of 2: 1 + 2 + 4 pages.
        let pool = WorkerPool::new(queue.clone(), store.clone(), fetcher, 2, Some(2));
        let stats = pool.run().await;

        assert_eq!(stats.completed, 7);
        assert_eq!(stats.failed, 0);
        assert!(queue.counts().unwrap().is_drained());
        assert_eq!(store.visited_count("r1").unwrap(), 7);
    }

    #[tokio::test]
    async fn test_pool_exits_immediately_on_empty_queue() {
        let queue: Arc<SqliteQueue> =
            Arc::new(SqliteQueue::in_memory(3, Duration::from_secs(30)).unwrap());
        let store = Arc::new(SqliteDedupStore::in_memory().unwrap());
        let fetcher = Arc::new(FanOutFetcher { fan_out: 0 });

        let pool = WorkerPool::new(queue, store, fetcher, 4, None);
        let stats = pool.run().await;

        assert_eq!(stats, PoolStats::default());
    }
}
