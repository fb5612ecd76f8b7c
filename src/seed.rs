//! Seed initiator
//!
//! One-shot entry point for a crawl: mints a fresh run identifier,
//! validates the seed URLs, and enqueues them at depth 0. The initiator
//! never touches the dedup store; the first worker to dequeue a seed
//! performs the mark.

use crate::queue::WorkQueue;
use crate::task::{generate_run_id, CrawlTask};
use crate::Result;

/// Enqueues seed tasks for a new crawl run
///
/// Uses `run_id` when supplied (e.g. to fan more seeds into a running
/// crawl), otherwise mints a fresh one. All seeds are validated before
/// anything is enqueued, so a bad URL rejects the whole seed set instead
/// of starting a partial crawl.
///
/// Returns the run id the seeds were enqueued under.
pub fn seed_crawl(
    queue: &dyn WorkQueue,
    urls: &[String],
    run_id: Option<String>,
) -> Result<String> {
    let run_id = run_id.unwrap_or_else(generate_run_id);

    let tasks: Vec<CrawlTask> = urls
        .iter()
        .map(|url| CrawlTask::seed(url.clone(), run_id.clone()))
        .collect();

    for task in &tasks {
        task.validate()?;
    }

    for task in &tasks {
        queue.enqueue(task)?;
        tracing::info!("Seeded {} (run {})", task.url, task.run_id);
    }

    Ok(run_id)
}
