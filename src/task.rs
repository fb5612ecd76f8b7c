//! Crawl task types and run identifiers
//!
//! This module defines the unit of work exchanged through the queue:
//! - The CrawlTask wire shape (`{"url": ..., "runId": ..., "depth": ...}`)
//! - Malformed-task detection
//! - DeadTask records for the dead-letter queue
//! - Run identifier minting

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Errors raised while decoding or validating a task
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Malformed task body: {0}")]
    Malformed(String),

    #[error("Invalid task URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Task has an empty run id")]
    EmptyRunId,
}

/// Result type for task operations
pub type TaskResult<T> = Result<T, TaskError>;

/// A single unit of crawl work
///
/// Tasks are created by the seed initiator (depth 0) or derived by a worker
/// from a discovered link (parent depth + 1). The run id scopes
/// deduplication: it is carried explicitly on every task and never held as
/// ambient state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlTask {
    /// Absolute URL to fetch
    pub url: String,

    /// Opaque identifier shared by all tasks of one crawl execution
    pub run_id: String,

    /// Distance from the seed; bounds expansion when a depth limit is set
    pub depth: u32,
}

impl CrawlTask {
    /// Creates a seed task at depth 0
    pub fn seed(url: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            run_id: run_id.into(),
            depth: 0,
        }
    }

    /// Derives a child task for a discovered link, one level deeper
    pub fn child(&self, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            run_id: self.run_id.clone(),
            depth: self.depth + 1,
        }
    }

    /// Decodes and validates a task from its JSON wire form
    pub fn from_body(body: &str) -> TaskResult<Self> {
        let task: Self =
            serde_json::from_str(body).map_err(|e| TaskError::Malformed(e.to_string()))?;
        task.validate()?;
        Ok(task)
    }

    /// Encodes the task into its JSON wire form
    pub fn to_body(&self) -> String {
        // CrawlTask contains only string/integer fields, so serialization
        // cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Validates the task fields
    ///
    /// A task is well-formed when its URL is a non-empty absolute http(s)
    /// URL and its run id is non-empty. Anything else is a malformed task:
    /// it fails fast without a fetch attempt, but still consumes delivery
    /// attempts until the queue diverts it to the dead-letter queue.
    pub fn validate(&self) -> TaskResult<()> {
        if self.url.is_empty() {
            return Err(TaskError::InvalidUrl {
                url: String::new(),
                message: "URL is empty".to_string(),
            });
        }

        let parsed = Url::parse(&self.url).map_err(|e| TaskError::InvalidUrl {
            url: self.url.clone(),
            message: e.to_string(),
        })?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(TaskError::InvalidUrl {
                url: self.url.clone(),
                message: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        if self.run_id.is_empty() {
            return Err(TaskError::EmptyRunId);
        }

        Ok(())
    }
}

/// A task that exhausted its delivery attempts
///
/// Dead tasks are immutable once written. They are inspected out of band
/// (`driftnet dlq`) and never retried by the core.
#[derive(Debug, Clone)]
pub struct DeadTask {
    /// Raw task body as it was enqueued (may be malformed JSON)
    pub body: String,

    /// Total delivery attempts consumed before diversion
    pub attempts: u32,

    /// Error reported by the last failed attempt
    pub last_error: String,

    /// When the task was diverted to the dead-letter queue (RFC 3339)
    pub failed_at: String,
}

impl DeadTask {
    /// Tries to decode the dead body back into a task for display
    pub fn task(&self) -> Option<CrawlTask> {
        serde_json::from_str(&self.body).ok()
    }
}

/// Mints a fresh run identifier
///
/// The identifier combines a UTC timestamp with 8 random bytes, giving a
/// sortable prefix and enough entropy to be unique per crawl execution.
pub fn generate_run_id() -> String {
    let stamp = Utc::now().format("%Y%m%dT%H%M%S");
    let entropy: [u8; 8] = rand::random();
    format!("run-{}-{}", stamp, hex::encode(entropy))
}
