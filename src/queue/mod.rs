//! At-least-once work queue with bounded retry and a dead-letter queue
//!
//! The queue owns all in-flight task state: delivery attempt counts and
//! visibility deadlines. Semantics:
//! - `enqueue` appends for at-least-once delivery, no ordering guarantee
//! - `receive` delivers one task to one caller and hides it from other
//!   callers for a visibility window; receiving consumes a delivery attempt
//! - `acknowledge` removes the task permanently; callers only acknowledge
//!   after every side effect of processing is durable
//! - `fail` (or visibility-window expiry) returns the task for redelivery
//!   until the attempt bound is reached, at which point the task moves
//!   atomically to the dead-letter table and is never redelivered
//!
//! Tasks are carried as opaque bodies: malformed payloads flow through the
//! same delivery/retry/dead-letter path as well-formed ones.

mod schema;
mod sqlite;

pub use sqlite::SqliteQueue;

use crate::task::{CrawlTask, DeadTask};
use thiserror::Error;

/// Errors that can occur during queue operations
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Stale receipt: task {task_id} attempt {attempt} is no longer in flight")]
    StaleReceipt { task_id: i64, attempt: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Delivery state of a queued task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting to be delivered
    Ready,

    /// Delivered to a worker and hidden until its visibility deadline
    InFlight,
}

impl TaskState {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::InFlight => "in_flight",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "ready" => Some(Self::Ready),
            "in_flight" => Some(Self::InFlight),
            _ => None,
        }
    }
}

/// Handle identifying one specific delivery of one task
///
/// The handle carries the attempt number it was issued for, so a receipt
/// that outlived its visibility window cannot acknowledge or fail the
/// task's next delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptHandle {
    pub(crate) task_id: i64,
    pub(crate) attempt: u32,
}

/// One delivered task
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Raw task body as enqueued
    pub body: String,

    /// Handle for acknowledging or failing this delivery
    pub receipt: ReceiptHandle,

    /// Which delivery attempt this is, starting at 1
    pub attempt: u32,
}

/// Queue population counts, by state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub ready: u64,
    pub in_flight: u64,
    pub dead: u64,
}

impl QueueCounts {
    /// True when no task is waiting or in flight
    ///
    /// Dead tasks do not count: the DLQ is a terminal sink, not pending work.
    pub fn is_drained(&self) -> bool {
        self.ready == 0 && self.in_flight == 0
    }
}

/// Trait for work queue backends
pub trait WorkQueue: Send + Sync {
    /// Appends a task for at-least-once delivery
    fn enqueue(&self, task: &CrawlTask) -> QueueResult<()>;

    /// Delivers one ready task, or `None` when nothing is deliverable
    ///
    /// The delivered task is hidden from other callers until its visibility
    /// deadline. Tasks whose previous delivery expired unacknowledged are
    /// redelivered here, or diverted to the dead-letter queue when their
    /// attempts are exhausted.
    fn receive(&self) -> QueueResult<Option<Delivery>>;

    /// Permanently removes an in-flight task
    fn acknowledge(&self, receipt: ReceiptHandle) -> QueueResult<()>;

    /// Reports a failed delivery
    ///
    /// The task becomes immediately redeliverable, or moves atomically to
    /// the dead-letter queue when its attempts are exhausted.
    fn fail(&self, receipt: ReceiptHandle, error: &str) -> QueueResult<()>;

    /// Current queue population by state
    fn counts(&self) -> QueueResult<QueueCounts>;

    /// Lists dead-letter entries, oldest first
    fn dead_tasks(&self) -> QueueResult<Vec<DeadTask>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_state_roundtrip() {
        for state in &[TaskState::Ready, TaskState::InFlight] {
            assert_eq!(
                TaskState::from_db_string(state.to_db_string()),
                Some(*state)
            );
        }
        assert_eq!(TaskState::from_db_string("bogus"), None);
    }

    #[test]
    fn test_counts_drained() {
        let mut counts = QueueCounts::default();
        assert!(counts.is_drained());

        counts.dead = 4;
        assert!(counts.is_drained());

        counts.in_flight = 1;
        assert!(!counts.is_drained());
    }
}
