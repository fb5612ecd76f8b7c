//! Per-run deduplication store
//!
//! This module answers one question atomically: "has this URL been claimed
//! in this run?" It is the sole mechanism preventing duplicate crawling of
//! a URL within a run under concurrent workers:
//! - `mark_if_absent` is an atomic check-and-set on the (url, run_id) key
//! - `mark_failed` releases a claim after a processing failure so the
//!   redelivered task can retry
//!
//! The store owns visited-state exclusively; no other component mutates it.

mod schema;
mod sqlite;

pub use sqlite::SqliteDedupStore;

use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of an atomic mark attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// The caller claimed the (url, run) pair and must process it
    Inserted,

    /// Another caller already completed this pair; skip all work
    AlreadyPresent,
}

/// Visit status of a recorded URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitStatus {
    /// URL is claimed or fully processed for this run
    Visited,

    /// A worker claimed the URL but failed; the claim is reclaimable
    Failed,
}

impl VisitStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Visited => "visited",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "visited" => Some(Self::Visited),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A visited-URL record
///
/// At most one record exists per (url, run_id) pair.
#[derive(Debug, Clone)]
pub struct VisitedRecord {
    pub url: String,
    pub run_id: String,
    pub status: VisitStatus,
    pub first_seen_at: String,
}

/// Trait for dedup store backends
///
/// Implementations must make `mark_if_absent` atomic: concurrent callers
/// racing on the same (url, run_id) observe exactly one `Inserted` result.
/// Store unavailability surfaces as a retryable `StoreError`; callers must
/// not enqueue derived work until their mark has succeeded.
pub trait DedupStore: Send + Sync {
    /// Atomically claims a (url, run) pair
    ///
    /// Returns `Inserted` when this call created the claim (including
    /// reclaiming a record left in the `failed` state by an earlier
    /// attempt), `AlreadyPresent` when a completed record already exists.
    fn mark_if_absent(&self, url: &str, run_id: &str) -> StoreResult<MarkOutcome>;

    /// Releases a claim after a processing failure
    ///
    /// The record is kept but downgraded to `failed`, which makes it
    /// reclaimable by a later `mark_if_absent`.
    fn mark_failed(&self, url: &str, run_id: &str) -> StoreResult<()>;

    /// Looks up the record for a (url, run) pair
    fn get(&self, url: &str, run_id: &str) -> StoreResult<Option<VisitedRecord>>;

    /// Counts completed records for a run
    fn visited_count(&self, run_id: &str) -> StoreResult<u64>;
}
