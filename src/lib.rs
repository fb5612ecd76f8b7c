//! Driftnet: a crawl coordination core
//!
//! This crate implements the coordination layer of a crawl-one-URL-at-a-time
//! pipeline: an at-least-once work queue with bounded retry and a dead-letter
//! queue, a per-run deduplication store with an atomic check-and-set, and a
//! fixed-size worker pool that ties them together. Fetching and link
//! extraction are consumed through the narrow [`fetch::Fetcher`] trait.

pub mod config;
pub mod fetch;
pub mod queue;
pub mod seed;
pub mod store;
pub mod task;
pub mod worker;

use thiserror::Error;

/// Main error type for driftnet operations
#[derive(Debug, Error)]
pub enum DriftError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Queue error: {0}")]
    Queue(#[from] queue::QueueError),

    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] fetch::FetchError),

    #[error("Task error: {0}")]
    Task(#[from] task::TaskError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for driftnet operations
pub type Result<T> = std::result::Result<T, DriftError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use queue::{Delivery, QueueCounts, SqliteQueue, WorkQueue};
pub use store::{DedupStore, MarkOutcome, SqliteDedupStore};
pub use task::{CrawlTask, DeadTask};
pub use worker::{CrawlWorker, WorkerPool};
