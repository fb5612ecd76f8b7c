//! Fetch/extract collaborator interface
//!
//! The coordination core never fetches pages itself; it consumes an
//! external collaborator through the narrow [`Fetcher`] trait: given a URL,
//! return the list of discovered link URLs or a fetch error. Any error is
//! treated uniformly as a processing failure by the worker (no
//! permanent/transient classification), which triggers the redelivery path.
//!
//! [`HttpFetcher`] is the production implementation: a reqwest GET plus
//! scraper-based link extraction.

mod http;
mod parser;

pub use http::{build_http_client, HttpFetcher};
pub use parser::extract_links;

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by the fetch collaborator
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Http { url: String, status: u16 },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Content mismatch for {url}: expected HTML, got {content_type}")]
    ContentMismatch { url: String, content_type: String },

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Result type for fetch operations
pub type FetchResult<T> = Result<T, FetchError>;

/// Trait for the external fetch/extract collaborator
///
/// Implementations fetch one URL and return every link URL discovered on
/// the page, already resolved to absolute form.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchResult<Vec<String>>;
}
