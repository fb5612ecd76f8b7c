//! HTTP fetch implementation
//!
//! Production adapter for the [`Fetcher`] trait: GET the URL, classify the
//! response, and extract links from HTML bodies. Error classification is
//! informational only; the worker retries every failure uniformly.

use crate::fetch::parser::extract_links;
use crate::fetch::{FetchError, FetchResult, Fetcher};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Builds the HTTP client used by [`HttpFetcher`]
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    let user_agent = format!("driftnet/{}", env!("CARGO_PKG_VERSION"));

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetcher backed by a reqwest HTTP client
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher with the default client configuration
    pub fn new() -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client()?,
        })
    }

    /// Creates a fetcher from a preconfigured client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<Vec<String>> {
        let response = self.client.get(url).send().await.map_err(|e| {
            let message = if e.is_timeout() {
                "request timeout".to_string()
            } else if e.is_connect() {
                "connection refused".to_string()
            } else {
                e.to_string()
            };
            FetchError::Network {
                url: url.to_string(),
                message,
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if !content_type.contains("text/html") {
            return Err(FetchError::ContentMismatch {
                url: url.to_string(),
                content_type,
            });
        }

        // Redirects may have moved us; resolve links against the final URL.
        let final_url = response.url().clone();
        let body = response.text().await.map_err(|e| FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(extract_links(&body, &final_url))
    }
}
