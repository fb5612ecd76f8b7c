use crate::{ConfigError, ConfigResult};
use std::fmt::Display;
use std::str::FromStr;

/// Environment variable naming the dedup store database path
pub const ENV_VISITED_STORE_ADDRESS: &str = "VISITED_STORE_ADDRESS";

/// Environment variable naming the work queue database path
pub const ENV_QUEUE_ADDRESS: &str = "QUEUE_ADDRESS";

/// Environment variable for the worker pool size
pub const ENV_WORKER_CONCURRENCY: &str = "WORKER_CONCURRENCY";

/// Environment variable for the delivery-attempt bound
pub const ENV_MAX_DELIVERY_ATTEMPTS: &str = "MAX_DELIVERY_ATTEMPTS";

/// Environment variable for the optional depth bound
pub const ENV_MAX_DEPTH: &str = "MAX_DEPTH";

/// Environment variable for the in-flight visibility window, in seconds
pub const ENV_VISIBILITY_TIMEOUT_SECS: &str = "VISIBILITY_TIMEOUT_SECS";

/// Main configuration structure for driftnet
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the visited-URL store database
    pub visited_store_address: String,

    /// Path to the work queue database
    pub queue_address: String,

    /// Number of concurrent crawl workers
    pub worker_concurrency: u32,

    /// Total delivery attempts before a task is diverted to the DLQ
    pub max_delivery_attempts: u32,

    /// Optional bound on crawl depth; `None` means unbounded expansion
    pub max_depth: Option<u32>,

    /// Seconds a delivered task stays invisible before redelivery
    pub visibility_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            visited_store_address: "driftnet-visited.db".to_string(),
            queue_address: "driftnet-queue.db".to_string(),
            worker_concurrency: 2,
            max_delivery_attempts: 3,
            max_depth: None,
            visibility_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Loads configuration from the environment, applying defaults for
    /// unset variables, and validates the result
    pub fn from_env() -> ConfigResult<Self> {
        let defaults = Self::default();

        let config = Self {
            visited_store_address: env_string(ENV_VISITED_STORE_ADDRESS)
                .unwrap_or(defaults.visited_store_address),
            queue_address: env_string(ENV_QUEUE_ADDRESS).unwrap_or(defaults.queue_address),
            worker_concurrency: env_parsed(ENV_WORKER_CONCURRENCY)?
                .unwrap_or(defaults.worker_concurrency),
            max_delivery_attempts: env_parsed(ENV_MAX_DELIVERY_ATTEMPTS)?
                .unwrap_or(defaults.max_delivery_attempts),
            max_depth: env_parsed(ENV_MAX_DEPTH)?,
            visibility_timeout_secs: env_parsed(ENV_VISIBILITY_TIMEOUT_SECS)?
                .unwrap_or(defaults.visibility_timeout_secs),
        };

        super::validate(&config)?;
        Ok(config)
    }
}

/// Reads a non-empty string variable
fn env_string(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.is_empty())
}

/// Reads and parses a variable, reporting parse failures with the
/// offending variable name
fn env_parsed<T>(var: &str) -> ConfigResult<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match env_string(var) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                var: var.to_string(),
                message: format!("'{}': {}", raw, e),
            }),
    }
}
