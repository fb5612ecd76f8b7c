//! Configuration module for driftnet
//!
//! Configuration is environment-style: every knob is a single environment
//! variable with a sensible default, so the seed initiator and the worker
//! pool can be pointed at the same queue and store without a config file.
//!
//! # Example
//!
//! ```no_run
//! use driftnet::config::Config;
//!
//! let config = Config::from_env().unwrap();
//! println!("Workers: {}", config.worker_concurrency);
//! ```

mod types;
mod validation;

// Re-export types
pub use types::{
    Config, ENV_MAX_DELIVERY_ATTEMPTS, ENV_MAX_DEPTH, ENV_QUEUE_ADDRESS,
    ENV_VISIBILITY_TIMEOUT_SECS, ENV_VISITED_STORE_ADDRESS, ENV_WORKER_CONCURRENCY,
};

// Re-export validation
pub use validation::validate;
