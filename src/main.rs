//! Driftnet main entry point
//!
//! This is the command-line interface for the driftnet crawl coordinator.
//! The seed initiator and the worker pool are separate subcommands sharing
//! a queue and a store through their configured addresses, so seeding and
//! working can run in separate processes; `crawl` does both in one shot.

use anyhow::Context;
use clap::{Parser, Subcommand};
use driftnet::config::Config;
use driftnet::fetch::HttpFetcher;
use driftnet::queue::{SqliteQueue, WorkQueue};
use driftnet::seed::seed_crawl;
use driftnet::store::{DedupStore, SqliteDedupStore};
use driftnet::worker::WorkerPool;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Driftnet: a crawl coordination core
///
/// Driftnet distributes crawl tasks through an at-least-once work queue
/// with bounded retry and a dead-letter queue, deduplicating URLs per run
/// with an atomic visited store. Configuration is environment-style:
/// QUEUE_ADDRESS, VISITED_STORE_ADDRESS, WORKER_CONCURRENCY,
/// MAX_DELIVERY_ATTEMPTS, MAX_DEPTH, VISIBILITY_TIMEOUT_SECS.
#[derive(Parser, Debug)]
#[command(name = "driftnet")]
#[command(version)]
#[command(about = "A crawl coordination core", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Enqueue seed URLs for a new crawl run and print the run id
    Seed {
        /// Seed URL (repeatable)
        #[arg(long = "url", required = true)]
        urls: Vec<String>,

        /// Reuse an existing run id instead of minting one
        #[arg(long)]
        run_id: Option<String>,
    },

    /// Run the worker pool until the queue is drained
    Work,

    /// Seed and run the workers in one invocation
    Crawl {
        /// Seed URL (repeatable)
        #[arg(long = "url", required = true)]
        urls: Vec<String>,
    },

    /// Show queue population by state
    Status,

    /// List dead-letter queue entries
    Dlq,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::debug!("Configuration: {:?}", config);

    match cli.command {
        Command::Seed { urls, run_id } => handle_seed(&config, &urls, run_id)?,
        Command::Work => handle_work(&config).await?,
        Command::Crawl { urls } => handle_crawl(&config, &urls).await?,
        Command::Status => handle_status(&config)?,
        Command::Dlq => handle_dlq(&config)?,
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("driftnet=info,warn"),
            1 => EnvFilter::new("driftnet=debug,info"),
            2 => EnvFilter::new("driftnet=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Opens the work queue at the configured address
fn open_queue(config: &Config) -> anyhow::Result<Arc<SqliteQueue>> {
    let queue = SqliteQueue::open(
        Path::new(&config.queue_address),
        config.max_delivery_attempts,
        Duration::from_secs(config.visibility_timeout_secs),
    )
    .with_context(|| format!("Failed to open queue at {}", config.queue_address))?;
    Ok(Arc::new(queue))
}

/// Opens the dedup store at the configured address
fn open_store(config: &Config) -> anyhow::Result<Arc<SqliteDedupStore>> {
    let store = SqliteDedupStore::open(Path::new(&config.visited_store_address))
        .with_context(|| {
            format!(
                "Failed to open visited store at {}",
                config.visited_store_address
            )
        })?;
    Ok(Arc::new(store))
}

/// Handles the seed subcommand
fn handle_seed(config: &Config, urls: &[String], run_id: Option<String>) -> anyhow::Result<()> {
    let queue = open_queue(config)?;
    let run_id = seed_crawl(queue.as_ref(), urls, run_id)?;

    println!("{}", run_id);
    Ok(())
}

/// Handles the work subcommand
async fn handle_work(config: &Config) -> anyhow::Result<()> {
    let queue = open_queue(config)?;
    let store = open_store(config)?;
    let fetcher = Arc::new(HttpFetcher::new().context("Failed to build HTTP client")?);

    let pool = WorkerPool::new(
        queue,
        store,
        fetcher,
        config.worker_concurrency,
        config.max_depth,
    );
    let stats = pool.run().await;

    println!(
        "Done: {} crawled, {} skipped, {} failed, {} malformed",
        stats.completed, stats.skipped, stats.failed, stats.malformed
    );
    Ok(())
}

/// Handles the crawl subcommand: seed, then work to completion
async fn handle_crawl(config: &Config, urls: &[String]) -> anyhow::Result<()> {
    let queue = open_queue(config)?;
    let run_id = seed_crawl(queue.as_ref(), urls, None)?;
    tracing::info!("Crawling run {}", run_id);

    let store = open_store(config)?;
    let fetcher = Arc::new(HttpFetcher::new().context("Failed to build HTTP client")?);

    let pool = WorkerPool::new(
        queue,
        store.clone(),
        fetcher,
        config.worker_concurrency,
        config.max_depth,
    );
    let stats = pool.run().await;

    println!("Run: {}", run_id);
    println!("Visited: {}", store.visited_count(&run_id)?);
    println!(
        "Crawled: {}, skipped: {}, failed: {}, malformed: {}",
        stats.completed, stats.skipped, stats.failed, stats.malformed
    );
    Ok(())
}

/// Handles the status subcommand
fn handle_status(config: &Config) -> anyhow::Result<()> {
    let queue = open_queue(config)?;
    let counts = queue.counts()?;

    println!("Queue: {}", config.queue_address);
    println!("  Ready:     {}", counts.ready);
    println!("  In flight: {}", counts.in_flight);
    println!("  Dead:      {}", counts.dead);
    Ok(())
}

/// Handles the dlq subcommand
fn handle_dlq(config: &Config) -> anyhow::Result<()> {
    let queue = open_queue(config)?;
    let dead = queue.dead_tasks()?;

    if dead.is_empty() {
        println!("Dead-letter queue is empty");
        return Ok(());
    }

    for entry in dead {
        match entry.task() {
            Some(task) => println!(
                "{}  run={} depth={} attempts={}  {}",
                entry.failed_at, task.run_id, task.depth, entry.attempts, task.url
            ),
            None => println!(
                "{}  attempts={}  <malformed body: {}>",
                entry.failed_at, entry.attempts, entry.body
            ),
        }
        println!("    last error: {}", entry.last_error);
    }
    Ok(())
}
