//! Integration tests for the crawl coordination pipeline
//!
//! These tests use wiremock to stand in for the web and drive the full
//! seed -> queue -> worker -> store cycle end-to-end, verifying the
//! at-least-once coordination properties: one fetch per (url, run),
//! bounded retry into the DLQ, depth termination, and the worker
//! concurrency cap.

use async_trait::async_trait;
use driftnet::fetch::{FetchResult, Fetcher, HttpFetcher};
use driftnet::queue::{SqliteQueue, WorkQueue};
use driftnet::seed::seed_crawl;
use driftnet::store::{DedupStore, SqliteDedupStore};
use driftnet::task::CrawlTask;
use driftnet::worker::WorkerPool;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Opens a queue and store pair under a temp directory
fn open_pipeline(dir: &Path) -> (Arc<SqliteQueue>, Arc<SqliteDedupStore>) {
    let queue = SqliteQueue::open(&dir.join("queue.db"), 3, Duration::from_secs(30))
        .expect("Failed to open queue");
    let store =
        SqliteDedupStore::open(&dir.join("visited.db")).expect("Failed to open store");
    (Arc::new(queue), Arc::new(store))
}

/// Mounts an HTML page at the given path
async fn mount_page(server: &MockServer, route: &str, body: String, expected_hits: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(body.into_bytes(), "text/html"),
        )
        .expect(expected_hits)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_fetches_each_url_once() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    // The seed page links to page1 and to itself; page1 links back to the
    // seed. Every cycle edge becomes a duplicate message, never a
    // duplicate fetch: wiremock verifies each page is fetched exactly once.
    mount_page(
        &mock_server,
        "/",
        format!(
            r#"<html><body>
            <a href="{}/page1">Page 1</a>
            <a href="/">Self</a>
            </body></html>"#,
            base_url
        ),
        1,
    )
    .await;
    mount_page(
        &mock_server,
        "/page1",
        r#"<html><body><a href="/">Back home</a></body></html>"#.to_string(),
        1,
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let (queue, store) = open_pipeline(dir.path());

    let run_id = seed_crawl(queue.as_ref(), &[format!("{}/", base_url)], None)
        .expect("Failed to seed");

    let fetcher = Arc::new(HttpFetcher::new().unwrap());
    let pool = WorkerPool::new(queue.clone(), store.clone(), fetcher, 2, None);
    let stats = pool.run().await;

    // Exactly one VisitedRecord per page; the self/back links were skipped
    // as duplicate messages.
    assert_eq!(store.visited_count(&run_id).unwrap(), 2);
    assert_eq!(stats.completed, 2);
    assert!(stats.skipped >= 1, "cycle links should surface as skips");
    assert_eq!(stats.failed, 0);

    let counts = queue.counts().unwrap();
    assert!(counts.is_drained());
    assert_eq!(counts.dead, 0);

    // Dropping the server verifies the expect(1) fetch counts.
}

#[tokio::test]
async fn test_scenario_self_link_derives_only_new_urls() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    // fetch(a) returns [b, a]: expect one visited record for a, a fetch
    // of b at depth 1, and no second fetch of a.
    mount_page(
        &mock_server,
        "/a",
        format!(
            r#"<html><body><a href="{0}/b">b</a><a href="{0}/a">a</a></body></html>"#,
            base_url
        ),
        1,
    )
    .await;
    mount_page(&mock_server, "/b", "<html><body>leaf</body></html>".to_string(), 1).await;

    let dir = tempfile::tempdir().unwrap();
    let (queue, store) = open_pipeline(dir.path());

    let run_id = seed_crawl(queue.as_ref(), &[format!("{}/a", base_url)], None).unwrap();

    let fetcher = Arc::new(HttpFetcher::new().unwrap());
    let pool = WorkerPool::new(queue.clone(), store.clone(), fetcher, 2, None);
    pool.run().await;

    let record = store
        .get(&format!("{}/a", base_url), &run_id)
        .unwrap()
        .expect("a must have a visited record");
    assert_eq!(record.status, driftnet::store::VisitStatus::Visited);

    assert!(store
        .get(&format!("{}/b", base_url), &run_id)
        .unwrap()
        .is_some());
    assert_eq!(store.visited_count(&run_id).unwrap(), 2);
    assert!(queue.counts().unwrap().is_drained());
}

#[tokio::test]
async fn test_always_failing_task_retries_then_dead_letters() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    // Three delivery attempts, three fetches, then the DLQ.
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (queue, store) = open_pipeline(dir.path());

    let run_id = seed_crawl(queue.as_ref(), &[format!("{}/broken", base_url)], None).unwrap();

    let fetcher = Arc::new(HttpFetcher::new().unwrap());
    let pool = WorkerPool::new(queue.clone(), store.clone(), fetcher, 2, None);
    let stats = pool.run().await;

    assert_eq!(stats.failed, 3);

    let dead = queue.dead_tasks().unwrap();
    assert_eq!(dead.len(), 1, "the task appears in the DLQ exactly once");
    assert_eq!(dead[0].attempts, 3);
    let dead_task = dead[0].task().unwrap();
    assert_eq!(dead_task.url, format!("{}/broken", base_url));
    assert_eq!(dead_task.run_id, run_id);

    // Never redelivered to the main queue again.
    assert!(queue.receive().unwrap().is_none());
    assert_eq!(store.visited_count(&run_id).unwrap(), 0);
}

#[tokio::test]
async fn test_depth_zero_enqueues_no_derived_tasks() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/",
        format!(
            r#"<html><body><a href="{0}/child1">1</a><a href="{0}/child2">2</a></body></html>"#,
            base_url
        ),
        1,
    )
    .await;
    // Children must never be fetched with a depth bound of zero.
    mount_page(&mock_server, "/child1", "<html></html>".to_string(), 0).await;
    mount_page(&mock_server, "/child2", "<html></html>".to_string(), 0).await;

    let dir = tempfile::tempdir().unwrap();
    let (queue, store) = open_pipeline(dir.path());

    let run_id = seed_crawl(queue.as_ref(), &[format!("{}/", base_url)], None).unwrap();

    let fetcher = Arc::new(HttpFetcher::new().unwrap());
    let pool = WorkerPool::new(queue.clone(), store.clone(), fetcher, 2, Some(0));
    let stats = pool.run().await;

    assert_eq!(stats.completed, 1);
    assert_eq!(store.visited_count(&run_id).unwrap(), 1);
    assert!(queue.counts().unwrap().is_drained());
}

/// Fetcher that tracks how many fetches run concurrently
struct GaugedFetcher {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl GaugedFetcher {
    fn new() -> Self {
        Self {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Fetcher for GaugedFetcher {
    async fn fetch(&self, _url: &str) -> FetchResult<Vec<String>> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        // Hold the fetch open long enough for overlap to show up.
        tokio::time::sleep(Duration::from_millis(10)).await;

        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(vec![])
    }
}

#[tokio::test]
async fn test_worker_concurrency_caps_simultaneous_fetches() {
    let dir = tempfile::tempdir().unwrap();
    let (queue, store) = open_pipeline(dir.path());

    // Load the queue with 10x more tasks than the concurrency cap.
    let concurrency = 2u32;
    for i in 0..20 {
        queue
            .enqueue(&CrawlTask::seed(
                format!("https://example.com/page{}", i),
                "r1",
            ))
            .unwrap();
    }

    let fetcher = Arc::new(GaugedFetcher::new());
    let pool = WorkerPool::new(queue.clone(), store.clone(), fetcher.clone(), concurrency, None);
    let stats = pool.run().await;

    assert_eq!(stats.completed, 20);
    assert_eq!(store.visited_count("r1").unwrap(), 20);

    let peak = fetcher.peak.load(Ordering::SeqCst);
    assert!(
        peak <= concurrency as usize,
        "peak concurrent fetches {} exceeded the cap {}",
        peak,
        concurrency
    );
}

#[tokio::test]
async fn test_seed_and_work_can_run_as_separate_processes() {
    let dir = tempfile::tempdir().unwrap();

    // Seed through one queue handle, then drop it: a separate handle on
    // the same address (as a second process would open) must see the work.
    let run_id = {
        let seeder_queue =
            SqliteQueue::open(&dir.path().join("queue.db"), 3, Duration::from_secs(30)).unwrap();
        seed_crawl(
            &seeder_queue,
            &["https://example.com/".to_string()],
            Some("r-shared".to_string()),
        )
        .unwrap()
    };
    assert_eq!(run_id, "r-shared");

    let (queue, store) = open_pipeline(dir.path());
    let fetcher = Arc::new(GaugedFetcher::new());
    let pool = WorkerPool::new(queue.clone(), store.clone(), fetcher, 2, None);
    let stats = pool.run().await;

    assert_eq!(stats.completed, 1);
    assert_eq!(store.visited_count("r-shared").unwrap(), 1);
}

#[tokio::test]
async fn test_malformed_body_dead_letters_without_marking() {
    let dir = tempfile::tempdir().unwrap();
    let (queue, store) = open_pipeline(dir.path());

    queue.enqueue_raw(r#"{"url": 42}"#).unwrap();

    let fetcher = Arc::new(GaugedFetcher::new());
    let pool = WorkerPool::new(queue.clone(), store.clone(), fetcher.clone(), 2, None);
    let stats = pool.run().await;

    assert_eq!(stats.malformed, 3);
    assert_eq!(queue.dead_tasks().unwrap().len(), 1);

    // No fetch and no store write happened for the garbage body.
    assert_eq!(fetcher.peak.load(Ordering::SeqCst), 0);
    assert_eq!(store.visited_count("r1").unwrap(), 0);
}
