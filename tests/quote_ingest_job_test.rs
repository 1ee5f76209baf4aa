//! Availability watcher and the wait-then-load job, end to end in memory.
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::ObjectStore;

use quote_ingest::config::{IngestConfig, RetryPolicy, WatcherConfig};
use quote_ingest::db::{InMemoryQuoteRepository, QuoteRepository};
use quote_ingest::errors::AppError;
use quote_ingest::external::{ObjectSource, ObjectStoreSource};
use quote_ingest::jobs::quote_ingest_job::{run_processor, run_quote_ingest, run_tasks};
use quote_ingest::models::Quote;
use quote_ingest::services::availability_watcher::wait_for_object;
use quote_ingest::services::ingest_processor::ProcessOutcome;
use quote_ingest::services::job_scheduler_service::{JobContext, JobRunner};

const QUOTE: &str = r#"[{"USDBRL": {"bid": "5.10", "create_date": "2024-01-01 10:00:00"}}]"#;

fn watcher(poke_ms: u64, timeout_ms: u64) -> WatcherConfig {
    WatcherConfig {
        key_pattern: "*.json".into(),
        poke_interval: Duration::from_millis(poke_ms),
        timeout: Duration::from_millis(timeout_ms),
    }
}

fn config(watcher: WatcherConfig) -> Arc<IngestConfig> {
    let mut config = IngestConfig::from_env();
    config.currency_pair = "USDBRL".into();
    config.watcher = watcher;
    config.retry = RetryPolicy {
        retries: 1,
        retry_delay: Duration::from_millis(5),
    };
    Arc::new(config)
}

async fn put(store: &InMemory, key: &str, body: &str) {
    store
        .put(&Path::from(key), Bytes::from(body.to_string()).into())
        .await
        .unwrap();
}

/// Fails the first `failures` inserts with a transport-style error.
struct FlakyRepository {
    inner: InMemoryQuoteRepository,
    failures: AtomicU32,
    inserts: AtomicU32,
}

impl FlakyRepository {
    fn new(failures: u32) -> Self {
        Self {
            inner: InMemoryQuoteRepository::new(),
            failures: AtomicU32::new(failures),
            inserts: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl QuoteRepository for FlakyRepository {
    async fn ensure_table(&self) -> Result<(), AppError> {
        self.inner.ensure_table().await
    }

    async fn insert(&self, quote: &Quote) -> Result<i32, AppError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(AppError::External("connection refused".into()));
        }
        self.inner.insert(quote).await
    }
}

#[tokio::test]
async fn test_watcher_returns_existing_match_immediately() {
    let store = Arc::new(InMemory::new());
    put(&store, "notes.txt", "ignore me").await;
    put(&store, "2024/quote.json", QUOTE).await;
    let source = ObjectStoreSource::new(store, "raw-data");

    let key = wait_for_object(&source, &watcher(10_000, 60_000)).await.unwrap();
    assert_eq!(key, "2024/quote.json");
}

#[tokio::test]
async fn test_watcher_times_out_without_a_match() {
    let store = Arc::new(InMemory::new());
    put(&store, "notes.txt", "not json").await;
    let source = ObjectStoreSource::new(store, "raw-data");

    let err = wait_for_object(&source, &watcher(10, 50)).await.unwrap_err();
    match err {
        AppError::Timeout { bucket, pattern, .. } => {
            assert_eq!(bucket, "raw-data");
            assert_eq!(pattern, "*.json");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_watcher_sees_object_that_arrives_later() {
    let store = Arc::new(InMemory::new());
    let source = ObjectStoreSource::new(store.clone(), "raw-data");

    let writer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(40)).await;
        put(&store, "late.json", QUOTE).await;
    });

    let key = wait_for_object(&source, &watcher(10, 5_000)).await.unwrap();
    assert_eq!(key, "late.json");
    writer.await.unwrap();
}

#[tokio::test]
async fn test_job_loads_quote_after_watcher_releases() {
    let store = Arc::new(InMemory::new());
    put(&store, "usd-brl.json", QUOTE).await;
    let repository = Arc::new(InMemoryQuoteRepository::new());
    let ctx = JobContext {
        source: Arc::new(ObjectStoreSource::new(store, "raw-data")),
        repository: repository.clone(),
        config: config(watcher(10, 1_000)),
    };

    let result = run_quote_ingest(ctx).await.unwrap();

    assert_eq!(result.items_processed, 1);
    assert_eq!(repository.rows().len(), 1);
}

#[tokio::test]
async fn test_watcher_timeout_skips_processor() {
    let store = Arc::new(InMemory::new());
    let repository = Arc::new(InMemoryQuoteRepository::new());
    let ctx = JobContext {
        source: Arc::new(ObjectStoreSource::new(store, "raw-data")),
        repository: repository.clone(),
        config: config(watcher(5, 20)),
    };

    let err = run_tasks(&ctx).await.unwrap_err();

    assert!(matches!(err, AppError::Timeout { .. }));
    assert!(!repository.table_exists());
}

#[tokio::test]
async fn test_processor_is_retried_once_on_transport_error() {
    let store = Arc::new(InMemory::new());
    put(&store, "usd-brl.json", QUOTE).await;
    let repository = Arc::new(FlakyRepository::new(1));
    let ctx = JobContext {
        source: Arc::new(ObjectStoreSource::new(store, "raw-data")),
        repository: repository.clone(),
        config: config(watcher(10, 1_000)),
    };

    let outcome = run_processor(&ctx).await.unwrap();

    assert!(matches!(outcome, ProcessOutcome::Inserted { .. }));
    assert_eq!(repository.inserts.load(Ordering::SeqCst), 2);
    assert_eq!(repository.inner.rows().len(), 1);
    // the retry repeats every step, table creation included
    assert_eq!(repository.inner.ensure_calls(), 2);
}

#[tokio::test]
async fn test_processor_gives_up_after_one_retry() {
    let store = Arc::new(InMemory::new());
    put(&store, "usd-brl.json", QUOTE).await;
    let repository = Arc::new(FlakyRepository::new(5));
    let ctx = JobContext {
        source: Arc::new(ObjectStoreSource::new(store, "raw-data")),
        repository: repository.clone(),
        config: config(watcher(10, 1_000)),
    };

    let err = run_processor(&ctx).await.unwrap_err();

    assert!(matches!(err, AppError::External(_)));
    assert_eq!(repository.inserts.load(Ordering::SeqCst), 2);
    assert!(repository.inner.rows().is_empty());
}

#[tokio::test]
async fn test_runner_without_pool_runs_and_releases_slot() {
    let store = Arc::new(InMemory::new());
    put(&store, "usd-brl.json", QUOTE).await;
    let repository = Arc::new(InMemoryQuoteRepository::new());
    let runner = JobRunner::new(
        JobContext {
            source: Arc::new(ObjectStoreSource::new(store, "raw-data")),
            repository: repository.clone(),
            config: config(watcher(10, 1_000)),
        },
        None,
    );

    let first = runner.run_or_skip("test").await.expect("not skipped").unwrap();
    let second = runner.run_or_skip("test").await.expect("not skipped").unwrap();

    assert_eq!(first.items_processed, 1);
    assert_eq!(second.items_processed, 1);
    assert_eq!(repository.rows().len(), 2);
    assert!(!runner.is_running());
}

#[tokio::test]
async fn test_empty_bucket_source_lists_nothing() {
    let source = ObjectStoreSource::new(Arc::new(InMemory::new()), "raw-data");
    assert!(source.list_keys().await.unwrap().is_empty());
}
