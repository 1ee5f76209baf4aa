use crate::config::IngestConfig;
use crate::db::{job_run_queries, QuoteRepository};
use crate::errors::AppError;
use crate::external::ObjectSource;
use crate::jobs::quote_ingest_job;
use crate::models::JobInfo;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

// Context passed to job functions
#[derive(Clone)]
pub struct JobContext {
    pub source: Arc<dyn ObjectSource>,
    pub repository: Arc<dyn QuoteRepository>,
    pub config: Arc<IngestConfig>,
}

#[derive(Debug)]
pub struct JobResult {
    pub items_processed: i32,
    pub items_failed: i32,
}

/// Proof that the caller holds the single active-run slot.
pub type RunClaim = OwnedMutexGuard<()>;

/// Runs the quote ingest job with an overlap guard and `job_runs` bookkeeping.
///
/// Without a pool (dry runs) the bookkeeping is skipped.
#[derive(Clone)]
pub struct JobRunner {
    context: JobContext,
    pool: Option<PgPool>,
    active: Arc<Mutex<()>>,
}

impl JobRunner {
    pub fn new(context: JobContext, pool: Option<PgPool>) -> Self {
        Self {
            context,
            pool,
            active: Arc::new(Mutex::new(())),
        }
    }

    pub fn job_name(&self) -> &'static str {
        quote_ingest_job::JOB_NAME
    }

    pub fn context(&self) -> &JobContext {
        &self.context
    }

    pub fn is_running(&self) -> bool {
        self.active.try_lock().is_err()
    }

    pub fn info(&self) -> JobInfo {
        let config = &self.context.config;
        JobInfo {
            job_name: self.job_name().to_string(),
            schedule: config.schedule.clone(),
            retries: config.retry.retries,
            retry_delay_secs: config.retry.retry_delay.as_secs(),
            running: self.is_running(),
        }
    }

    /// Take the active-run slot, or `None` if a run is in progress.
    pub fn try_claim(&self) -> Option<RunClaim> {
        self.active.clone().try_lock_owned().ok()
    }

    /// Run the job while holding `claim`; the slot is released when this returns.
    pub async fn run_claimed(&self, claim: RunClaim, triggered_by: &str) -> Result<JobResult, AppError> {
        let result = execute_job_with_tracking(
            self.pool.as_ref(),
            self.job_name(),
            triggered_by,
            quote_ingest_job::run_quote_ingest(self.context.clone()),
        )
        .await;
        drop(claim);
        result
    }

    /// Scheduler entry point: run now, or record a skip if a run is still active.
    pub async fn run_or_skip(&self, triggered_by: &str) -> Option<Result<JobResult, AppError>> {
        match self.try_claim() {
            Some(claim) => Some(self.run_claimed(claim, triggered_by).await),
            None => {
                warn!("⏭️ Skipping {}: previous run still active", self.job_name());
                if let Some(pool) = &self.pool {
                    if let Err(e) = job_run_queries::record_skipped(pool, self.job_name(), triggered_by).await {
                        error!("Failed to record skipped run: {}", e);
                    }
                }
                None
            }
        }
    }
}

pub struct JobSchedulerService {
    scheduler: JobScheduler,
    runner: JobRunner,
}

impl JobSchedulerService {
    pub async fn new(runner: JobRunner) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::External(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self { scheduler, runner })
    }

    /// Register the ingest job on its cron expression and start ticking.
    /// Missed ticks are not replayed.
    pub async fn start(&mut self) -> Result<(), AppError> {
        info!("🚀 Starting job scheduler...");

        let schedule = self.runner.context().config.schedule.clone();
        let runner = self.runner.clone();
        let job_name = runner.job_name();

        let job = Job::new_async(schedule.as_str(), move |_uuid, _l| {
            let runner = runner.clone();
            Box::pin(async move {
                runner.run_or_skip("schedule").await;
            })
        })
        .map_err(|e| AppError::Config(format!("Failed to create job {}: {}", job_name, e)))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| AppError::External(format!("Failed to add job {}: {}", job_name, e)))?;

        info!("📅 Scheduled: {} [cron: {}]", job_name, schedule);

        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::External(format!("Failed to start scheduler: {}", e)))?;

        info!("✅ Job scheduler started");
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<(), AppError> {
        info!("🛑 Stopping job scheduler...");
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::External(format!("Failed to stop scheduler: {}", e)))?;
        info!("✅ Job scheduler stopped");
        Ok(())
    }
}

// Job tracking wrapper. Bookkeeping errors are logged and never change the job result.
async fn execute_job_with_tracking<Fut>(
    pool: Option<&PgPool>,
    job_name: &str,
    triggered_by: &str,
    job: Fut,
) -> Result<JobResult, AppError>
where
    Fut: std::future::Future<Output = Result<JobResult, AppError>>,
{
    info!("🏃 Starting job: {} (triggered by {})", job_name, triggered_by);
    let started_at = Utc::now();

    let run_id = match pool {
        Some(pool) => match job_run_queries::record_start(pool, job_name, triggered_by).await {
            Ok(id) => Some(id),
            Err(e) => {
                error!("Failed to record job start: {}", e);
                None
            }
        },
        None => None,
    };

    let result = job.await;
    let duration_ms = (Utc::now() - started_at).num_milliseconds();

    match &result {
        Ok(job_result) => {
            info!(
                "✅ Job completed: {} (processed: {}, failed: {}, duration: {}ms)",
                job_name, job_result.items_processed, job_result.items_failed, duration_ms
            );
            if let (Some(pool), Some(run_id)) = (pool, run_id) {
                if let Err(e) =
                    job_run_queries::record_success(pool, run_id, job_result.items_processed, duration_ms).await
                {
                    error!("Failed to record job success: {}", e);
                }
            }
        }
        Err(e) => {
            error!("❌ Job failed: {} - {}", job_name, e);
            if let (Some(pool), Some(run_id)) = (pool, run_id) {
                if let Err(db_err) = job_run_queries::record_failure(pool, run_id, &e.to_string(), duration_ms).await {
                    error!("Failed to record job failure: {}", db_err);
                }
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryQuoteRepository;
    use crate::external::ObjectStoreSource;
    use object_store::memory::InMemory;

    fn runner() -> JobRunner {
        let context = JobContext {
            source: Arc::new(ObjectStoreSource::new(Arc::new(InMemory::new()), "raw-data")),
            repository: Arc::new(InMemoryQuoteRepository::new()),
            config: Arc::new(IngestConfig::from_env()),
        };
        JobRunner::new(context, None)
    }

    #[tokio::test]
    async fn test_second_claim_is_refused_while_first_is_held() {
        let runner = runner();

        let claim = runner.try_claim().expect("first claim");
        assert!(runner.is_running());
        assert!(runner.try_claim().is_none());
        assert!(runner.run_or_skip("schedule").await.is_none());

        drop(claim);
        assert!(!runner.is_running());
        assert!(runner.try_claim().is_some());
    }

    #[tokio::test]
    async fn test_info_reflects_config() {
        let runner = runner();
        let info = runner.info();
        assert_eq!(info.job_name, "data_elt_dolar");
        assert_eq!(info.schedule, runner.context().config.schedule);
        assert!(!info.running);
    }

    #[tokio::test]
    async fn test_tracking_passes_result_through_without_pool() {
        let ok = execute_job_with_tracking(None, "job", "test", async {
            Ok(JobResult { items_processed: 1, items_failed: 0 })
        })
        .await
        .unwrap();
        assert_eq!(ok.items_processed, 1);

        let err = execute_job_with_tracking(None, "job", "test", async {
            Err(AppError::External("down".into()))
        })
        .await;
        assert!(err.is_err());
    }
}
