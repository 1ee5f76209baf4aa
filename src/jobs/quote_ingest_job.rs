use tracing::info;

use crate::errors::AppError;
use crate::jobs::task_retry::run_with_retry;
use crate::services::availability_watcher;
use crate::services::ingest_processor::{self, ProcessOutcome};
use crate::services::job_scheduler_service::{JobContext, JobResult};

pub const JOB_NAME: &str = "data_elt_dolar";
pub const WAIT_TASK: &str = "wait_for_s3_file";
pub const PROCESS_TASK: &str = "process_json_to_postgres";

/// `wait_for_s3_file >> process_json_to_postgres`
///
/// The processor only starts once the watcher has seen a matching key. Each
/// task is retried on its own under the context's retry policy.
pub async fn run_quote_ingest(ctx: JobContext) -> Result<JobResult, AppError> {
    let (_, outcome) = run_tasks(&ctx).await?;
    Ok(JobResult {
        items_processed: outcome.rows_written(),
        items_failed: 0,
    })
}

/// Both tasks, returning the key that released the watcher and the processor outcome.
pub async fn run_tasks(ctx: &JobContext) -> Result<(String, ProcessOutcome), AppError> {
    let policy = ctx.config.retry;

    let matched = run_with_retry(WAIT_TASK, policy, || {
        availability_watcher::wait_for_object(ctx.source.as_ref(), &ctx.config.watcher)
    })
    .await?;
    info!("{} released by {}", WAIT_TASK, matched);

    let outcome = run_processor(ctx).await?;
    Ok((matched, outcome))
}

/// Processor task alone, with retries.
pub async fn run_processor(ctx: &JobContext) -> Result<ProcessOutcome, AppError> {
    run_with_retry(PROCESS_TASK, ctx.config.retry, || {
        ingest_processor::process_latest(
            ctx.source.as_ref(),
            ctx.repository.as_ref(),
            &ctx.config.currency_pair,
        )
    })
    .await
}
