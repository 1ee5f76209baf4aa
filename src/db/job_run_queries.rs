use sqlx::PgPool;

use crate::models::{JobRun, JobStats, JobStatus};

const CREATE_JOB_RUNS_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS job_runs (
        id SERIAL PRIMARY KEY,
        job_name TEXT NOT NULL,
        triggered_by TEXT NOT NULL,
        started_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        completed_at TIMESTAMPTZ,
        status TEXT NOT NULL CHECK (status IN ('running', 'success', 'failed', 'skipped')),
        error_message TEXT,
        items_processed INTEGER,
        duration_ms BIGINT
    )
"#;

const CREATE_JOB_RUNS_INDEX_SQL: &str =
    "CREATE INDEX IF NOT EXISTS job_runs_job_name_started_at_idx ON job_runs (job_name, started_at DESC)";

pub async fn ensure_table(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_JOB_RUNS_SQL).execute(pool).await?;
    sqlx::query(CREATE_JOB_RUNS_INDEX_SQL).execute(pool).await?;
    Ok(())
}

pub async fn record_start(pool: &PgPool, job_name: &str, triggered_by: &str) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        INSERT INTO job_runs (job_name, triggered_by, status)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(job_name)
    .bind(triggered_by)
    .bind(JobStatus::Running.as_str())
    .fetch_one(pool)
    .await
}

pub async fn record_success(
    pool: &PgPool,
    run_id: i32,
    items_processed: i32,
    duration_ms: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE job_runs
        SET completed_at = NOW(),
            status = $2,
            items_processed = $3,
            duration_ms = $4
        WHERE id = $1
        "#,
    )
    .bind(run_id)
    .bind(JobStatus::Success.as_str())
    .bind(items_processed)
    .bind(duration_ms)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn record_failure(
    pool: &PgPool,
    run_id: i32,
    error_message: &str,
    duration_ms: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE job_runs
        SET completed_at = NOW(),
            status = $2,
            error_message = $3,
            duration_ms = $4
        WHERE id = $1
        "#,
    )
    .bind(run_id)
    .bind(JobStatus::Failed.as_str())
    .bind(error_message)
    .bind(duration_ms)
    .execute(pool)
    .await?;

    Ok(())
}

/// A tick that fired while a previous run was still active.
pub async fn record_skipped(pool: &PgPool, job_name: &str, triggered_by: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO job_runs (job_name, triggered_by, status, completed_at, error_message)
        VALUES ($1, $2, $3, NOW(), 'previous run still active')
        "#,
    )
    .bind(job_name)
    .bind(triggered_by)
    .bind(JobStatus::Skipped.as_str())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn fetch_recent(pool: &PgPool, limit: i64) -> Result<Vec<JobRun>, sqlx::Error> {
    sqlx::query_as::<_, JobRun>(
        r#"
        SELECT id, job_name, triggered_by, started_at, completed_at, status,
               error_message, items_processed, duration_ms
        FROM job_runs
        ORDER BY started_at DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn fetch_history(pool: &PgPool, job_name: &str, limit: i64) -> Result<Vec<JobRun>, sqlx::Error> {
    sqlx::query_as::<_, JobRun>(
        r#"
        SELECT id, job_name, triggered_by, started_at, completed_at, status,
               error_message, items_processed, duration_ms
        FROM job_runs
        WHERE job_name = $1
        ORDER BY started_at DESC
        LIMIT $2
        "#,
    )
    .bind(job_name)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn fetch_stats(pool: &PgPool, job_name: &str) -> Result<Option<JobStats>, sqlx::Error> {
    sqlx::query_as::<_, JobStats>(
        r#"
        SELECT
            job_name,
            COUNT(*) AS total_runs,
            COUNT(*) FILTER (WHERE status = 'success') AS successful_runs,
            COUNT(*) FILTER (WHERE status = 'failed') AS failed_runs,
            COUNT(*) FILTER (WHERE status = 'skipped') AS skipped_runs,
            AVG(duration_ms)::FLOAT8 AS avg_duration_ms,
            MAX(started_at) AS last_run,
            (SELECT status FROM job_runs WHERE job_name = $1 ORDER BY started_at DESC LIMIT 1) AS last_status
        FROM job_runs
        WHERE job_name = $1
        GROUP BY job_name
        "#,
    )
    .bind(job_name)
    .fetch_optional(pool)
    .await
}
