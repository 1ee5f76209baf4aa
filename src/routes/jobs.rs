use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info};

use crate::db::job_run_queries;
use crate::errors::AppError;
use crate::models::{JobInfo, JobRun, JobStats};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_jobs))
        .route("/recent", get(recent_job_runs))
        .route("/:job_name/history", get(job_history))
        .route("/:job_name/stats", get(job_stats))
        .route("/:job_name/trigger", post(trigger_job))
}

fn require_known_job(state: &AppState, job_name: &str) -> Result<(), AppError> {
    if job_name == state.runner.job_name() {
        Ok(())
    } else {
        Err(AppError::NotFound)
    }
}

/// GET /api/jobs - List configured jobs
async fn list_jobs(State(state): State<AppState>) -> Json<Vec<JobInfo>> {
    Json(vec![state.runner.info()])
}

/// GET /api/jobs/recent - Last 50 runs across jobs
async fn recent_job_runs(State(state): State<AppState>) -> Result<Json<Vec<JobRun>>, AppError> {
    let runs = job_run_queries::fetch_recent(&state.pool, 50).await?;
    Ok(Json(runs))
}

/// GET /api/jobs/:job_name/history - Last 100 runs of one job
async fn job_history(
    Path(job_name): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<JobRun>>, AppError> {
    require_known_job(&state, &job_name)?;
    let runs = job_run_queries::fetch_history(&state.pool, &job_name, 100).await?;
    Ok(Json(runs))
}

/// GET /api/jobs/:job_name/stats
async fn job_stats(
    Path(job_name): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<JobStats>, AppError> {
    require_known_job(&state, &job_name)?;
    let stats = job_run_queries::fetch_stats(&state.pool, &job_name)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(stats))
}

/// POST /api/jobs/:job_name/trigger - Start a run in the background
async fn trigger_job(
    Path(job_name): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    require_known_job(&state, &job_name)?;

    let claim = state
        .runner
        .try_claim()
        .ok_or_else(|| AppError::Conflict(format!("{} is already running", job_name)))?;

    info!("POST /api/jobs/{}/trigger - Manual run accepted", job_name);
    let runner = state.runner.clone();
    tokio::spawn(async move {
        if let Err(e) = runner.run_claimed(claim, "manual").await {
            error!("Manual run of {} failed: {}", runner.job_name(), e);
        }
    });

    Ok(StatusCode::ACCEPTED)
}
