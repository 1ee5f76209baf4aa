use std::sync::Arc;
use sqlx::PgPool;
use crate::config::IngestConfig;
use crate::services::job_scheduler_service::JobRunner;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub runner: JobRunner,
    pub config: Arc<IngestConfig>,
}
