use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use crate::db::quote_queries;
use crate::errors::AppError;
use crate::models::QuoteRecord;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 24;
const MAX_LIMIT: i64 = 1000;
const UNDEFINED_TABLE: &str = "42P01";

pub fn router() -> Router<AppState> {
    Router::new().route("/latest", get(latest_quotes))
}

#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    pub limit: Option<i64>,
}

/// GET /api/quotes/latest?limit=N - Most recently ingested rows
async fn latest_quotes(
    Query(params): Query<LatestQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<QuoteRecord>>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(AppError::validation(
            format!("limit must be between 1 and {}", MAX_LIMIT),
            limit.to_string(),
        ));
    }

    info!("GET /api/quotes/latest - limit {}", limit);
    match quote_queries::fetch_recent(&state.pool, &state.config.table, limit).await {
        Ok(rows) => Ok(Json(rows)),
        // table is created by the first load
        Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some(UNDEFINED_TABLE) => Ok(Json(Vec::new())),
        Err(e) => Err(e.into()),
    }
}
