use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Router,
};
use tracing::{debug, warn};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health))
        .route("/ready", get(ready))
}

async fn health() -> &'static str {
    debug!("GET /health - Health check");
    "OK"
}

/// Ready once the warehouse answers a trivial query.
async fn ready(State(state): State<AppState>) -> (StatusCode, &'static str) {
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => (StatusCode::OK, "READY"),
        Err(e) => {
            warn!("GET /health/ready - database unreachable: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "DATABASE UNAVAILABLE")
        }
    }
}
