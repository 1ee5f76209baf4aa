use axum::Router;

use crate::routes::{health, jobs, quotes};
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    Router::<AppState>::new()
        .nest("/health", health::router())
        .nest("/api/jobs", jobs::router())
        .nest("/api/quotes", quotes::router())
        .with_state(state)
}
