// API routing, split by domain.
pub mod agent;
pub mod auth;
pub mod errors;
pub mod history;

use crate::state::AppState;
use axum::Router;
use std::sync::Arc;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(agent::router())
        .merge(history::router())
        .with_state(state)
}
