pub mod automations;
pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/automations/:id",
            patch(automations::handle_update).delete(automations::handle_delete),
        )
        .route("/api/v1/automations/:id/run", post(automations::handle_run))
        .route("/api/v1/scheduler/resync", post(automations::handle_resync))
        .with_state(state)
}
