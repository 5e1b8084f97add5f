//! Admin surface for automations: run now, enable/disable, delete, resync.
//!
//! Every mutation rebuilds the scheduler's triggers before responding, so a
//! disabled or deleted automation never fires again.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::post::Post;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateAutomationRequest {
    pub enabled: bool,
}

/// POST /api/v1/automations/:id/run
/// Runs the automation once, synchronously, and returns the post it produced.
pub async fn handle_run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Post>, AppError> {
    let automation = state
        .store
        .get_automation(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("automation {id}")))?;
    if !automation.enabled {
        return Err(AppError::Validation(format!("automation {id} is disabled")));
    }

    info!("Manual run requested for automation {id}");
    match state.scheduler.engine().run(id).await {
        Some(post) => Ok(Json(post)),
        None => {
            let reason = state
                .store
                .get_automation(id)
                .await?
                .and_then(|a| a.last_error)
                .unwrap_or_else(|| "run produced no post".to_string());
            Err(AppError::UnprocessableEntity(reason))
        }
    }
}

/// PATCH /api/v1/automations/:id
pub async fn handle_update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateAutomationRequest>,
) -> Result<Json<Value>, AppError> {
    if !state.store.set_automation_enabled(id, body.enabled).await? {
        return Err(AppError::NotFound(format!("automation {id}")));
    }
    let triggers = state.scheduler.resync().await?;
    info!("Automation {id} enabled={}", body.enabled);
    Ok(Json(json!({
        "id": id,
        "enabled": body.enabled,
        "automation_triggers": triggers
    })))
}

/// DELETE /api/v1/automations/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.store.delete_automation(id).await? {
        return Err(AppError::NotFound(format!("automation {id}")));
    }
    state.scheduler.resync().await?;
    info!("Automation {id} deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/scheduler/resync
pub async fn handle_resync(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let triggers = state.scheduler.resync().await?;
    Ok(Json(json!({ "automation_triggers": triggers })))
}
