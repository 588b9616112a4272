use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::handlers::require_admin;
use crate::models::{Settings, UpdateSettings};
use crate::services::Caller;
use crate::startup::AppState;

#[tracing::instrument(skip(state, caller))]
pub async fn get_settings(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Settings>, AppError> {
    require_admin(&caller)?;
    Ok(Json(state.service.settings().await?))
}

#[tracing::instrument(skip(state, caller, update))]
pub async fn update_settings(
    State(state): State<AppState>,
    caller: Caller,
    Json(update): Json<UpdateSettings>,
) -> Result<Json<Settings>, AppError> {
    require_admin(&caller)?;
    Ok(Json(state.service.update_settings(update).await?))
}
