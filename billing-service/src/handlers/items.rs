use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::handlers::require_admin;
use crate::models::{decimal_from_value, Item};
use crate::services::Caller;
use crate::startup::AppState;

#[tracing::instrument(skip(state, _caller))]
pub async fn list_items(
    State(state): State<AppState>,
    _caller: Caller,
) -> Result<Json<Vec<Item>>, AppError> {
    Ok(Json(state.service.list_items().await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpsertItemRequest {
    #[validate(length(min = 1, message = "item name is required"))]
    pub name: String,
    pub rate: serde_json::Value,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[tracing::instrument(skip(state, caller, request))]
pub async fn upsert_item(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<UpsertItemRequest>,
) -> Result<StatusCode, AppError> {
    require_admin(&caller)?;
    request.validate()?;

    let rate = decimal_from_value(&request.rate)
        .filter(|r| *r >= Decimal::ZERO)
        .ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!("item rate must be a non-negative number"))
        })?;

    let item = Item {
        id: Uuid::new_v4(),
        name: request.name.trim().to_string(),
        rate,
        active: request.active,
        created_at: Utc::now(),
    };
    state.service.upsert_item(&item).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct SuggestedRate {
    pub item_name: String,
    pub rate: Decimal,
}

/// Average of the item's last billed rates; 404 when the item has never
/// been billed.
#[tracing::instrument(skip(state, _caller))]
pub async fn suggested_rate(
    State(state): State<AppState>,
    _caller: Caller,
    Path(name): Path<String>,
) -> Result<Json<SuggestedRate>, AppError> {
    match state.service.suggested_rate(&name).await? {
        Some(rate) => Ok(Json(SuggestedRate {
            item_name: name,
            rate,
        })),
        None => Err(AppError::NotFound(anyhow::anyhow!(
            "no billing history for item"
        ))),
    }
}
