//! HTTP handlers for reorder thresholds and low-stock alerts

use axum::{extract::State, Json};

use shared::{LowStockAlert, ReorderThreshold};

use crate::error::AppResult;
use crate::middleware::CurrentActor;
use crate::services::threshold::SetThresholdInput;
use crate::AppState;

/// List reorder thresholds
pub async fn list_thresholds(
    State(state): State<AppState>,
    _actor: CurrentActor,
) -> AppResult<Json<Vec<ReorderThreshold>>> {
    let thresholds = state.thresholds.list().await?;
    Ok(Json(thresholds))
}

/// Set (upsert) a reorder threshold
pub async fn set_threshold(
    State(state): State<AppState>,
    _actor: CurrentActor,
    Json(input): Json<SetThresholdInput>,
) -> AppResult<Json<ReorderThreshold>> {
    let threshold = state.thresholds.set_threshold(input).await?;
    Ok(Json(threshold))
}

/// Positions at or below their reorder threshold
pub async fn get_low_stock(
    State(state): State<AppState>,
    _actor: CurrentActor,
) -> AppResult<Json<Vec<LowStockAlert>>> {
    let alerts = state.thresholds.low_stock().await?;
    Ok(Json(alerts))
}
