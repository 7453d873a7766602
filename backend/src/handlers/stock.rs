//! HTTP handlers for stock positions and the ledger audit trail

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use shared::{LedgerEntry, PaginatedResponse, Pagination, StockPosition, TxType};

use crate::error::AppResult;
use crate::middleware::CurrentActor;
use crate::services::ledger::{
    AdjustStockInput, AdjustmentOutcome, LedgerEntryFilter, StockLedgerService,
};
use crate::AppState;

/// Query parameters for listing positions
#[derive(Debug, Deserialize)]
pub struct PositionQuery {
    pub location_id: Option<Uuid>,
}

/// Query parameters for the ledger audit listing
#[derive(Debug, Deserialize)]
pub struct LedgerQuery {
    pub location_id: Option<Uuid>,
    pub sku_id: Option<Uuid>,
    pub tx_type: Option<TxType>,
    pub ref_id: Option<Uuid>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub order_by: Option<String>,
    pub order: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// List stock positions
pub async fn list_positions(
    State(state): State<AppState>,
    _actor: CurrentActor,
    Query(query): Query<PositionQuery>,
) -> AppResult<Json<Vec<StockPosition>>> {
    let service = StockLedgerService::new(state.db, state.config.ledger.lock_timeout_ms);
    let positions = service.list_positions(query.location_id).await?;
    Ok(Json(positions))
}

/// Get the stock position for a `(location, sku)` pair
pub async fn get_position(
    State(state): State<AppState>,
    _actor: CurrentActor,
    Path((location_id, sku_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<StockPosition>> {
    let service = StockLedgerService::new(state.db, state.config.ledger.lock_timeout_ms);
    let position = service.get_position(location_id, sku_id).await?;
    Ok(Json(position))
}

/// List ledger entries for audit
pub async fn list_ledger_entries(
    State(state): State<AppState>,
    _actor: CurrentActor,
    Query(query): Query<LedgerQuery>,
) -> AppResult<Json<PaginatedResponse<LedgerEntry>>> {
    let service = StockLedgerService::new(state.db, state.config.ledger.lock_timeout_ms);

    let filter = LedgerEntryFilter {
        location_id: query.location_id,
        sku_id: query.sku_id,
        tx_type: query.tx_type,
        ref_id: query.ref_id,
        from_date: query.from_date,
        to_date: query.to_date,
        order_by: query.order_by,
        order: query.order,
    };
    let pagination = Pagination {
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(50),
    };

    let entries = service.list_entries(filter, pagination).await?;
    Ok(Json(entries))
}

/// Record a manual stock adjustment (clamped at zero)
pub async fn record_adjustment(
    State(state): State<AppState>,
    actor: CurrentActor,
    Json(input): Json<AdjustStockInput>,
) -> AppResult<Json<AdjustmentOutcome>> {
    let service = StockLedgerService::new(state.db, state.config.ledger.lock_timeout_ms);
    let outcome = service.record_adjustment(actor.0.actor_id, input).await?;
    Ok(Json(outcome))
}
