//! HTTP handlers for sales orders

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use shared::{SaleRecord, SalesOrder, SalesOrderStatus};

use crate::error::AppResult;
use crate::middleware::CurrentActor;
use crate::services::sales::{
    CreateSalesOrderInput, SalesOrderService, SalesOrderTransitionInput,
};
use crate::services::TransitionOutcome;
use crate::AppState;

/// Query parameters for listing sales orders
#[derive(Debug, Deserialize)]
pub struct SalesOrderListQuery {
    pub status: Option<SalesOrderStatus>,
}

/// Create a sales order
pub async fn create_sales_order(
    State(state): State<AppState>,
    actor: CurrentActor,
    Json(input): Json<CreateSalesOrderInput>,
) -> AppResult<Json<SalesOrder>> {
    let service = SalesOrderService::new(state.db, state.config.ledger.lock_timeout_ms);
    let order = service.create(actor.0.actor_id, input).await?;
    Ok(Json(order))
}

/// List sales orders
pub async fn list_sales_orders(
    State(state): State<AppState>,
    _actor: CurrentActor,
    Query(query): Query<SalesOrderListQuery>,
) -> AppResult<Json<Vec<SalesOrder>>> {
    let service = SalesOrderService::new(state.db, state.config.ledger.lock_timeout_ms);
    let orders = service.list(query.status).await?;
    Ok(Json(orders))
}

/// Get a sales order
pub async fn get_sales_order(
    State(state): State<AppState>,
    _actor: CurrentActor,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<SalesOrder>> {
    let service = SalesOrderService::new(state.db, state.config.ledger.lock_timeout_ms);
    let order = service.get(order_id).await?;
    Ok(Json(order))
}

/// Sale records materialized by a completed sales order
pub async fn get_sale_records(
    State(state): State<AppState>,
    _actor: CurrentActor,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Vec<SaleRecord>>> {
    let service = SalesOrderService::new(state.db, state.config.ledger.lock_timeout_ms);
    let records = service.sale_records(order_id).await?;
    Ok(Json(records))
}

/// Run a sales order status transition
pub async fn transition_sales_order(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(order_id): Path<Uuid>,
    Json(input): Json<SalesOrderTransitionInput>,
) -> AppResult<Json<TransitionOutcome<SalesOrder>>> {
    let service = SalesOrderService::new(state.db, state.config.ledger.lock_timeout_ms);
    let outcome = service.transition(actor.0.actor_id, order_id, input).await?;
    Ok(Json(outcome))
}

/// Delete a pending sales order
pub async fn delete_sales_order(
    State(state): State<AppState>,
    _actor: CurrentActor,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<()>> {
    let service = SalesOrderService::new(state.db, state.config.ledger.lock_timeout_ms);
    service.delete(order_id).await?;
    Ok(Json(()))
}
