//! HTTP handlers for purchase orders

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use shared::{PurchaseOrder, PurchaseOrderStatus};

use crate::error::AppResult;
use crate::middleware::CurrentActor;
use crate::services::purchase::{
    CreatePurchaseOrderInput, PurchaseOrderService, PurchaseOrderTransitionInput,
    ReceivePurchaseOrderInput,
};
use crate::services::TransitionOutcome;
use crate::AppState;

/// Query parameters for listing purchase orders
#[derive(Debug, Deserialize)]
pub struct PurchaseOrderListQuery {
    pub status: Option<PurchaseOrderStatus>,
}

/// Create a purchase order
pub async fn create_purchase_order(
    State(state): State<AppState>,
    actor: CurrentActor,
    Json(input): Json<CreatePurchaseOrderInput>,
) -> AppResult<Json<PurchaseOrder>> {
    let service = PurchaseOrderService::new(state.db, state.config.ledger.lock_timeout_ms);
    let order = service.create(actor.0.actor_id, input).await?;
    Ok(Json(order))
}

/// List purchase orders
pub async fn list_purchase_orders(
    State(state): State<AppState>,
    _actor: CurrentActor,
    Query(query): Query<PurchaseOrderListQuery>,
) -> AppResult<Json<Vec<PurchaseOrder>>> {
    let service = PurchaseOrderService::new(state.db, state.config.ledger.lock_timeout_ms);
    let orders = service.list(query.status).await?;
    Ok(Json(orders))
}

/// Get a purchase order
pub async fn get_purchase_order(
    State(state): State<AppState>,
    _actor: CurrentActor,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrder>> {
    let service = PurchaseOrderService::new(state.db, state.config.ledger.lock_timeout_ms);
    let order = service.get(order_id).await?;
    Ok(Json(order))
}

/// Run a purchase order status transition
pub async fn transition_purchase_order(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(order_id): Path<Uuid>,
    Json(input): Json<PurchaseOrderTransitionInput>,
) -> AppResult<Json<TransitionOutcome<PurchaseOrder>>> {
    let service = PurchaseOrderService::new(state.db, state.config.ledger.lock_timeout_ms);
    let outcome = service.transition(actor.0.actor_id, order_id, input).await?;
    Ok(Json(outcome))
}

/// Record a (partial) receipt against a shipped purchase order
pub async fn receive_purchase_order(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(order_id): Path<Uuid>,
    Json(input): Json<ReceivePurchaseOrderInput>,
) -> AppResult<Json<TransitionOutcome<PurchaseOrder>>> {
    let service = PurchaseOrderService::new(state.db, state.config.ledger.lock_timeout_ms);
    let outcome = service.receive(actor.0.actor_id, order_id, input).await?;
    Ok(Json(outcome))
}

/// Delete a draft purchase order
pub async fn delete_purchase_order(
    State(state): State<AppState>,
    _actor: CurrentActor,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<()>> {
    let service = PurchaseOrderService::new(state.db, state.config.ledger.lock_timeout_ms);
    service.delete(order_id).await?;
    Ok(Json(()))
}
