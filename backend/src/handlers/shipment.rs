//! HTTP handlers for shipment requests

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use shared::{ShipmentRequest, ShipmentStatus};

use crate::error::AppResult;
use crate::middleware::CurrentActor;
use crate::services::shipment::{CreateShipmentInput, ShipmentService, ShipmentTransitionInput};
use crate::services::TransitionOutcome;
use crate::AppState;

/// Query parameters for listing shipment requests
#[derive(Debug, Deserialize)]
pub struct ShipmentListQuery {
    pub status: Option<ShipmentStatus>,
}

/// Create a shipment request
pub async fn create_shipment(
    State(state): State<AppState>,
    actor: CurrentActor,
    Json(input): Json<CreateShipmentInput>,
) -> AppResult<Json<ShipmentRequest>> {
    let service = ShipmentService::new(state.db, state.config.ledger.lock_timeout_ms);
    let shipment = service.create(actor.0.actor_id, input).await?;
    Ok(Json(shipment))
}

/// List shipment requests
pub async fn list_shipments(
    State(state): State<AppState>,
    _actor: CurrentActor,
    Query(query): Query<ShipmentListQuery>,
) -> AppResult<Json<Vec<ShipmentRequest>>> {
    let service = ShipmentService::new(state.db, state.config.ledger.lock_timeout_ms);
    let shipments = service.list(query.status).await?;
    Ok(Json(shipments))
}

/// Get a shipment request
pub async fn get_shipment(
    State(state): State<AppState>,
    _actor: CurrentActor,
    Path(shipment_id): Path<Uuid>,
) -> AppResult<Json<ShipmentRequest>> {
    let service = ShipmentService::new(state.db, state.config.ledger.lock_timeout_ms);
    let shipment = service.get(shipment_id).await?;
    Ok(Json(shipment))
}

/// Run a shipment status transition
pub async fn transition_shipment(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(shipment_id): Path<Uuid>,
    Json(input): Json<ShipmentTransitionInput>,
) -> AppResult<Json<TransitionOutcome<ShipmentRequest>>> {
    let service = ShipmentService::new(state.db, state.config.ledger.lock_timeout_ms);
    let outcome = service
        .transition(actor.0.actor_id, shipment_id, input)
        .await?;
    Ok(Json(outcome))
}

/// Delete a pending shipment request
pub async fn delete_shipment(
    State(state): State<AppState>,
    _actor: CurrentActor,
    Path(shipment_id): Path<Uuid>,
) -> AppResult<Json<()>> {
    let service = ShipmentService::new(state.db, state.config.ledger.lock_timeout_ms);
    service.delete(shipment_id).await?;
    Ok(Json(()))
}
