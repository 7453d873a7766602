//! HTTP handlers for restock requests

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use shared::{RestockRequest, RestockStatus};

use crate::error::AppResult;
use crate::middleware::CurrentActor;
use crate::services::restock::{CreateRestockInput, RestockService, RestockTransitionInput};
use crate::services::TransitionOutcome;
use crate::AppState;

/// Query parameters for listing restock requests
#[derive(Debug, Deserialize)]
pub struct RestockListQuery {
    pub status: Option<RestockStatus>,
}

/// Create a restock request
pub async fn create_restock(
    State(state): State<AppState>,
    actor: CurrentActor,
    Json(input): Json<CreateRestockInput>,
) -> AppResult<Json<RestockRequest>> {
    let service = RestockService::new(state.db, state.config.ledger.lock_timeout_ms);
    let restock = service.create(actor.0.actor_id, input).await?;
    Ok(Json(restock))
}

/// List restock requests
pub async fn list_restocks(
    State(state): State<AppState>,
    _actor: CurrentActor,
    Query(query): Query<RestockListQuery>,
) -> AppResult<Json<Vec<RestockRequest>>> {
    let service = RestockService::new(state.db, state.config.ledger.lock_timeout_ms);
    let restocks = service.list(query.status).await?;
    Ok(Json(restocks))
}

/// Get a restock request
pub async fn get_restock(
    State(state): State<AppState>,
    _actor: CurrentActor,
    Path(restock_id): Path<Uuid>,
) -> AppResult<Json<RestockRequest>> {
    let service = RestockService::new(state.db, state.config.ledger.lock_timeout_ms);
    let restock = service.get(restock_id).await?;
    Ok(Json(restock))
}

/// Run a restock status transition
pub async fn transition_restock(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(restock_id): Path<Uuid>,
    Json(input): Json<RestockTransitionInput>,
) -> AppResult<Json<TransitionOutcome<RestockRequest>>> {
    let service = RestockService::new(state.db, state.config.ledger.lock_timeout_ms);
    let outcome = service
        .transition(actor.0.actor_id, restock_id, input)
        .await?;
    Ok(Json(outcome))
}

/// Delete a draft restock request
pub async fn delete_restock(
    State(state): State<AppState>,
    _actor: CurrentActor,
    Path(restock_id): Path<Uuid>,
) -> AppResult<Json<()>> {
    let service = RestockService::new(state.db, state.config.ledger.lock_timeout_ms);
    service.delete(restock_id).await?;
    Ok(Json(()))
}
