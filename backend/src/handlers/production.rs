//! HTTP handlers for production plans

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use shared::{ProductionPlan, ProductionStatus};

use crate::error::AppResult;
use crate::middleware::CurrentActor;
use crate::services::production::{
    CreateProductionPlanInput, ProductionService, ProductionTransitionInput,
};
use crate::services::TransitionOutcome;
use crate::AppState;

/// Query parameters for listing production plans
#[derive(Debug, Deserialize)]
pub struct ProductionListQuery {
    pub status: Option<ProductionStatus>,
}

/// Create a production plan
pub async fn create_production_plan(
    State(state): State<AppState>,
    actor: CurrentActor,
    Json(input): Json<CreateProductionPlanInput>,
) -> AppResult<Json<ProductionPlan>> {
    let service = ProductionService::new(state.db, state.config.ledger.lock_timeout_ms);
    let plan = service.create(actor.0.actor_id, input).await?;
    Ok(Json(plan))
}

/// List production plans
pub async fn list_production_plans(
    State(state): State<AppState>,
    _actor: CurrentActor,
    Query(query): Query<ProductionListQuery>,
) -> AppResult<Json<Vec<ProductionPlan>>> {
    let service = ProductionService::new(state.db, state.config.ledger.lock_timeout_ms);
    let plans = service.list(query.status).await?;
    Ok(Json(plans))
}

/// Get a production plan
pub async fn get_production_plan(
    State(state): State<AppState>,
    _actor: CurrentActor,
    Path(plan_id): Path<Uuid>,
) -> AppResult<Json<ProductionPlan>> {
    let service = ProductionService::new(state.db, state.config.ledger.lock_timeout_ms);
    let plan = service.get(plan_id).await?;
    Ok(Json(plan))
}

/// Run a production plan status transition
pub async fn transition_production_plan(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(plan_id): Path<Uuid>,
    Json(input): Json<ProductionTransitionInput>,
) -> AppResult<Json<TransitionOutcome<ProductionPlan>>> {
    let service = ProductionService::new(state.db, state.config.ledger.lock_timeout_ms);
    let outcome = service.transition(actor.0.actor_id, plan_id, input).await?;
    Ok(Json(outcome))
}

/// Delete a draft production plan
pub async fn delete_production_plan(
    State(state): State<AppState>,
    _actor: CurrentActor,
    Path(plan_id): Path<Uuid>,
) -> AppResult<Json<()>> {
    let service = ProductionService::new(state.db, state.config.ledger.lock_timeout_ms);
    service.delete(plan_id).await?;
    Ok(Json(()))
}
