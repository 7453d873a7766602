//! Production plan service: turning raw materials into finished goods
//!
//! Completion is the heavy transition: it debits raw-material stock by the
//! recorded consumption and credits the plan's hub location with each line's
//! produced quantity, all in one transaction with the status change.

use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

use shared::{
    plan_completion_effects, validate_line_items, validate_non_negative_qty,
    validate_positive_qty, validate_transition, MaterialConsumption, ProductionLine,
    ProductionPlan, ProductionStatus, WorkflowKind, WorkflowState,
};

use crate::error::{AppError, AppResult};
use crate::services::{
    collect_line_updates, effects, ledger::StockLedgerService, map_reference_error, LineQtyInput,
    TransitionOutcome,
};

/// Production plan service
#[derive(Clone)]
pub struct ProductionService {
    db: PgPool,
    ledger: StockLedgerService,
}

/// Input for creating a production plan
#[derive(Debug, Deserialize)]
pub struct CreateProductionPlanInput {
    pub hub_location_id: Uuid,
    pub notes: Option<String>,
    pub lines: Vec<CreateProductionLineInput>,
}

/// One finished-goods SKU on a new production plan
#[derive(Debug, Deserialize)]
pub struct CreateProductionLineInput {
    pub sku_id: Uuid,
    pub planned_qty: i64,
}

/// Input for a production plan status transition
#[derive(Debug, Deserialize)]
pub struct ProductionTransitionInput {
    pub target_status: ProductionStatus,
    /// Produced quantities per line, required for COMPLETED
    pub produced: Option<Vec<LineQtyInput>>,
    /// Raw materials consumed by the run, applied as debits on COMPLETED
    pub consumptions: Option<Vec<MaterialConsumption>>,
}

/// Row for production plan header queries
#[derive(Debug, FromRow)]
struct ProductionPlanRow {
    id: Uuid,
    status: String,
    hub_location_id: Uuid,
    notes: Option<String>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Row for production line queries
#[derive(Debug, FromRow)]
struct ProductionLineRow {
    id: Uuid,
    plan_id: Uuid,
    sku_id: Uuid,
    planned_qty: i64,
    produced_qty: Option<i64>,
}

impl ProductionPlanRow {
    fn status(&self) -> AppResult<ProductionStatus> {
        ProductionStatus::from_str(&self.status).ok_or_else(|| {
            AppError::Internal(format!("Unknown production status: {}", self.status))
        })
    }

    fn assemble(self, lines: Vec<ProductionLineRow>) -> AppResult<ProductionPlan> {
        let status = self.status()?;
        Ok(ProductionPlan {
            id: self.id,
            status,
            hub_location_id: self.hub_location_id,
            notes: self.notes,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
            lines: lines
                .into_iter()
                .map(|line| ProductionLine {
                    id: line.id,
                    sku_id: line.sku_id,
                    planned_qty: line.planned_qty,
                    produced_qty: line.produced_qty,
                })
                .collect(),
        })
    }
}

impl ProductionService {
    /// Create a new ProductionService instance
    pub fn new(db: PgPool, lock_timeout_ms: u64) -> Self {
        let ledger = StockLedgerService::new(db.clone(), lock_timeout_ms);
        Self { db, ledger }
    }

    /// Create a production plan in DRAFT; no ledger effects yet
    pub async fn create(
        &self,
        actor_id: Uuid,
        input: CreateProductionPlanInput,
    ) -> AppResult<ProductionPlan> {
        validate_line_items(&input.lines).map_err(|msg| AppError::Validation {
            field: "lines".to_string(),
            message: msg.to_string(),
        })?;
        for line in &input.lines {
            validate_positive_qty(line.planned_qty).map_err(|msg| AppError::Validation {
                field: "planned_qty".to_string(),
                message: msg.to_string(),
            })?;
        }

        let mut tx = self.db.begin().await?;

        let plan_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO production_plans (status, hub_location_id, notes, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(ProductionStatus::initial().as_str())
        .bind(input.hub_location_id)
        .bind(&input.notes)
        .bind(actor_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_reference_error)?;

        for line in &input.lines {
            sqlx::query(
                r#"
                INSERT INTO production_lines (plan_id, sku_id, planned_qty)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(plan_id)
            .bind(line.sku_id)
            .bind(line.planned_qty)
            .execute(&mut *tx)
            .await
            .map_err(map_reference_error)?;
        }

        tx.commit().await?;

        self.get(plan_id).await
    }

    /// Get a production plan with its lines
    pub async fn get(&self, plan_id: Uuid) -> AppResult<ProductionPlan> {
        let row = sqlx::query_as::<_, ProductionPlanRow>(
            r#"
            SELECT id, status, hub_location_id, notes, created_by, created_at, updated_at
            FROM production_plans
            WHERE id = $1
            "#,
        )
        .bind(plan_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Production plan".to_string()))?;

        let lines = sqlx::query_as::<_, ProductionLineRow>(
            r#"
            SELECT id, plan_id, sku_id, planned_qty, produced_qty
            FROM production_lines
            WHERE plan_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(plan_id)
        .fetch_all(&self.db)
        .await?;

        row.assemble(lines)
    }

    /// List production plans, optionally by status
    pub async fn list(&self, status: Option<ProductionStatus>) -> AppResult<Vec<ProductionPlan>> {
        let rows = sqlx::query_as::<_, ProductionPlanRow>(
            r#"
            SELECT id, status, hub_location_id, notes, created_by, created_at, updated_at
            FROM production_plans
            WHERE ($1::varchar IS NULL OR status = $1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let line_rows = sqlx::query_as::<_, ProductionLineRow>(
            r#"
            SELECT id, plan_id, sku_id, planned_qty, produced_qty
            FROM production_lines
            WHERE plan_id = ANY($1)
            ORDER BY created_at
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        let mut lines_by_plan: HashMap<Uuid, Vec<ProductionLineRow>> = HashMap::new();
        for line in line_rows {
            lines_by_plan.entry(line.plan_id).or_default().push(line);
        }

        rows.into_iter()
            .map(|row| {
                let lines = lines_by_plan.remove(&row.id).unwrap_or_default();
                row.assemble(lines)
            })
            .collect()
    }

    /// Run a status transition; only IN_PRODUCTION -> COMPLETED touches the
    /// ledger
    pub async fn transition(
        &self,
        actor_id: Uuid,
        plan_id: Uuid,
        input: ProductionTransitionInput,
    ) -> AppResult<TransitionOutcome<ProductionPlan>> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, ProductionPlanRow>(
            r#"
            SELECT id, status, hub_location_id, notes, created_by, created_at, updated_at
            FROM production_plans
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(plan_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Production plan".to_string()))?;

        let current = row.status()?;
        validate_transition(current, input.target_status)?;

        let warnings = if input.target_status == ProductionStatus::Completed {
            let line_rows = sqlx::query_as::<_, ProductionLineRow>(
                r#"
                SELECT id, plan_id, sku_id, planned_qty, produced_qty
                FROM production_lines
                WHERE plan_id = $1
                ORDER BY created_at
                "#,
            )
            .bind(plan_id)
            .fetch_all(&mut *tx)
            .await?;

            let consumptions = input.consumptions.unwrap_or_default();
            for consumption in &consumptions {
                validate_positive_qty(consumption.quantity).map_err(|msg| {
                    AppError::Validation {
                        field: "consumptions".to_string(),
                        message: msg.to_string(),
                    }
                })?;
            }

            let updates = collect_line_updates(input.produced.as_deref().unwrap_or(&[]))?;
            for line_id in updates.keys() {
                if !line_rows.iter().any(|line| line.id == *line_id) {
                    return Err(AppError::Validation {
                        field: "produced".to_string(),
                        message: format!("Unknown line item {}", line_id),
                    });
                }
            }

            let mut produced = Vec::with_capacity(line_rows.len());
            for line in &line_rows {
                let qty = updates.get(&line.id).copied().unwrap_or(0);
                validate_non_negative_qty(qty).map_err(|msg| AppError::Validation {
                    field: "produced".to_string(),
                    message: msg.to_string(),
                })?;
                sqlx::query("UPDATE production_lines SET produced_qty = $1 WHERE id = $2")
                    .bind(qty)
                    .bind(line.id)
                    .execute(&mut *tx)
                    .await?;
                produced.push((line.sku_id, qty));
            }

            if consumptions.is_empty() && produced.iter().all(|&(_, qty)| qty == 0) {
                return Err(AppError::Validation {
                    field: "produced".to_string(),
                    message: "Completion requires produced quantities or material consumption"
                        .to_string(),
                });
            }

            let plan = plan_completion_effects(row.hub_location_id, &produced, &consumptions);
            effects::apply_planned_changes(
                &mut tx,
                &self.ledger,
                WorkflowKind::ProductionPlan,
                plan_id,
                actor_id,
                &plan,
            )
            .await?
        } else {
            // Confirmation, starting production, and cancellation are
            // status-only; nothing reaches the ledger before COMPLETED
            Vec::new()
        };

        sqlx::query("UPDATE production_plans SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(input.target_status.as_str())
            .bind(plan_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let instance = self.get(plan_id).await?;
        Ok(TransitionOutcome { instance, warnings })
    }

    /// Delete a production plan still in its initial state
    pub async fn delete(&self, plan_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM production_plans WHERE id = $1 FOR UPDATE",
        )
        .bind(plan_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Production plan".to_string()))?;

        if ProductionStatus::from_str(&status) != Some(ProductionStatus::initial()) {
            return Err(AppError::ValidationError(
                "Only draft production plans can be deleted".to_string(),
            ));
        }

        sqlx::query("DELETE FROM production_plans WHERE id = $1")
            .bind(plan_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
