//! Restock request service: store replenishment approvals and receipts
//!
//! The approval chain (DRAFT -> APPROVED -> ORDERED) is pure paperwork; the
//! ledger is only touched when goods arrive, crediting the requesting
//! location with whatever the operator keys in as actually received.

use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

use shared::{
    plan_restock_receipt_effects, validate_line_items, validate_non_negative_qty,
    validate_positive_qty, validate_transition, RestockLine, RestockRequest, RestockStatus,
    WorkflowKind, WorkflowState,
};

use crate::error::{AppError, AppResult};
use crate::services::{
    collect_line_updates, effects, ledger::StockLedgerService, map_reference_error, LineQtyInput,
    TransitionOutcome,
};

/// Restock request service
#[derive(Clone)]
pub struct RestockService {
    db: PgPool,
    ledger: StockLedgerService,
}

/// Input for creating a restock request
#[derive(Debug, Deserialize)]
pub struct CreateRestockInput {
    pub location_id: Uuid,
    pub notes: Option<String>,
    pub lines: Vec<CreateRestockLineInput>,
}

/// One requested SKU on a new restock request
#[derive(Debug, Deserialize)]
pub struct CreateRestockLineInput {
    pub sku_id: Uuid,
    pub requested_qty: i64,
}

/// Input for a restock status transition
#[derive(Debug, Deserialize)]
pub struct RestockTransitionInput {
    pub target_status: RestockStatus,
    /// Received quantities, required for the RECEIVED transition
    pub lines: Option<Vec<LineQtyInput>>,
}

/// Row for restock header queries
#[derive(Debug, FromRow)]
struct RestockRow {
    id: Uuid,
    status: String,
    location_id: Uuid,
    notes: Option<String>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Row for restock line queries
#[derive(Debug, FromRow)]
struct RestockLineRow {
    id: Uuid,
    restock_id: Uuid,
    sku_id: Uuid,
    requested_qty: i64,
    received_qty: Option<i64>,
}

impl RestockRow {
    fn status(&self) -> AppResult<RestockStatus> {
        RestockStatus::from_str(&self.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown restock status: {}", self.status)))
    }

    fn assemble(self, lines: Vec<RestockLineRow>) -> AppResult<RestockRequest> {
        let status = self.status()?;
        Ok(RestockRequest {
            id: self.id,
            status,
            location_id: self.location_id,
            notes: self.notes,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
            lines: lines
                .into_iter()
                .map(|line| RestockLine {
                    id: line.id,
                    sku_id: line.sku_id,
                    requested_qty: line.requested_qty,
                    received_qty: line.received_qty,
                })
                .collect(),
        })
    }
}

impl RestockService {
    /// Create a new RestockService instance
    pub fn new(db: PgPool, lock_timeout_ms: u64) -> Self {
        let ledger = StockLedgerService::new(db.clone(), lock_timeout_ms);
        Self { db, ledger }
    }

    /// Create a restock request in DRAFT; no ledger effects yet
    pub async fn create(
        &self,
        actor_id: Uuid,
        input: CreateRestockInput,
    ) -> AppResult<RestockRequest> {
        validate_line_items(&input.lines).map_err(|msg| AppError::Validation {
            field: "lines".to_string(),
            message: msg.to_string(),
        })?;
        for line in &input.lines {
            validate_positive_qty(line.requested_qty).map_err(|msg| AppError::Validation {
                field: "requested_qty".to_string(),
                message: msg.to_string(),
            })?;
        }

        let mut tx = self.db.begin().await?;

        let restock_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO restock_requests (status, location_id, notes, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(RestockStatus::initial().as_str())
        .bind(input.location_id)
        .bind(&input.notes)
        .bind(actor_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_reference_error)?;

        for line in &input.lines {
            sqlx::query(
                r#"
                INSERT INTO restock_lines (restock_id, sku_id, requested_qty)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(restock_id)
            .bind(line.sku_id)
            .bind(line.requested_qty)
            .execute(&mut *tx)
            .await
            .map_err(map_reference_error)?;
        }

        tx.commit().await?;

        self.get(restock_id).await
    }

    /// Get a restock request with its lines
    pub async fn get(&self, restock_id: Uuid) -> AppResult<RestockRequest> {
        let row = sqlx::query_as::<_, RestockRow>(
            r#"
            SELECT id, status, location_id, notes, created_by, created_at, updated_at
            FROM restock_requests
            WHERE id = $1
            "#,
        )
        .bind(restock_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Restock request".to_string()))?;

        let lines = sqlx::query_as::<_, RestockLineRow>(
            r#"
            SELECT id, restock_id, sku_id, requested_qty, received_qty
            FROM restock_lines
            WHERE restock_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(restock_id)
        .fetch_all(&self.db)
        .await?;

        row.assemble(lines)
    }

    /// List restock requests, optionally by status
    pub async fn list(&self, status: Option<RestockStatus>) -> AppResult<Vec<RestockRequest>> {
        let rows = sqlx::query_as::<_, RestockRow>(
            r#"
            SELECT id, status, location_id, notes, created_by, created_at, updated_at
            FROM restock_requests
            WHERE ($1::varchar IS NULL OR status = $1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let line_rows = sqlx::query_as::<_, RestockLineRow>(
            r#"
            SELECT id, restock_id, sku_id, requested_qty, received_qty
            FROM restock_lines
            WHERE restock_id = ANY($1)
            ORDER BY created_at
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        let mut lines_by_restock: HashMap<Uuid, Vec<RestockLineRow>> = HashMap::new();
        for line in line_rows {
            lines_by_restock
                .entry(line.restock_id)
                .or_default()
                .push(line);
        }

        rows.into_iter()
            .map(|row| {
                let lines = lines_by_restock.remove(&row.id).unwrap_or_default();
                row.assemble(lines)
            })
            .collect()
    }

    /// Run a status transition; only ORDERED -> RECEIVED touches the ledger
    pub async fn transition(
        &self,
        actor_id: Uuid,
        restock_id: Uuid,
        input: RestockTransitionInput,
    ) -> AppResult<TransitionOutcome<RestockRequest>> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, RestockRow>(
            r#"
            SELECT id, status, location_id, notes, created_by, created_at, updated_at
            FROM restock_requests
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(restock_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Restock request".to_string()))?;

        let current = row.status()?;
        validate_transition(current, input.target_status)?;

        let warnings = if input.target_status == RestockStatus::Received {
            let line_rows = sqlx::query_as::<_, RestockLineRow>(
                r#"
                SELECT id, restock_id, sku_id, requested_qty, received_qty
                FROM restock_lines
                WHERE restock_id = $1
                ORDER BY created_at
                "#,
            )
            .bind(restock_id)
            .fetch_all(&mut *tx)
            .await?;

            let updates = self.received_quantities(
                input.lines.as_deref().unwrap_or(&[]),
                &line_rows,
            )?;

            let mut received = Vec::with_capacity(line_rows.len());
            for line in &line_rows {
                let qty = updates.get(&line.id).copied().unwrap_or(0);
                sqlx::query("UPDATE restock_lines SET received_qty = $1 WHERE id = $2")
                    .bind(qty)
                    .bind(line.id)
                    .execute(&mut *tx)
                    .await?;
                received.push((line.sku_id, qty));
            }

            let plan = plan_restock_receipt_effects(row.location_id, &received);
            effects::apply_planned_changes(
                &mut tx,
                &self.ledger,
                WorkflowKind::Restock,
                restock_id,
                actor_id,
                &plan,
            )
            .await?
        } else {
            // Approval, ordering, and cancellation are status-only; nothing
            // has reached the ledger before RECEIVED
            Vec::new()
        };

        sqlx::query("UPDATE restock_requests SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(input.target_status.as_str())
            .bind(restock_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let instance = self.get(restock_id).await?;
        Ok(TransitionOutcome { instance, warnings })
    }

    /// Delete a restock request still in its initial state
    pub async fn delete(&self, restock_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM restock_requests WHERE id = $1 FOR UPDATE",
        )
        .bind(restock_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Restock request".to_string()))?;

        if RestockStatus::from_str(&status) != Some(RestockStatus::initial()) {
            return Err(AppError::ValidationError(
                "Only draft restock requests can be deleted".to_string(),
            ));
        }

        sqlx::query("DELETE FROM restock_requests WHERE id = $1")
            .bind(restock_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Received quantities are keyed in by the operator at receipt time;
    /// at least one line must actually receive something
    fn received_quantities(
        &self,
        inputs: &[LineQtyInput],
        line_rows: &[RestockLineRow],
    ) -> AppResult<HashMap<Uuid, i64>> {
        let updates = collect_line_updates(inputs)?;

        for line_id in updates.keys() {
            if !line_rows.iter().any(|line| line.id == *line_id) {
                return Err(AppError::Validation {
                    field: "lines".to_string(),
                    message: format!("Unknown line item {}", line_id),
                });
            }
        }

        let mut any_received = false;
        for line in line_rows {
            let qty = updates.get(&line.id).copied().unwrap_or(0);
            validate_non_negative_qty(qty).map_err(|msg| AppError::Validation {
                field: "quantity".to_string(),
                message: msg.to_string(),
            })?;
            any_received |= qty > 0;
        }

        if !any_received {
            return Err(AppError::Validation {
                field: "lines".to_string(),
                message: "At least one received quantity must be positive".to_string(),
            });
        }

        Ok(updates)
    }
}
