//! Shipment request service: outbound shipments, returns, and transfers
//!
//! Shipping debits the origin location; receiving credits the destination.
//! Cancellation reverses whatever the instance already applied to the
//! ledger, read back from the applied-effect record.

use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

use shared::{
    plan_receive_effects, plan_ship_effects, validate_line_items, validate_non_negative_qty,
    validate_positive_qty, validate_received_within_shipped, validate_transition, ShipmentKind,
    ShipmentLine, ShipmentRequest, ShipmentStatus, WorkflowKind, WorkflowState,
};

use crate::error::{AppError, AppResult};
use crate::services::{
    collect_line_updates, effects, ledger::StockLedgerService, map_reference_error, LineQtyInput,
    TransitionOutcome,
};

/// Shipment request service
#[derive(Clone)]
pub struct ShipmentService {
    db: PgPool,
    ledger: StockLedgerService,
}

/// Input for creating a shipment request
#[derive(Debug, Deserialize)]
pub struct CreateShipmentInput {
    pub kind: ShipmentKind,
    pub origin_location_id: Uuid,
    pub destination_location_id: Uuid,
    pub notes: Option<String>,
    pub lines: Vec<CreateShipmentLineInput>,
}

/// One requested SKU on a new shipment request
#[derive(Debug, Deserialize)]
pub struct CreateShipmentLineInput {
    pub sku_id: Uuid,
    pub requested_qty: i64,
}

/// Input for a shipment status transition
#[derive(Debug, Deserialize)]
pub struct ShipmentTransitionInput {
    pub target_status: ShipmentStatus,
    /// Shipped quantities (for SHIPPED) or received quantities (for RECEIVED)
    pub lines: Option<Vec<LineQtyInput>>,
}

/// Row for shipment header queries
#[derive(Debug, FromRow)]
struct ShipmentRow {
    id: Uuid,
    kind: String,
    status: String,
    origin_location_id: Uuid,
    destination_location_id: Uuid,
    notes: Option<String>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Row for shipment line queries
#[derive(Debug, FromRow)]
struct ShipmentLineRow {
    id: Uuid,
    shipment_id: Uuid,
    sku_id: Uuid,
    requested_qty: i64,
    shipped_qty: Option<i64>,
    received_qty: Option<i64>,
}

impl ShipmentRow {
    fn kind(&self) -> AppResult<ShipmentKind> {
        ShipmentKind::from_str(&self.kind)
            .ok_or_else(|| AppError::Internal(format!("Unknown shipment kind: {}", self.kind)))
    }

    fn status(&self) -> AppResult<ShipmentStatus> {
        ShipmentStatus::from_str(&self.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown shipment status: {}", self.status)))
    }

    fn assemble(self, lines: Vec<ShipmentLineRow>) -> AppResult<ShipmentRequest> {
        let kind = self.kind()?;
        let status = self.status()?;
        Ok(ShipmentRequest {
            id: self.id,
            kind,
            status,
            origin_location_id: self.origin_location_id,
            destination_location_id: self.destination_location_id,
            notes: self.notes,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
            lines: lines
                .into_iter()
                .map(|line| ShipmentLine {
                    id: line.id,
                    sku_id: line.sku_id,
                    requested_qty: line.requested_qty,
                    shipped_qty: line.shipped_qty,
                    received_qty: line.received_qty,
                })
                .collect(),
        })
    }
}

impl ShipmentService {
    /// Create a new ShipmentService instance
    pub fn new(db: PgPool, lock_timeout_ms: u64) -> Self {
        let ledger = StockLedgerService::new(db.clone(), lock_timeout_ms);
        Self { db, ledger }
    }

    /// Create a shipment request in PENDING; no ledger effects yet
    pub async fn create(
        &self,
        actor_id: Uuid,
        input: CreateShipmentInput,
    ) -> AppResult<ShipmentRequest> {
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
        if input.origin_location_id == input.destination_location_id {
            return Err(AppError::Validation {
                field: "destination_location_id".to_string(),
                message: "Origin and destination locations must differ".to_string(),
            });
        }

        let mut tx = self.db.begin().await?;

        let shipment_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO shipment_requests
                (kind, status, origin_location_id, destination_location_id, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(input.kind.as_str())
        .bind(ShipmentStatus::initial().as_str())
        .bind(input.origin_location_id)
        .bind(input.destination_location_id)
        .bind(&input.notes)
        .bind(actor_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_reference_error)?;

        for line in &input.lines {
            sqlx::query(
                r#"
                INSERT INTO shipment_lines (shipment_id, sku_id, requested_qty)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(shipment_id)
            .bind(line.sku_id)
            .bind(line.requested_qty)
            .execute(&mut *tx)
            .await
            .map_err(map_reference_error)?;
        }

        tx.commit().await?;

        self.get(shipment_id).await
    }

    /// Get a shipment request with its lines
    pub async fn get(&self, shipment_id: Uuid) -> AppResult<ShipmentRequest> {
        let row = sqlx::query_as::<_, ShipmentRow>(
            r#"
            SELECT id, kind, status, origin_location_id, destination_location_id,
                   notes, created_by, created_at, updated_at
            FROM shipment_requests
            WHERE id = $1
            "#,
        )
        .bind(shipment_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Shipment request".to_string()))?;

        let lines = sqlx::query_as::<_, ShipmentLineRow>(
            r#"
            SELECT id, shipment_id, sku_id, requested_qty, shipped_qty, received_qty
            FROM shipment_lines
            WHERE shipment_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(shipment_id)
        .fetch_all(&self.db)
        .await?;

        row.assemble(lines)
    }

    /// List shipment requests, optionally by status
    pub async fn list(&self, status: Option<ShipmentStatus>) -> AppResult<Vec<ShipmentRequest>> {
        let rows = sqlx::query_as::<_, ShipmentRow>(
            r#"
            SELECT id, kind, status, origin_location_id, destination_location_id,
                   notes, created_by, created_at, updated_at
            FROM shipment_requests
            WHERE ($1::varchar IS NULL OR status = $1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let line_rows = sqlx::query_as::<_, ShipmentLineRow>(
            r#"
            SELECT id, shipment_id, sku_id, requested_qty, shipped_qty, received_qty
            FROM shipment_lines
            WHERE shipment_id = ANY($1)
            ORDER BY created_at
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        let mut lines_by_shipment: HashMap<Uuid, Vec<ShipmentLineRow>> = HashMap::new();
        for line in line_rows {
            lines_by_shipment
                .entry(line.shipment_id)
                .or_default()
                .push(line);
        }

        rows.into_iter()
            .map(|row| {
                let lines = lines_by_shipment.remove(&row.id).unwrap_or_default();
                row.assemble(lines)
            })
            .collect()
    }

    /// Run a status transition; the status write and all ledger calls are
    /// one atomic unit
    pub async fn transition(
        &self,
        actor_id: Uuid,
        shipment_id: Uuid,
        input: ShipmentTransitionInput,
    ) -> AppResult<TransitionOutcome<ShipmentRequest>> {
        let mut tx = self.db.begin().await?;

        // Pin the header row so concurrent transitions of the same
        // instance serialize
        let row = sqlx::query_as::<_, ShipmentRow>(
            r#"
            SELECT id, kind, status, origin_location_id, destination_location_id,
                   notes, created_by, created_at, updated_at
            FROM shipment_requests
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(shipment_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Shipment request".to_string()))?;

        let current = row.status()?;
        let kind = row.kind()?;
        validate_transition(current, input.target_status)?;

        let line_rows = sqlx::query_as::<_, ShipmentLineRow>(
            r#"
            SELECT id, shipment_id, sku_id, requested_qty, shipped_qty, received_qty
            FROM shipment_lines
            WHERE shipment_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(shipment_id)
        .fetch_all(&mut *tx)
        .await?;

        let warnings = match input.target_status {
            ShipmentStatus::Shipped => {
                let updates = self
                    .shipped_quantities(input.lines.as_deref().unwrap_or(&[]), &line_rows)?;

                let mut shipped = Vec::with_capacity(line_rows.len());
                for line in &line_rows {
                    let qty = updates[&line.id];
                    sqlx::query("UPDATE shipment_lines SET shipped_qty = $1 WHERE id = $2")
                        .bind(qty)
                        .bind(line.id)
                        .execute(&mut *tx)
                        .await?;
                    shipped.push((line.sku_id, qty));
                }

                let plan = plan_ship_effects(kind, row.origin_location_id, &shipped);
                effects::apply_planned_changes(
                    &mut tx,
                    &self.ledger,
                    WorkflowKind::Shipment,
                    shipment_id,
                    actor_id,
                    &plan,
                )
                .await?
            }
            ShipmentStatus::Received => {
                let updates = self
                    .received_quantities(input.lines.as_deref().unwrap_or(&[]), &line_rows)?;

                let mut received = Vec::with_capacity(line_rows.len());
                for line in &line_rows {
                    let qty = updates.get(&line.id).copied().unwrap_or(0);
                    sqlx::query("UPDATE shipment_lines SET received_qty = $1 WHERE id = $2")
                        .bind(qty)
                        .bind(line.id)
                        .execute(&mut *tx)
                        .await?;
                    received.push((line.sku_id, qty));
                }

                let plan = plan_receive_effects(kind, row.destination_location_id, &received);
                effects::apply_planned_changes(
                    &mut tx,
                    &self.ledger,
                    WorkflowKind::Shipment,
                    shipment_id,
                    actor_id,
                    &plan,
                )
                .await?
            }
            ShipmentStatus::Cancelled => {
                effects::reverse_effects(
                    &mut tx,
                    &self.ledger,
                    WorkflowKind::Shipment,
                    shipment_id,
                    actor_id,
                )
                .await?
            }
            // The transition table has no edge into PENDING, so
            // validate_transition has already rejected this
            ShipmentStatus::Pending => Vec::new(),
        };

        sqlx::query("UPDATE shipment_requests SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(input.target_status.as_str())
            .bind(shipment_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let instance = self.get(shipment_id).await?;
        Ok(TransitionOutcome { instance, warnings })
    }

    /// Delete a shipment request still in its initial state
    pub async fn delete(&self, shipment_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM shipment_requests WHERE id = $1 FOR UPDATE",
        )
        .bind(shipment_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Shipment request".to_string()))?;

        if ShipmentStatus::from_str(&status) != Some(ShipmentStatus::initial()) {
            return Err(AppError::ValidationError(
                "Only pending shipment requests can be deleted".to_string(),
            ));
        }

        sqlx::query("DELETE FROM shipment_requests WHERE id = $1")
            .bind(shipment_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Shipped quantities must cover every line with a positive value
    fn shipped_quantities(
        &self,
        inputs: &[LineQtyInput],
        line_rows: &[ShipmentLineRow],
    ) -> AppResult<HashMap<Uuid, i64>> {
        let updates = collect_line_updates(inputs)?;

        for line in line_rows {
            let qty = updates.get(&line.id).copied().ok_or_else(|| {
                AppError::Validation {
                    field: "lines".to_string(),
                    message: format!("Missing shipped quantity for line item {}", line.id),
                }
            })?;
            validate_positive_qty(qty).map_err(|msg| AppError::Validation {
                field: "quantity".to_string(),
                message: msg.to_string(),
            })?;
        }
        self.reject_unknown_lines(&updates, line_rows)?;

        Ok(updates)
    }

    /// Received quantities are optional per line but bounded by what shipped
    fn received_quantities(
        &self,
        inputs: &[LineQtyInput],
        line_rows: &[ShipmentLineRow],
    ) -> AppResult<HashMap<Uuid, i64>> {
        let updates = collect_line_updates(inputs)?;
        self.reject_unknown_lines(&updates, line_rows)?;

        let mut any_received = false;
        for line in line_rows {
            let qty = updates.get(&line.id).copied().unwrap_or(0);
            validate_non_negative_qty(qty).map_err(|msg| AppError::Validation {
                field: "quantity".to_string(),
                message: msg.to_string(),
            })?;
            validate_received_within_shipped(qty, line.shipped_qty.unwrap_or(0)).map_err(
                |msg| AppError::Validation {
                    field: "quantity".to_string(),
                    message: msg.to_string(),
                },
            )?;
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

    fn reject_unknown_lines(
        &self,
        updates: &HashMap<Uuid, i64>,
        line_rows: &[ShipmentLineRow],
    ) -> AppResult<()> {
        for line_id in updates.keys() {
            if !line_rows.iter().any(|line| line.id == *line_id) {
                return Err(AppError::Validation {
                    field: "lines".to_string(),
                    message: format!("Unknown line item {}", line_id),
                });
            }
        }
        Ok(())
    }
}
