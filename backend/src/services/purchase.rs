//! Purchase order service: supplier orders with partial receipts
//!
//! Receiving is partial-capable. Each receipt call increments the per-line
//! received quantity, credits the destination by the delivered delta, and
//! only advances the order to RECEIVED once every line has reached its
//! ordered quantity.

use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

use shared::{
    is_fully_received, plan_purchase_receipt_effects, receipt_increment, validate_line_items,
    validate_positive_qty, validate_transition, PurchaseOrder, PurchaseOrderLine,
    PurchaseOrderStatus, WorkflowKind, WorkflowState,
};

use crate::error::{AppError, AppResult};
use crate::services::{
    collect_line_updates, effects, ledger::StockLedgerService, map_reference_error, LineQtyInput,
    TransitionOutcome,
};

/// Purchase order service
#[derive(Clone)]
pub struct PurchaseOrderService {
    db: PgPool,
    ledger: StockLedgerService,
}

/// Input for creating a purchase order
#[derive(Debug, Deserialize)]
pub struct CreatePurchaseOrderInput {
    pub destination_location_id: Uuid,
    pub supplier_name: Option<String>,
    pub currency: Option<String>,
    pub notes: Option<String>,
    pub lines: Vec<CreatePurchaseOrderLineInput>,
}

/// One ordered SKU on a new purchase order
#[derive(Debug, Deserialize)]
pub struct CreatePurchaseOrderLineInput {
    pub sku_id: Uuid,
    pub order_qty: i64,
    pub unit_price: Option<Decimal>,
}

/// Input for a purchase order status transition
#[derive(Debug, Deserialize)]
pub struct PurchaseOrderTransitionInput {
    pub target_status: PurchaseOrderStatus,
}

/// Input for a (partial) receipt against a shipped purchase order
#[derive(Debug, Deserialize)]
pub struct ReceivePurchaseOrderInput {
    /// Delivered deltas per line; cumulative receipts may not exceed the
    /// ordered quantity
    pub lines: Vec<LineQtyInput>,
}

/// Row for purchase order header queries
#[derive(Debug, FromRow)]
struct PurchaseOrderRow {
    id: Uuid,
    status: String,
    destination_location_id: Uuid,
    supplier_name: Option<String>,
    currency: String,
    notes: Option<String>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Row for purchase order line queries
#[derive(Debug, FromRow)]
struct PurchaseOrderLineRow {
    id: Uuid,
    purchase_order_id: Uuid,
    sku_id: Uuid,
    order_qty: i64,
    received_qty: i64,
    unit_price: Option<Decimal>,
}

impl PurchaseOrderRow {
    fn status(&self) -> AppResult<PurchaseOrderStatus> {
        PurchaseOrderStatus::from_str(&self.status).ok_or_else(|| {
            AppError::Internal(format!("Unknown purchase order status: {}", self.status))
        })
    }

    fn assemble(self, lines: Vec<PurchaseOrderLineRow>) -> AppResult<PurchaseOrder> {
        let status = self.status()?;
        Ok(PurchaseOrder {
            id: self.id,
            status,
            destination_location_id: self.destination_location_id,
            supplier_name: self.supplier_name,
            currency: self.currency,
            notes: self.notes,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
            lines: lines
                .into_iter()
                .map(|line| PurchaseOrderLine {
                    id: line.id,
                    sku_id: line.sku_id,
                    order_qty: line.order_qty,
                    received_qty: line.received_qty,
                    unit_price: line.unit_price,
                })
                .collect(),
        })
    }
}

impl PurchaseOrderService {
    /// Create a new PurchaseOrderService instance
    pub fn new(db: PgPool, lock_timeout_ms: u64) -> Self {
        let ledger = StockLedgerService::new(db.clone(), lock_timeout_ms);
        Self { db, ledger }
    }

    /// Create a purchase order in DRAFT; no ledger effects yet
    pub async fn create(
        &self,
        actor_id: Uuid,
        input: CreatePurchaseOrderInput,
    ) -> AppResult<PurchaseOrder> {
        validate_line_items(&input.lines).map_err(|msg| AppError::Validation {
            field: "lines".to_string(),
            message: msg.to_string(),
        })?;
        for line in &input.lines {
            validate_positive_qty(line.order_qty).map_err(|msg| AppError::Validation {
                field: "order_qty".to_string(),
                message: msg.to_string(),
            })?;
        }

        let currency = input.currency.unwrap_or_else(|| "USD".to_string());

        let mut tx = self.db.begin().await?;

        let order_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO purchase_orders
                (status, destination_location_id, supplier_name, currency, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(PurchaseOrderStatus::initial().as_str())
        .bind(input.destination_location_id)
        .bind(&input.supplier_name)
        .bind(&currency)
        .bind(&input.notes)
        .bind(actor_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_reference_error)?;

        for line in &input.lines {
            sqlx::query(
                r#"
                INSERT INTO purchase_order_lines (purchase_order_id, sku_id, order_qty, unit_price)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(order_id)
            .bind(line.sku_id)
            .bind(line.order_qty)
            .bind(line.unit_price)
            .execute(&mut *tx)
            .await
            .map_err(map_reference_error)?;
        }

        tx.commit().await?;

        self.get(order_id).await
    }

    /// Get a purchase order with its lines
    pub async fn get(&self, order_id: Uuid) -> AppResult<PurchaseOrder> {
        let row = sqlx::query_as::<_, PurchaseOrderRow>(
            r#"
            SELECT id, status, destination_location_id, supplier_name, currency,
                   notes, created_by, created_at, updated_at
            FROM purchase_orders
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Purchase order".to_string()))?;

        let lines = self.lines(order_id).await?;
        row.assemble(lines)
    }

    /// List purchase orders, optionally by status
    pub async fn list(
        &self,
        status: Option<PurchaseOrderStatus>,
    ) -> AppResult<Vec<PurchaseOrder>> {
        let rows = sqlx::query_as::<_, PurchaseOrderRow>(
            r#"
            SELECT id, status, destination_location_id, supplier_name, currency,
                   notes, created_by, created_at, updated_at
            FROM purchase_orders
            WHERE ($1::varchar IS NULL OR status = $1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let line_rows = sqlx::query_as::<_, PurchaseOrderLineRow>(
            r#"
            SELECT id, purchase_order_id, sku_id, order_qty, received_qty, unit_price
            FROM purchase_order_lines
            WHERE purchase_order_id = ANY($1)
            ORDER BY created_at
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        let mut lines_by_order: HashMap<Uuid, Vec<PurchaseOrderLineRow>> = HashMap::new();
        for line in line_rows {
            lines_by_order
                .entry(line.purchase_order_id)
                .or_default()
                .push(line);
        }

        rows.into_iter()
            .map(|row| {
                let lines = lines_by_order.remove(&row.id).unwrap_or_default();
                row.assemble(lines)
            })
            .collect()
    }

    /// Run a status transition.
    ///
    /// RECEIVED is never a valid direct target: it is reached automatically
    /// once receipts cover every line (see [`Self::receive`]). Cancelling a
    /// partially received order keeps the already-credited stock; the goods
    /// did physically arrive.
    pub async fn transition(
        &self,
        _actor_id: Uuid,
        order_id: Uuid,
        input: PurchaseOrderTransitionInput,
    ) -> AppResult<TransitionOutcome<PurchaseOrder>> {
        if input.target_status == PurchaseOrderStatus::Received {
            return Err(AppError::InvalidStateTransition(
                "Purchase orders reach RECEIVED through receipts, not a direct transition"
                    .to_string(),
            ));
        }

        let mut tx = self.db.begin().await?;

        let row = self.lock_header(&mut tx, order_id).await?;
        let current = row.status()?;
        validate_transition(current, input.target_status)?;

        sqlx::query("UPDATE purchase_orders SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(input.target_status.as_str())
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let instance = self.get(order_id).await?;
        Ok(TransitionOutcome {
            instance,
            warnings: Vec::new(),
        })
    }

    /// Record a (partial) receipt against a SHIPPED order.
    ///
    /// Credits the destination by each delivered delta and auto-advances the
    /// order to RECEIVED once every line has `received_qty >= order_qty`.
    pub async fn receive(
        &self,
        actor_id: Uuid,
        order_id: Uuid,
        input: ReceivePurchaseOrderInput,
    ) -> AppResult<TransitionOutcome<PurchaseOrder>> {
        if input.lines.is_empty() {
            return Err(AppError::Validation {
                field: "lines".to_string(),
                message: "At least one receipt line is required".to_string(),
            });
        }

        let mut tx = self.db.begin().await?;

        let row = self.lock_header(&mut tx, order_id).await?;
        let current = row.status()?;
        if current != PurchaseOrderStatus::Shipped {
            return Err(AppError::InvalidStateTransition(format!(
                "Purchase order must be shipped before receiving; current status is {}",
                current.as_str()
            )));
        }

        let line_rows = sqlx::query_as::<_, PurchaseOrderLineRow>(
            r#"
            SELECT id, purchase_order_id, sku_id, order_qty, received_qty, unit_price
            FROM purchase_order_lines
            WHERE purchase_order_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *tx)
        .await?;

        let updates = collect_line_updates(&input.lines)?;

        // Validate every delta against its line's cumulative bound before
        // touching anything
        let mut progress: Vec<(i64, i64)> = Vec::with_capacity(line_rows.len());
        let mut deltas: Vec<(Uuid, i64)> = Vec::new();
        for line in &line_rows {
            match updates.get(&line.id).copied() {
                Some(delta) => {
                    let new_received = receipt_increment(line.order_qty, line.received_qty, delta)
                        .map_err(|msg| AppError::Validation {
                            field: "quantity".to_string(),
                            message: msg.to_string(),
                        })?;
                    progress.push((line.order_qty, new_received));
                    deltas.push((line.sku_id, delta));
                }
                None => progress.push((line.order_qty, line.received_qty)),
            }
        }
        for line_id in updates.keys() {
            if !line_rows.iter().any(|line| line.id == *line_id) {
                return Err(AppError::Validation {
                    field: "lines".to_string(),
                    message: format!("Unknown line item {}", line_id),
                });
            }
        }

        for line in &line_rows {
            if let Some(delta) = updates.get(&line.id).copied() {
                sqlx::query(
                    "UPDATE purchase_order_lines SET received_qty = received_qty + $1 WHERE id = $2",
                )
                .bind(delta)
                .bind(line.id)
                .execute(&mut *tx)
                .await?;
            }
        }

        let plan = plan_purchase_receipt_effects(row.destination_location_id, &deltas);
        let warnings = effects::apply_planned_changes(
            &mut tx,
            &self.ledger,
            WorkflowKind::PurchaseOrder,
            order_id,
            actor_id,
            &plan,
        )
        .await?;

        // Auto-advance only when every line has reached its ordered quantity
        if is_fully_received(&progress) {
            validate_transition(current, PurchaseOrderStatus::Received)?;
            sqlx::query(
                "UPDATE purchase_orders SET status = $1, updated_at = NOW() WHERE id = $2",
            )
            .bind(PurchaseOrderStatus::Received.as_str())
            .bind(order_id)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query("UPDATE purchase_orders SET updated_at = NOW() WHERE id = $1")
                .bind(order_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        let instance = self.get(order_id).await?;
        Ok(TransitionOutcome { instance, warnings })
    }

    /// Delete a purchase order still in its initial state
    pub async fn delete(&self, order_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM purchase_orders WHERE id = $1 FOR UPDATE",
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Purchase order".to_string()))?;

        if PurchaseOrderStatus::from_str(&status) != Some(PurchaseOrderStatus::initial()) {
            return Err(AppError::ValidationError(
                "Only draft purchase orders can be deleted".to_string(),
            ));
        }

        sqlx::query("DELETE FROM purchase_orders WHERE id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn lock_header(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order_id: Uuid,
    ) -> AppResult<PurchaseOrderRow> {
        sqlx::query_as::<_, PurchaseOrderRow>(
            r#"
            SELECT id, status, destination_location_id, supplier_name, currency,
                   notes, created_by, created_at, updated_at
            FROM purchase_orders
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(order_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Purchase order".to_string()))
    }

    async fn lines(&self, order_id: Uuid) -> AppResult<Vec<PurchaseOrderLineRow>> {
        Ok(sqlx::query_as::<_, PurchaseOrderLineRow>(
            r#"
            SELECT id, purchase_order_id, sku_id, order_qty, received_qty, unit_price
            FROM purchase_order_lines
            WHERE purchase_order_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.db)
        .await?)
    }
}
