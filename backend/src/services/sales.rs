//! Sales order service: point-of-sale orders and their stock deductions
//!
//! Completion converts the order into immutable sale records and debits the
//! selling location by each line's quantity. Orders cancelled before
//! completion never touched the ledger, so cancellation is status-only.

use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

use shared::{
    plan_sale_effects, validate_line_items, validate_positive_qty, validate_transition,
    SaleRecord, SalesOrder, SalesOrderLine, SalesOrderStatus, WorkflowKind, WorkflowState,
};

use crate::error::{AppError, AppResult};
use crate::services::{
    effects, ledger::StockLedgerService, map_reference_error, TransitionOutcome,
};

/// Sales order service
#[derive(Clone)]
pub struct SalesOrderService {
    db: PgPool,
    ledger: StockLedgerService,
}

/// Input for creating a sales order
#[derive(Debug, Deserialize)]
pub struct CreateSalesOrderInput {
    pub location_id: Uuid,
    pub customer_name: Option<String>,
    pub currency: Option<String>,
    pub notes: Option<String>,
    pub lines: Vec<CreateSalesOrderLineInput>,
}

/// One SKU on a new sales order
#[derive(Debug, Deserialize)]
pub struct CreateSalesOrderLineInput {
    pub sku_id: Uuid,
    pub quantity: i64,
    pub unit_price: Option<Decimal>,
}

/// Input for a sales order status transition
#[derive(Debug, Deserialize)]
pub struct SalesOrderTransitionInput {
    pub target_status: SalesOrderStatus,
}

/// Row for sales order header queries
#[derive(Debug, FromRow)]
struct SalesOrderRow {
    id: Uuid,
    status: String,
    location_id: Uuid,
    customer_name: Option<String>,
    currency: String,
    notes: Option<String>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Row for sales order line queries
#[derive(Debug, FromRow)]
struct SalesOrderLineRow {
    id: Uuid,
    sales_order_id: Uuid,
    sku_id: Uuid,
    quantity: i64,
    unit_price: Option<Decimal>,
}

/// Row for sale record queries
#[derive(Debug, FromRow)]
struct SaleRecordRow {
    id: Uuid,
    sales_order_id: Uuid,
    location_id: Uuid,
    sku_id: Uuid,
    quantity: i64,
    unit_price: Option<Decimal>,
    total_price: Option<Decimal>,
    actor_id: Uuid,
    sold_at: DateTime<Utc>,
}

impl From<SaleRecordRow> for SaleRecord {
    fn from(row: SaleRecordRow) -> Self {
        SaleRecord {
            id: row.id,
            sales_order_id: row.sales_order_id,
            location_id: row.location_id,
            sku_id: row.sku_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
            total_price: row.total_price,
            actor_id: row.actor_id,
            sold_at: row.sold_at,
        }
    }
}

impl SalesOrderRow {
    fn status(&self) -> AppResult<SalesOrderStatus> {
        SalesOrderStatus::from_str(&self.status).ok_or_else(|| {
            AppError::Internal(format!("Unknown sales order status: {}", self.status))
        })
    }

    fn assemble(self, lines: Vec<SalesOrderLineRow>) -> AppResult<SalesOrder> {
        let status = self.status()?;
        Ok(SalesOrder {
            id: self.id,
            status,
            location_id: self.location_id,
            customer_name: self.customer_name,
            currency: self.currency,
            notes: self.notes,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
            lines: lines
                .into_iter()
                .map(|line| SalesOrderLine {
                    id: line.id,
                    sku_id: line.sku_id,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                })
                .collect(),
        })
    }
}

impl SalesOrderService {
    /// Create a new SalesOrderService instance
    pub fn new(db: PgPool, lock_timeout_ms: u64) -> Self {
        let ledger = StockLedgerService::new(db.clone(), lock_timeout_ms);
        Self { db, ledger }
    }

    /// Create a sales order in PENDING; no ledger effects yet
    pub async fn create(
        &self,
        actor_id: Uuid,
        input: CreateSalesOrderInput,
    ) -> AppResult<SalesOrder> {
        validate_line_items(&input.lines).map_err(|msg| AppError::Validation {
            field: "lines".to_string(),
            message: msg.to_string(),
        })?;
        for line in &input.lines {
            validate_positive_qty(line.quantity).map_err(|msg| AppError::Validation {
                field: "quantity".to_string(),
                message: msg.to_string(),
            })?;
        }

        let currency = input.currency.unwrap_or_else(|| "USD".to_string());

        let mut tx = self.db.begin().await?;

        let order_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO sales_orders (status, location_id, customer_name, currency, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(SalesOrderStatus::initial().as_str())
        .bind(input.location_id)
        .bind(&input.customer_name)
        .bind(&currency)
        .bind(&input.notes)
        .bind(actor_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_reference_error)?;

        for line in &input.lines {
            sqlx::query(
                r#"
                INSERT INTO sales_order_lines (sales_order_id, sku_id, quantity, unit_price)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(order_id)
            .bind(line.sku_id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .execute(&mut *tx)
            .await
            .map_err(map_reference_error)?;
        }

        tx.commit().await?;

        self.get(order_id).await
    }

    /// Get a sales order with its lines
    pub async fn get(&self, order_id: Uuid) -> AppResult<SalesOrder> {
        let row = sqlx::query_as::<_, SalesOrderRow>(
            r#"
            SELECT id, status, location_id, customer_name, currency, notes,
                   created_by, created_at, updated_at
            FROM sales_orders
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Sales order".to_string()))?;

        let lines = sqlx::query_as::<_, SalesOrderLineRow>(
            r#"
            SELECT id, sales_order_id, sku_id, quantity, unit_price
            FROM sales_order_lines
            WHERE sales_order_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;

        row.assemble(lines)
    }

    /// List sales orders, optionally by status
    pub async fn list(&self, status: Option<SalesOrderStatus>) -> AppResult<Vec<SalesOrder>> {
        let rows = sqlx::query_as::<_, SalesOrderRow>(
            r#"
            SELECT id, status, location_id, customer_name, currency, notes,
                   created_by, created_at, updated_at
            FROM sales_orders
            WHERE ($1::varchar IS NULL OR status = $1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let line_rows = sqlx::query_as::<_, SalesOrderLineRow>(
            r#"
            SELECT id, sales_order_id, sku_id, quantity, unit_price
            FROM sales_order_lines
            WHERE sales_order_id = ANY($1)
            ORDER BY created_at
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        let mut lines_by_order: HashMap<Uuid, Vec<SalesOrderLineRow>> = HashMap::new();
        for line in line_rows {
            lines_by_order
                .entry(line.sales_order_id)
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

    /// Sale records materialized by a completed order
    pub async fn sale_records(&self, order_id: Uuid) -> AppResult<Vec<SaleRecord>> {
        let rows = sqlx::query_as::<_, SaleRecordRow>(
            r#"
            SELECT id, sales_order_id, location_id, sku_id, quantity, unit_price,
                   total_price, actor_id, sold_at
            FROM sale_records
            WHERE sales_order_id = $1
            ORDER BY sold_at
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Run a status transition; only PROCESSING -> COMPLETED touches the
    /// ledger
    pub async fn transition(
        &self,
        actor_id: Uuid,
        order_id: Uuid,
        input: SalesOrderTransitionInput,
    ) -> AppResult<TransitionOutcome<SalesOrder>> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, SalesOrderRow>(
            r#"
            SELECT id, status, location_id, customer_name, currency, notes,
                   created_by, created_at, updated_at
            FROM sales_orders
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Sales order".to_string()))?;

        let current = row.status()?;
        validate_transition(current, input.target_status)?;

        let warnings = if input.target_status == SalesOrderStatus::Completed {
            self.complete(&mut tx, &row, actor_id).await?
        } else {
            // Confirmation, processing, and cancellation are status-only;
            // no stock was ever removed before COMPLETED
            Vec::new()
        };

        sqlx::query("UPDATE sales_orders SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(input.target_status.as_str())
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let instance = self.get(order_id).await?;
        Ok(TransitionOutcome { instance, warnings })
    }

    /// Delete a sales order still in its initial state
    pub async fn delete(&self, order_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM sales_orders WHERE id = $1 FOR UPDATE",
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Sales order".to_string()))?;

        if SalesOrderStatus::from_str(&status) != Some(SalesOrderStatus::initial()) {
            return Err(AppError::ValidationError(
                "Only pending sales orders can be deleted".to_string(),
            ));
        }

        sqlx::query("DELETE FROM sales_orders WHERE id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Materialize sale records and debit the selling location
    async fn complete(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        row: &SalesOrderRow,
        actor_id: Uuid,
    ) -> AppResult<Vec<String>> {
        let line_rows = sqlx::query_as::<_, SalesOrderLineRow>(
            r#"
            SELECT id, sales_order_id, sku_id, quantity, unit_price
            FROM sales_order_lines
            WHERE sales_order_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(row.id)
        .fetch_all(&mut **tx)
        .await?;

        for line in &line_rows {
            let total_price = line.unit_price.map(|price| price * Decimal::from(line.quantity));
            sqlx::query(
                r#"
                INSERT INTO sale_records
                    (sales_order_id, location_id, sku_id, quantity, unit_price, total_price, actor_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(row.id)
            .bind(row.location_id)
            .bind(line.sku_id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(total_price)
            .bind(actor_id)
            .execute(&mut **tx)
            .await?;
        }

        let sold: Vec<(Uuid, i64)> = line_rows
            .iter()
            .map(|line| (line.sku_id, line.quantity))
            .collect();
        let plan = plan_sale_effects(row.location_id, &sold);

        effects::apply_planned_changes(
            tx,
            &self.ledger,
            WorkflowKind::SalesOrder,
            row.id,
            actor_id,
            &plan,
        )
        .await
    }
}
