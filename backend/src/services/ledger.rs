//! Stock ledger service: the single source of truth for stock positions
//!
//! Every stock mutation in the platform funnels through this service. A
//! mutation updates the `(location, sku)` position and appends exactly one
//! immutable ledger entry whose `qty_after` mirrors the position, keeping
//! `position.quantity == SUM(qty_change)` true at all times.
//!
//! Two entry points with deliberately different clamping behavior:
//! - [`StockLedgerService::apply_change`] (workflow path) never clamps; a
//!   negative result is allowed and reported as a warning.
//! - [`StockLedgerService::adjust`] (operator correction path) clamps the
//!   result at zero and records only the clamped delta.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use shared::{
    clamp_adjustment, LedgerEntry, PaginatedResponse, Pagination, PaginationMeta, StockPosition,
    TxType,
};

use crate::error::{AppError, AppResult};
use crate::services::map_reference_error;

/// Sortable columns for the ledger audit listing; anything else is rejected
/// before it can reach the SQL text.
const SORT_COLUMNS: &[&str] = &["created_at", "qty_change", "qty_after"];

/// Stock ledger service owning position and ledger mutations
#[derive(Clone)]
pub struct StockLedgerService {
    db: PgPool,
    lock_timeout_ms: u64,
}

/// One requested ledger mutation
#[derive(Debug, Clone)]
pub struct StockChange {
    pub location_id: Uuid,
    pub sku_id: Uuid,
    pub delta: i64,
    pub tx_type: TxType,
    pub ref_id: Option<Uuid>,
    pub actor_id: Uuid,
    pub memo: Option<String>,
}

/// Outcome of an applied ledger mutation
#[derive(Debug, Clone)]
pub struct AppliedChange {
    pub entry: LedgerEntry,
    pub quantity_after: i64,
    pub warning: Option<String>,
}

/// Input for a manual stock adjustment
#[derive(Debug, Deserialize)]
pub struct AdjustStockInput {
    pub location_id: Uuid,
    pub sku_id: Uuid,
    pub delta: i64,
    pub memo: Option<String>,
}

/// Response for a manual stock adjustment
#[derive(Debug, serde::Serialize)]
pub struct AdjustmentOutcome {
    pub position: StockPosition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Filters for the ledger audit listing
#[derive(Debug, Default, Deserialize)]
pub struct LedgerEntryFilter {
    pub location_id: Option<Uuid>,
    pub sku_id: Option<Uuid>,
    pub tx_type: Option<TxType>,
    pub ref_id: Option<Uuid>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub order_by: Option<String>,
    pub order: Option<String>,
}

/// Row for ledger entry queries
#[derive(Debug, FromRow)]
struct LedgerEntryRow {
    id: Uuid,
    tx_type: String,
    ref_id: Option<Uuid>,
    location_id: Uuid,
    sku_id: Uuid,
    qty_change: i64,
    qty_after: i64,
    actor_id: Uuid,
    memo: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<LedgerEntryRow> for LedgerEntry {
    type Error = AppError;

    fn try_from(row: LedgerEntryRow) -> Result<Self, Self::Error> {
        let tx_type = TxType::from_str(&row.tx_type)
            .ok_or_else(|| AppError::Internal(format!("Unknown ledger tx_type: {}", row.tx_type)))?;
        Ok(LedgerEntry {
            id: row.id,
            tx_type,
            ref_id: row.ref_id,
            location_id: row.location_id,
            sku_id: row.sku_id,
            qty_change: row.qty_change,
            qty_after: row.qty_after,
            actor_id: row.actor_id,
            memo: row.memo,
            created_at: row.created_at,
        })
    }
}

/// Row for stock position queries
#[derive(Debug, FromRow)]
struct PositionRow {
    location_id: Uuid,
    sku_id: Uuid,
    quantity: i64,
    updated_at: DateTime<Utc>,
}

impl From<PositionRow> for StockPosition {
    fn from(row: PositionRow) -> Self {
        StockPosition {
            location_id: row.location_id,
            sku_id: row.sku_id,
            quantity: row.quantity,
            updated_at: row.updated_at,
        }
    }
}

impl StockLedgerService {
    /// Create a new StockLedgerService instance
    pub fn new(db: PgPool, lock_timeout_ms: u64) -> Self {
        Self {
            db,
            lock_timeout_ms,
        }
    }

    /// Apply a stock change inside the caller's transaction.
    ///
    /// Serializes writers to the same `(location, sku)` key with a
    /// transaction-scoped advisory lock; writers to different keys proceed
    /// concurrently. The result is unclamped: a negative quantity is a
    /// legitimate transient state (oversell) and only produces a warning.
    /// A zero delta is rejected as a validation error.
    pub async fn apply_change(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        change: StockChange,
    ) -> AppResult<AppliedChange> {
        if change.delta == 0 {
            return Err(AppError::Validation {
                field: "delta".to_string(),
                message: "Stock change must be non-zero".to_string(),
            });
        }

        self.acquire_position_lock(tx, change.location_id, change.sku_id)
            .await?;

        let quantity_after = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO stock_positions (location_id, sku_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (location_id, sku_id)
            DO UPDATE SET quantity = stock_positions.quantity + EXCLUDED.quantity,
                          updated_at = NOW()
            RETURNING quantity
            "#,
        )
        .bind(change.location_id)
        .bind(change.sku_id)
        .bind(change.delta)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_reference_error)?;

        let entry = self.append_entry(tx, &change, quantity_after).await?;

        let warning = if quantity_after < 0 {
            let message = format!(
                "Stock for SKU {} at location {} is negative ({}) after {}",
                change.sku_id,
                change.location_id,
                quantity_after,
                change.tx_type.as_str()
            );
            tracing::warn!("{}", message);
            Some(message)
        } else {
            None
        };

        Ok(AppliedChange {
            entry,
            quantity_after,
            warning,
        })
    }

    /// Apply a manual adjustment inside the caller's transaction.
    ///
    /// Unlike [`Self::apply_change`] this takes a row-level lock on the
    /// position itself and clamps the result at zero: the ledger entry
    /// records the clamped delta, and a warning describes what was cut off.
    pub async fn adjust(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        location_id: Uuid,
        sku_id: Uuid,
        delta: i64,
        actor_id: Uuid,
        memo: Option<String>,
    ) -> AppResult<(StockPosition, Option<String>)> {
        if delta == 0 {
            return Err(AppError::Validation {
                field: "delta".to_string(),
                message: "Adjustment must be non-zero".to_string(),
            });
        }

        self.set_lock_timeout(tx).await?;

        // Make sure the position row exists so FOR UPDATE has a row to pin
        sqlx::query(
            r#"
            INSERT INTO stock_positions (location_id, sku_id, quantity)
            VALUES ($1, $2, 0)
            ON CONFLICT (location_id, sku_id) DO NOTHING
            "#,
        )
        .bind(location_id)
        .bind(sku_id)
        .execute(&mut **tx)
        .await
        .map_err(map_reference_error)?;

        let current = sqlx::query_scalar::<_, i64>(
            "SELECT quantity FROM stock_positions WHERE location_id = $1 AND sku_id = $2 FOR UPDATE",
        )
        .bind(location_id)
        .bind(sku_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| self.map_lock_error(e, location_id, sku_id))?;

        let clamp = clamp_adjustment(current, delta);
        if clamp.applied_delta == 0 {
            return Err(AppError::ValidationError(format!(
                "Adjustment of {} on quantity {} would have no effect",
                delta, current
            )));
        }

        let position: StockPosition = sqlx::query_as::<_, PositionRow>(
            r#"
            UPDATE stock_positions
            SET quantity = $1, updated_at = NOW()
            WHERE location_id = $2 AND sku_id = $3
            RETURNING location_id, sku_id, quantity, updated_at
            "#,
        )
        .bind(clamp.quantity_after)
        .bind(location_id)
        .bind(sku_id)
        .fetch_one(&mut **tx)
        .await?
        .into();

        let change = StockChange {
            location_id,
            sku_id,
            delta: clamp.applied_delta,
            tx_type: TxType::Adjustment,
            ref_id: None,
            actor_id,
            memo,
        };
        self.append_entry(tx, &change, clamp.quantity_after).await?;

        let warning = if clamp.clamped {
            let message = format!(
                "Adjustment clamped at zero: requested {}, applied {}",
                delta, clamp.applied_delta
            );
            tracing::warn!(
                "{} (SKU {} at location {})",
                message,
                sku_id,
                location_id
            );
            Some(message)
        } else {
            None
        };

        Ok((position, warning))
    }

    /// Manual adjustment wrapper for the HTTP path; opens its own
    /// transaction around [`Self::adjust`].
    pub async fn record_adjustment(
        &self,
        actor_id: Uuid,
        input: AdjustStockInput,
    ) -> AppResult<AdjustmentOutcome> {
        let mut tx = self.db.begin().await?;
        let (position, warning) = self
            .adjust(
                &mut tx,
                input.location_id,
                input.sku_id,
                input.delta,
                actor_id,
                input.memo,
            )
            .await?;
        tx.commit().await?;

        Ok(AdjustmentOutcome { position, warning })
    }

    /// Get the current position for a `(location, sku)` pair
    pub async fn get_position(
        &self,
        location_id: Uuid,
        sku_id: Uuid,
    ) -> AppResult<StockPosition> {
        let row = sqlx::query_as::<_, PositionRow>(
            r#"
            SELECT location_id, sku_id, quantity, updated_at
            FROM stock_positions
            WHERE location_id = $1 AND sku_id = $2
            "#,
        )
        .bind(location_id)
        .bind(sku_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Stock position".to_string()))?;

        Ok(row.into())
    }

    /// List positions, optionally restricted to one location
    pub async fn list_positions(
        &self,
        location_id: Option<Uuid>,
    ) -> AppResult<Vec<StockPosition>> {
        let rows = sqlx::query_as::<_, PositionRow>(
            r#"
            SELECT location_id, sku_id, quantity, updated_at
            FROM stock_positions
            WHERE ($1::uuid IS NULL OR location_id = $1)
            ORDER BY location_id, sku_id
            "#,
        )
        .bind(location_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Paginated, filtered audit listing of ledger entries
    pub async fn list_entries(
        &self,
        filter: LedgerEntryFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<LedgerEntry>> {
        let pagination = pagination.normalized();

        let order_by = match filter.order_by.as_deref() {
            None => "created_at",
            Some(column) if SORT_COLUMNS.contains(&column) => column,
            Some(column) => {
                return Err(AppError::Validation {
                    field: "order_by".to_string(),
                    message: format!("Unsupported sort column: {}", column),
                })
            }
        };
        let direction = match filter.order.as_deref() {
            None | Some("desc") => "DESC",
            Some("asc") => "ASC",
            Some(other) => {
                return Err(AppError::Validation {
                    field: "order".to_string(),
                    message: format!("Unsupported sort direction: {}", other),
                })
            }
        };

        let tx_type = filter.tx_type.map(|t| t.as_str());

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM stock_ledger
            WHERE ($1::uuid IS NULL OR location_id = $1)
              AND ($2::uuid IS NULL OR sku_id = $2)
              AND ($3::varchar IS NULL OR tx_type = $3)
              AND ($4::uuid IS NULL OR ref_id = $4)
              AND ($5::date IS NULL OR created_at >= $5)
              AND ($6::date IS NULL OR created_at < ($6::date + 1))
            "#,
        )
        .bind(filter.location_id)
        .bind(filter.sku_id)
        .bind(tx_type)
        .bind(filter.ref_id)
        .bind(filter.from_date)
        .bind(filter.to_date)
        .fetch_one(&self.db)
        .await?;

        // order_by/direction are validated against allow-lists above
        let sql = format!(
            r#"
            SELECT id, tx_type, ref_id, location_id, sku_id, qty_change, qty_after,
                   actor_id, memo, created_at
            FROM stock_ledger
            WHERE ($1::uuid IS NULL OR location_id = $1)
              AND ($2::uuid IS NULL OR sku_id = $2)
              AND ($3::varchar IS NULL OR tx_type = $3)
              AND ($4::uuid IS NULL OR ref_id = $4)
              AND ($5::date IS NULL OR created_at >= $5)
              AND ($6::date IS NULL OR created_at < ($6::date + 1))
            ORDER BY {order_by} {direction}, seq {direction}
            LIMIT $7 OFFSET $8
            "#,
        );

        let rows = sqlx::query_as::<_, LedgerEntryRow>(&sql)
            .bind(filter.location_id)
            .bind(filter.sku_id)
            .bind(tx_type)
            .bind(filter.ref_id)
            .bind(filter.from_date)
            .bind(filter.to_date)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.db)
            .await?;

        let entries = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<LedgerEntry>, _>>()?;

        Ok(PaginatedResponse {
            data: entries,
            pagination: PaginationMeta::new(pagination, total as u64),
        })
    }

    /// Append the immutable ledger entry for an applied change
    async fn append_entry(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        change: &StockChange,
        qty_after: i64,
    ) -> AppResult<LedgerEntry> {
        let row = sqlx::query_as::<_, LedgerEntryRow>(
            r#"
            INSERT INTO stock_ledger
                (tx_type, ref_id, location_id, sku_id, qty_change, qty_after, actor_id, memo)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, tx_type, ref_id, location_id, sku_id, qty_change, qty_after,
                      actor_id, memo, created_at
            "#,
        )
        .bind(change.tx_type.as_str())
        .bind(change.ref_id)
        .bind(change.location_id)
        .bind(change.sku_id)
        .bind(change.delta)
        .bind(qty_after)
        .bind(change.actor_id)
        .bind(&change.memo)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_reference_error)?;

        row.try_into()
    }

    /// Acquire the transaction-scoped advisory lock for a position key.
    ///
    /// The lock is released automatically on commit or rollback. The wait is
    /// bounded by `lock_timeout_ms`; expiry surfaces as a retryable conflict.
    async fn acquire_position_lock(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        location_id: Uuid,
        sku_id: Uuid,
    ) -> AppResult<()> {
        self.set_lock_timeout(tx).await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(position_lock_key(location_id, sku_id))
            .execute(&mut **tx)
            .await
            .map_err(|e| self.map_lock_error(e, location_id, sku_id))?;

        Ok(())
    }

    /// Bound lock waits for the rest of the transaction.
    async fn set_lock_timeout(&self, tx: &mut Transaction<'_, Postgres>) -> AppResult<()> {
        // SET LOCAL does not accept bind parameters
        let stmt = format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout_ms);
        sqlx::query(&stmt).execute(&mut **tx).await?;
        Ok(())
    }

    /// Translate a Postgres lock-timeout failure into a retryable conflict.
    fn map_lock_error(&self, err: sqlx::Error, location_id: Uuid, sku_id: Uuid) -> AppError {
        match &err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("55P03") => {
                AppError::Conflict {
                    resource: "stock_position".to_string(),
                    message: format!(
                        "Timed out waiting for the stock lock on SKU {} at location {}; retry the operation",
                        sku_id, location_id
                    ),
                }
            }
            _ => AppError::DatabaseError(err),
        }
    }
}

/// Derive the 64-bit advisory lock key for a `(location, sku)` pair.
///
/// First 8 bytes of SHA-256 over both UUIDs, so writers to the same pair
/// always contend on the same key and distinct pairs almost never do.
fn position_lock_key(location_id: Uuid, sku_id: Uuid) -> i64 {
    let mut hasher = Sha256::new();
    hasher.update(location_id.as_bytes());
    hasher.update(sku_id.as_bytes());
    let digest = hasher.finalize();

    let mut key = [0u8; 8];
    key.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(key)
}
