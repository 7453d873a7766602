//! Reorder threshold service with a short-TTL in-process cache
//!
//! Thresholds are small, read-mostly configuration. The low-stock alert
//! query reads them through the cache; they are not part of the
//! consistency-critical ledger path, so a slightly stale read is fine.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{FromRow, PgPool};
use tokio::sync::RwLock;
use uuid::Uuid;

use shared::{LowStockAlert, ReorderThreshold};

use crate::error::{AppError, AppResult};
use crate::services::map_reference_error;

/// Reorder threshold service
#[derive(Clone)]
pub struct ThresholdService {
    db: PgPool,
    cache: Arc<RwLock<Option<CachedThresholds>>>,
    ttl: Duration,
}

#[derive(Debug)]
struct CachedThresholds {
    loaded_at: Instant,
    thresholds: Vec<ReorderThreshold>,
}

/// Input for setting a reorder threshold
#[derive(Debug, Deserialize)]
pub struct SetThresholdInput {
    pub location_id: Uuid,
    pub sku_id: Uuid,
    pub min_quantity: i64,
}

/// Row for threshold queries
#[derive(Debug, FromRow)]
struct ThresholdRow {
    location_id: Uuid,
    sku_id: Uuid,
    min_quantity: i64,
    updated_at: DateTime<Utc>,
}

impl From<ThresholdRow> for ReorderThreshold {
    fn from(row: ThresholdRow) -> Self {
        ReorderThreshold {
            location_id: row.location_id,
            sku_id: row.sku_id,
            min_quantity: row.min_quantity,
            updated_at: row.updated_at,
        }
    }
}

impl ThresholdService {
    /// Create a new ThresholdService instance
    pub fn new(db: PgPool, ttl: Duration) -> Self {
        Self {
            db,
            cache: Arc::new(RwLock::new(None)),
            ttl,
        }
    }

    /// Upsert a reorder threshold and invalidate the cache
    pub async fn set_threshold(&self, input: SetThresholdInput) -> AppResult<ReorderThreshold> {
        if input.min_quantity < 0 {
            return Err(AppError::Validation {
                field: "min_quantity".to_string(),
                message: "Threshold cannot be negative".to_string(),
            });
        }

        let row = sqlx::query_as::<_, ThresholdRow>(
            r#"
            INSERT INTO reorder_thresholds (location_id, sku_id, min_quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (location_id, sku_id)
            DO UPDATE SET min_quantity = EXCLUDED.min_quantity, updated_at = NOW()
            RETURNING location_id, sku_id, min_quantity, updated_at
            "#,
        )
        .bind(input.location_id)
        .bind(input.sku_id)
        .bind(input.min_quantity)
        .fetch_one(&self.db)
        .await
        .map_err(map_reference_error)?;

        *self.cache.write().await = None;

        Ok(row.into())
    }

    /// List all reorder thresholds (cached)
    pub async fn list(&self) -> AppResult<Vec<ReorderThreshold>> {
        self.thresholds().await
    }

    /// Positions at or below their reorder threshold.
    ///
    /// A position that has never been touched counts as zero.
    pub async fn low_stock(&self) -> AppResult<Vec<LowStockAlert>> {
        let thresholds = self.thresholds().await?;
        if thresholds.is_empty() {
            return Ok(Vec::new());
        }

        let location_ids: Vec<Uuid> = thresholds.iter().map(|t| t.location_id).collect();
        let sku_ids: Vec<Uuid> = thresholds.iter().map(|t| t.sku_id).collect();

        let rows = sqlx::query_as::<_, (Uuid, Uuid, i64)>(
            r#"
            SELECT location_id, sku_id, quantity
            FROM stock_positions
            WHERE location_id = ANY($1) AND sku_id = ANY($2)
            "#,
        )
        .bind(&location_ids)
        .bind(&sku_ids)
        .fetch_all(&self.db)
        .await?;

        let quantities: HashMap<(Uuid, Uuid), i64> = rows
            .into_iter()
            .map(|(location_id, sku_id, quantity)| ((location_id, sku_id), quantity))
            .collect();

        Ok(thresholds
            .into_iter()
            .filter_map(|threshold| {
                let quantity = quantities
                    .get(&(threshold.location_id, threshold.sku_id))
                    .copied()
                    .unwrap_or(0);
                (quantity <= threshold.min_quantity).then_some(LowStockAlert {
                    location_id: threshold.location_id,
                    sku_id: threshold.sku_id,
                    quantity,
                    min_quantity: threshold.min_quantity,
                })
            })
            .collect())
    }

    /// Thresholds from cache, reloading once the TTL lapses
    async fn thresholds(&self) -> AppResult<Vec<ReorderThreshold>> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.loaded_at.elapsed() < self.ttl {
                    return Ok(cached.thresholds.clone());
                }
            }
        }

        let rows = sqlx::query_as::<_, ThresholdRow>(
            r#"
            SELECT location_id, sku_id, min_quantity, updated_at
            FROM reorder_thresholds
            ORDER BY location_id, sku_id
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let thresholds: Vec<ReorderThreshold> = rows.into_iter().map(Into::into).collect();

        *self.cache.write().await = Some(CachedThresholds {
            loaded_at: Instant::now(),
            thresholds: thresholds.clone(),
        });

        Ok(thresholds)
    }
}
