//! Applied-effect bookkeeping for workflow transitions
//!
//! Every ledger call a workflow transition makes is recorded here, in the
//! same transaction as the ledger entry itself. Cancellation reverses what
//! this record says was actually applied, instead of re-deriving the effects
//! from the instance's current status and quantity fields (which silently
//! breaks if a quantity is ever edited after the fact).

use chrono::{DateTime, Utc};
use sqlx::{FromRow, Postgres, Transaction};
use uuid::Uuid;

use shared::{invert_effects, AppliedEffect, PlannedChange, TxType, WorkflowKind};

use crate::error::{AppError, AppResult};
use crate::services::ledger::{StockChange, StockLedgerService};

/// Row for applied-effect queries
#[derive(Debug, FromRow)]
struct EffectRow {
    id: Uuid,
    workflow_kind: String,
    workflow_id: Uuid,
    tx_type: String,
    location_id: Uuid,
    sku_id: Uuid,
    qty_change: i64,
    ledger_entry_id: Uuid,
    created_at: DateTime<Utc>,
}

impl TryFrom<EffectRow> for AppliedEffect {
    type Error = AppError;

    fn try_from(row: EffectRow) -> Result<Self, Self::Error> {
        let workflow_kind = WorkflowKind::from_str(&row.workflow_kind).ok_or_else(|| {
            AppError::Internal(format!("Unknown workflow kind: {}", row.workflow_kind))
        })?;
        let tx_type = TxType::from_str(&row.tx_type)
            .ok_or_else(|| AppError::Internal(format!("Unknown effect tx_type: {}", row.tx_type)))?;
        Ok(AppliedEffect {
            id: row.id,
            workflow_kind,
            workflow_id: row.workflow_id,
            tx_type,
            location_id: row.location_id,
            sku_id: row.sku_id,
            qty_change: row.qty_change,
            ledger_entry_id: row.ledger_entry_id,
            created_at: row.created_at,
        })
    }
}

/// Apply a planned set of ledger changes for a workflow transition,
/// recording each application for later reversal. Returns any stock
/// warnings the ledger raised.
pub(crate) async fn apply_planned_changes(
    tx: &mut Transaction<'_, Postgres>,
    ledger: &StockLedgerService,
    kind: WorkflowKind,
    workflow_id: Uuid,
    actor_id: Uuid,
    changes: &[PlannedChange],
) -> AppResult<Vec<String>> {
    let mut warnings = Vec::new();

    for change in changes {
        let applied = ledger
            .apply_change(
                tx,
                StockChange {
                    location_id: change.location_id,
                    sku_id: change.sku_id,
                    delta: change.delta,
                    tx_type: change.tx_type,
                    ref_id: Some(workflow_id),
                    actor_id,
                    memo: None,
                },
            )
            .await?;

        record_effect(tx, kind, workflow_id, change, applied.entry.id).await?;

        if let Some(warning) = applied.warning {
            warnings.push(warning);
        }
    }

    Ok(warnings)
}

/// Reverse whatever ledger effects this instance has accrued so far.
///
/// Reads the applied-effect record back verbatim and applies the inverse of
/// each entry in reverse order; instances that never touched the ledger
/// reverse to nothing.
pub(crate) async fn reverse_effects(
    tx: &mut Transaction<'_, Postgres>,
    ledger: &StockLedgerService,
    kind: WorkflowKind,
    workflow_id: Uuid,
    actor_id: Uuid,
) -> AppResult<Vec<String>> {
    let effects = applied_effects(tx, kind, workflow_id).await?;
    let inverse = invert_effects(&effects);
    apply_planned_changes(tx, ledger, kind, workflow_id, actor_id, &inverse).await
}

/// Effects applied by one workflow instance, in application order
pub(crate) async fn applied_effects(
    tx: &mut Transaction<'_, Postgres>,
    kind: WorkflowKind,
    workflow_id: Uuid,
) -> AppResult<Vec<AppliedEffect>> {
    let rows = sqlx::query_as::<_, EffectRow>(
        r#"
        SELECT id, workflow_kind, workflow_id, tx_type, location_id, sku_id,
               qty_change, ledger_entry_id, created_at
        FROM workflow_effects
        WHERE workflow_kind = $1 AND workflow_id = $2
        ORDER BY seq
        "#,
    )
    .bind(kind.as_str())
    .bind(workflow_id)
    .fetch_all(&mut **tx)
    .await?;

    rows.into_iter().map(TryInto::try_into).collect()
}

/// Record one applied ledger mutation for a workflow instance
async fn record_effect(
    tx: &mut Transaction<'_, Postgres>,
    kind: WorkflowKind,
    workflow_id: Uuid,
    change: &PlannedChange,
    ledger_entry_id: Uuid,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO workflow_effects
            (workflow_kind, workflow_id, tx_type, location_id, sku_id, qty_change, ledger_entry_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(kind.as_str())
    .bind(workflow_id)
    .bind(change.tx_type.as_str())
    .bind(change.location_id)
    .bind(change.sku_id)
    .bind(change.delta)
    .bind(ledger_entry_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
