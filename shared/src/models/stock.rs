//! Stock ledger models
//!
//! A stock position is the current quantity of a SKU at a location; every
//! mutation of a position appends exactly one immutable [`LedgerEntry`].
//! The invariant the whole platform hangs on: for every `(location, sku)`
//! pair, the position quantity equals the sum of `qty_change` over all of
//! that pair's ledger entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::WorkflowKind;

/// Ledger transaction types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxType {
    /// Outbound shipment leaving an origin location
    Shipment,
    /// Return shipment moving goods back to a partner/vendor
    Return,
    /// Inter-location transfer
    Transfer,
    /// Restock request receipt at the requesting location
    RestockReceipt,
    /// Purchase order receipt at the destination location
    PurchaseReceipt,
    /// Finished goods credited to the hub on production completion
    ProductionOutput,
    /// Raw material consumed by production
    MaterialConsumption,
    /// Point-of-sale deduction
    Sale,
    /// Manual operator correction
    Adjustment,
    /// Compensating entry applied on workflow cancellation
    Reversal,
}

impl TxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxType::Shipment => "shipment",
            TxType::Return => "return",
            TxType::Transfer => "transfer",
            TxType::RestockReceipt => "restock_receipt",
            TxType::PurchaseReceipt => "purchase_receipt",
            TxType::ProductionOutput => "production_output",
            TxType::MaterialConsumption => "material_consumption",
            TxType::Sale => "sale",
            TxType::Adjustment => "adjustment",
            TxType::Reversal => "reversal",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "shipment" => Some(TxType::Shipment),
            "return" => Some(TxType::Return),
            "transfer" => Some(TxType::Transfer),
            "restock_receipt" => Some(TxType::RestockReceipt),
            "purchase_receipt" => Some(TxType::PurchaseReceipt),
            "production_output" => Some(TxType::ProductionOutput),
            "material_consumption" => Some(TxType::MaterialConsumption),
            "sale" => Some(TxType::Sale),
            "adjustment" => Some(TxType::Adjustment),
            "reversal" => Some(TxType::Reversal),
            _ => None,
        }
    }
}

/// Current quantity of a SKU at a location
///
/// Positions are created implicitly on first mutation and never deleted.
/// Quantity is signed: the `apply_change` path may drive it negative
/// (oversell tracking), while the `adjust` path clamps at zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockPosition {
    pub location_id: Uuid,
    pub sku_id: Uuid,
    pub quantity: i64,
    pub updated_at: DateTime<Utc>,
}

/// One immutable, append-only record of a single stock mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub tx_type: TxType,
    /// Workflow instance or document that caused the mutation
    pub ref_id: Option<Uuid>,
    pub location_id: Uuid,
    pub sku_id: Uuid,
    pub qty_change: i64,
    /// Position quantity immediately after this mutation
    pub qty_after: i64,
    pub actor_id: Uuid,
    pub memo: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A single ledger mutation a workflow transition intends to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedChange {
    pub location_id: Uuid,
    pub sku_id: Uuid,
    pub delta: i64,
    pub tx_type: TxType,
}

/// Record of a ledger mutation a workflow transition actually applied
///
/// Written in the same transaction as the ledger entry itself, and read back
/// verbatim when a cancellation needs to reverse the instance's effects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedEffect {
    pub id: Uuid,
    pub workflow_kind: WorkflowKind,
    pub workflow_id: Uuid,
    pub tx_type: TxType,
    pub location_id: Uuid,
    pub sku_id: Uuid,
    pub qty_change: i64,
    pub ledger_entry_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Compute the compensating changes for a set of applied effects.
///
/// Effects are undone in reverse application order. Entries that are
/// themselves reversals are skipped so a cancellation never un-reverses a
/// prior cancellation's work.
pub fn invert_effects(effects: &[AppliedEffect]) -> Vec<PlannedChange> {
    effects
        .iter()
        .rev()
        .filter(|effect| effect.tx_type != TxType::Reversal)
        .map(|effect| PlannedChange {
            location_id: effect.location_id,
            sku_id: effect.sku_id,
            delta: -effect.qty_change,
            tx_type: TxType::Reversal,
        })
        .collect()
}

/// Reorder threshold for a `(location, sku)` pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderThreshold {
    pub location_id: Uuid,
    pub sku_id: Uuid,
    pub min_quantity: i64,
    pub updated_at: DateTime<Utc>,
}

/// A position at or below its reorder threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LowStockAlert {
    pub location_id: Uuid,
    pub sku_id: Uuid,
    pub quantity: i64,
    pub min_quantity: i64,
}
