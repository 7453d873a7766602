//! Purchase order models
//!
//! Purchase orders receive in parts: every receipt call credits the
//! destination by the delivered delta, and the order only advances to
//! RECEIVED once every line has reached its ordered quantity.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{PlannedChange, TxType, WorkflowState};

/// Purchase order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Draft,
    Confirmed,
    Shipped,
    Received,
    Cancelled,
}

impl PurchaseOrderStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(PurchaseOrderStatus::Draft),
            "confirmed" => Some(PurchaseOrderStatus::Confirmed),
            "shipped" => Some(PurchaseOrderStatus::Shipped),
            "received" => Some(PurchaseOrderStatus::Received),
            "cancelled" => Some(PurchaseOrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl WorkflowState for PurchaseOrderStatus {
    const WORKFLOW: &'static str = "Purchase order";

    fn initial() -> Self {
        PurchaseOrderStatus::Draft
    }

    fn transitions() -> &'static [(Self, Self)] {
        use PurchaseOrderStatus::*;
        &[
            (Draft, Confirmed),
            (Confirmed, Shipped),
            (Shipped, Received),
            (Draft, Cancelled),
            (Confirmed, Cancelled),
            (Shipped, Cancelled),
        ]
    }

    fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Draft => "draft",
            PurchaseOrderStatus::Confirmed => "confirmed",
            PurchaseOrderStatus::Shipped => "shipped",
            PurchaseOrderStatus::Received => "received",
            PurchaseOrderStatus::Cancelled => "cancelled",
        }
    }
}

/// A purchase order with its line items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub status: PurchaseOrderStatus,
    pub destination_location_id: Uuid,
    pub supplier_name: Option<String>,
    pub currency: String,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub lines: Vec<PurchaseOrderLine>,
}

/// One SKU on a purchase order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrderLine {
    pub id: Uuid,
    pub sku_id: Uuid,
    pub order_qty: i64,
    pub received_qty: i64,
    pub unit_price: Option<Decimal>,
}

/// Validate one receipt increment against a line's cumulative bound.
///
/// Returns the line's new cumulative received quantity.
pub fn receipt_increment(
    order_qty: i64,
    received_qty: i64,
    delta: i64,
) -> Result<i64, &'static str> {
    if delta <= 0 {
        return Err("Receipt quantity must be positive");
    }
    let new_received = received_qty + delta;
    if new_received > order_qty {
        return Err("Receipt exceeds ordered quantity");
    }
    Ok(new_received)
}

/// An order is fully received once every line reaches its ordered quantity.
pub fn is_fully_received(lines: &[(i64, i64)]) -> bool {
    lines
        .iter()
        .all(|&(order_qty, received_qty)| received_qty >= order_qty)
}

/// Ledger changes for one (partial) receipt: credit the destination by each
/// delivered delta.
pub fn plan_purchase_receipt_effects(
    destination_location_id: Uuid,
    deltas: &[(Uuid, i64)],
) -> Vec<PlannedChange> {
    deltas
        .iter()
        .map(|&(sku_id, qty)| PlannedChange {
            location_id: destination_location_id,
            sku_id,
            delta: qty,
            tx_type: TxType::PurchaseReceipt,
        })
        .collect()
}
