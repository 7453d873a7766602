//! Restock request models
//!
//! A store requests replenishment from the purchasing team. Nothing touches
//! the ledger until goods actually arrive: only the `ORDERED -> RECEIVED`
//! transition credits the requesting location, using the received quantities
//! the operator keys in at that moment (which may differ from what was
//! requested).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{PlannedChange, TxType, WorkflowState};

/// Restock request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestockStatus {
    Draft,
    Approved,
    Ordered,
    Received,
    Cancelled,
}

impl RestockStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(RestockStatus::Draft),
            "approved" => Some(RestockStatus::Approved),
            "ordered" => Some(RestockStatus::Ordered),
            "received" => Some(RestockStatus::Received),
            "cancelled" => Some(RestockStatus::Cancelled),
            _ => None,
        }
    }
}

impl WorkflowState for RestockStatus {
    const WORKFLOW: &'static str = "Restock request";

    fn initial() -> Self {
        RestockStatus::Draft
    }

    fn transitions() -> &'static [(Self, Self)] {
        use RestockStatus::*;
        &[
            (Draft, Approved),
            (Approved, Ordered),
            (Ordered, Received),
            (Draft, Cancelled),
            (Approved, Cancelled),
            (Ordered, Cancelled),
        ]
    }

    fn as_str(&self) -> &'static str {
        match self {
            RestockStatus::Draft => "draft",
            RestockStatus::Approved => "approved",
            RestockStatus::Ordered => "ordered",
            RestockStatus::Received => "received",
            RestockStatus::Cancelled => "cancelled",
        }
    }
}

/// A restock request with its line items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestockRequest {
    pub id: Uuid,
    pub status: RestockStatus,
    /// Location asking for replenishment; receipts credit this location.
    pub location_id: Uuid,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub lines: Vec<RestockLine>,
}

/// One SKU on a restock request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestockLine {
    pub id: Uuid,
    pub sku_id: Uuid,
    pub requested_qty: i64,
    pub received_qty: Option<i64>,
}

/// Ledger changes for `ORDERED -> RECEIVED`: credit the requesting location
/// by each line's received quantity. Lines received as zero produce no entry.
pub fn plan_restock_receipt_effects(
    location_id: Uuid,
    received: &[(Uuid, i64)],
) -> Vec<PlannedChange> {
    received
        .iter()
        .filter(|&&(_, qty)| qty != 0)
        .map(|&(sku_id, qty)| PlannedChange {
            location_id,
            sku_id,
            delta: qty,
            tx_type: TxType::RestockReceipt,
        })
        .collect()
}
