//! Shipment request models
//!
//! A shipment request moves stock out of an origin location and, on receipt,
//! into a destination location. The `kind` tag distinguishes plain outbound
//! shipments, returns to a vendor, and inter-location transfers; it only
//! changes the transaction type stamped on the ledger entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{PlannedChange, TxType, WorkflowState};

/// Shipment request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Pending,
    Shipped,
    Received,
    Cancelled,
}

impl ShipmentStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ShipmentStatus::Pending),
            "shipped" => Some(ShipmentStatus::Shipped),
            "received" => Some(ShipmentStatus::Received),
            "cancelled" => Some(ShipmentStatus::Cancelled),
            _ => None,
        }
    }
}

impl WorkflowState for ShipmentStatus {
    const WORKFLOW: &'static str = "Shipment request";

    fn initial() -> Self {
        ShipmentStatus::Pending
    }

    fn transitions() -> &'static [(Self, Self)] {
        use ShipmentStatus::*;
        &[
            (Pending, Shipped),
            (Shipped, Received),
            (Pending, Cancelled),
            (Shipped, Cancelled),
        ]
    }

    fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Pending => "pending",
            ShipmentStatus::Shipped => "shipped",
            ShipmentStatus::Received => "received",
            ShipmentStatus::Cancelled => "cancelled",
        }
    }
}

/// Shipment kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentKind {
    Shipment,
    Return,
    Transfer,
}

impl ShipmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentKind::Shipment => "shipment",
            ShipmentKind::Return => "return",
            ShipmentKind::Transfer => "transfer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "shipment" => Some(ShipmentKind::Shipment),
            "return" => Some(ShipmentKind::Return),
            "transfer" => Some(ShipmentKind::Transfer),
            _ => None,
        }
    }

    /// Transaction type stamped on this kind's ledger entries.
    pub fn tx_type(&self) -> TxType {
        match self {
            ShipmentKind::Shipment => TxType::Shipment,
            ShipmentKind::Return => TxType::Return,
            ShipmentKind::Transfer => TxType::Transfer,
        }
    }
}

/// A shipment request with its line items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentRequest {
    pub id: Uuid,
    pub kind: ShipmentKind,
    pub status: ShipmentStatus,
    pub origin_location_id: Uuid,
    pub destination_location_id: Uuid,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub lines: Vec<ShipmentLine>,
}

/// One SKU on a shipment request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentLine {
    pub id: Uuid,
    pub sku_id: Uuid,
    pub requested_qty: i64,
    pub shipped_qty: Option<i64>,
    pub received_qty: Option<i64>,
}

/// Ledger changes for `PENDING -> SHIPPED`: debit the origin by each line's
/// shipped quantity.
pub fn plan_ship_effects(
    kind: ShipmentKind,
    origin_location_id: Uuid,
    shipped: &[(Uuid, i64)],
) -> Vec<PlannedChange> {
    shipped
        .iter()
        .map(|&(sku_id, qty)| PlannedChange {
            location_id: origin_location_id,
            sku_id,
            delta: -qty,
            tx_type: kind.tx_type(),
        })
        .collect()
}

/// Ledger changes for `SHIPPED -> RECEIVED`: credit the destination by each
/// line's received quantity. Lines received as zero produce no entry.
pub fn plan_receive_effects(
    kind: ShipmentKind,
    destination_location_id: Uuid,
    received: &[(Uuid, i64)],
) -> Vec<PlannedChange> {
    received
        .iter()
        .filter(|&&(_, qty)| qty != 0)
        .map(|&(sku_id, qty)| PlannedChange {
            location_id: destination_location_id,
            sku_id,
            delta: qty,
            tx_type: kind.tx_type(),
        })
        .collect()
}
