//! Sales order models
//!
//! Completion converts the order into immutable sale records and debits the
//! selling location by each line's quantity. Cancellation before completion
//! has no ledger effect because no stock was ever removed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{PlannedChange, TxType, WorkflowState};

/// Sales order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalesOrderStatus {
    Pending,
    Confirmed,
    Processing,
    Completed,
    Cancelled,
}

impl SalesOrderStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SalesOrderStatus::Pending),
            "confirmed" => Some(SalesOrderStatus::Confirmed),
            "processing" => Some(SalesOrderStatus::Processing),
            "completed" => Some(SalesOrderStatus::Completed),
            "cancelled" => Some(SalesOrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl WorkflowState for SalesOrderStatus {
    const WORKFLOW: &'static str = "Sales order";

    fn initial() -> Self {
        SalesOrderStatus::Pending
    }

    fn transitions() -> &'static [(Self, Self)] {
        use SalesOrderStatus::*;
        &[
            (Pending, Confirmed),
            (Confirmed, Processing),
            (Processing, Completed),
            (Pending, Cancelled),
            (Confirmed, Cancelled),
            (Processing, Cancelled),
        ]
    }

    fn as_str(&self) -> &'static str {
        match self {
            SalesOrderStatus::Pending => "pending",
            SalesOrderStatus::Confirmed => "confirmed",
            SalesOrderStatus::Processing => "processing",
            SalesOrderStatus::Completed => "completed",
            SalesOrderStatus::Cancelled => "cancelled",
        }
    }
}

/// A sales order with its line items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesOrder {
    pub id: Uuid,
    pub status: SalesOrderStatus,
    /// Location stock is deducted from on completion.
    pub location_id: Uuid,
    pub customer_name: Option<String>,
    pub currency: String,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub lines: Vec<SalesOrderLine>,
}

/// One SKU on a sales order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesOrderLine {
    pub id: Uuid,
    pub sku_id: Uuid,
    pub quantity: i64,
    pub unit_price: Option<Decimal>,
}

/// Immutable sale record materialized per line on completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleRecord {
    pub id: Uuid,
    pub sales_order_id: Uuid,
    pub location_id: Uuid,
    pub sku_id: Uuid,
    pub quantity: i64,
    pub unit_price: Option<Decimal>,
    pub total_price: Option<Decimal>,
    pub actor_id: Uuid,
    pub sold_at: DateTime<Utc>,
}

/// Ledger changes for `PROCESSING -> COMPLETED`: debit the selling location
/// by each line's quantity.
pub fn plan_sale_effects(location_id: Uuid, lines: &[(Uuid, i64)]) -> Vec<PlannedChange> {
    lines
        .iter()
        .map(|&(sku_id, qty)| PlannedChange {
            location_id,
            sku_id,
            delta: -qty,
            tx_type: TxType::Sale,
        })
        .collect()
}
