//! Production plan models
//!
//! Completion is the heavy transition: it debits raw-material stock by the
//! recorded consumption and credits the plan's hub location with the
//! finished goods actually produced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{PlannedChange, TxType, WorkflowState};

/// Production plan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductionStatus {
    Draft,
    Confirmed,
    InProduction,
    Completed,
    Cancelled,
}

impl ProductionStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(ProductionStatus::Draft),
            "confirmed" => Some(ProductionStatus::Confirmed),
            "in_production" => Some(ProductionStatus::InProduction),
            "completed" => Some(ProductionStatus::Completed),
            "cancelled" => Some(ProductionStatus::Cancelled),
            _ => None,
        }
    }
}

impl WorkflowState for ProductionStatus {
    const WORKFLOW: &'static str = "Production plan";

    fn initial() -> Self {
        ProductionStatus::Draft
    }

    fn transitions() -> &'static [(Self, Self)] {
        use ProductionStatus::*;
        &[
            (Draft, Confirmed),
            (Confirmed, InProduction),
            (InProduction, Completed),
            (Draft, Cancelled),
            (Confirmed, Cancelled),
            (InProduction, Cancelled),
        ]
    }

    fn as_str(&self) -> &'static str {
        match self {
            ProductionStatus::Draft => "draft",
            ProductionStatus::Confirmed => "confirmed",
            ProductionStatus::InProduction => "in_production",
            ProductionStatus::Completed => "completed",
            ProductionStatus::Cancelled => "cancelled",
        }
    }
}

/// A production plan with its finished-goods line items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionPlan {
    pub id: Uuid,
    pub status: ProductionStatus,
    /// Location credited with finished goods on completion.
    pub hub_location_id: Uuid,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub lines: Vec<ProductionLine>,
}

/// One finished-goods SKU on a production plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionLine {
    pub id: Uuid,
    pub sku_id: Uuid,
    pub planned_qty: i64,
    pub produced_qty: Option<i64>,
}

/// Raw material consumed during a production run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialConsumption {
    pub location_id: Uuid,
    pub sku_id: Uuid,
    pub quantity: i64,
}

/// Ledger changes for `IN_PRODUCTION -> COMPLETED`: material debits first,
/// then finished-goods credits to the hub. Lines produced as zero produce no
/// entry.
pub fn plan_completion_effects(
    hub_location_id: Uuid,
    produced: &[(Uuid, i64)],
    consumptions: &[MaterialConsumption],
) -> Vec<PlannedChange> {
    let mut changes: Vec<PlannedChange> = consumptions
        .iter()
        .map(|c| PlannedChange {
            location_id: c.location_id,
            sku_id: c.sku_id,
            delta: -c.quantity,
            tx_type: TxType::MaterialConsumption,
        })
        .collect();

    changes.extend(
        produced
            .iter()
            .filter(|&&(_, qty)| qty != 0)
            .map(|&(sku_id, qty)| PlannedChange {
                location_id: hub_location_id,
                sku_id,
                delta: qty,
                tx_type: TxType::ProductionOutput,
            }),
    );

    changes
}
