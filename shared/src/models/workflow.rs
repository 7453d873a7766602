//! Generic workflow status machinery
//!
//! Every stock-moving entity (shipment request, restock request, purchase
//! order, production plan, sales order) moves through a strict directed
//! transition graph. The per-type status enums implement [`WorkflowState`];
//! services validate a requested transition with [`validate_transition`]
//! before touching the ledger, so an illegal request never mutates stock.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status graph implemented by each workflow's status enum.
pub trait WorkflowState: Copy + Eq + Sized + 'static {
    /// Workflow name used in error messages.
    const WORKFLOW: &'static str;

    /// Status a newly created instance starts in.
    fn initial() -> Self;

    /// The allowed `(from, to)` transition pairs.
    fn transitions() -> &'static [(Self, Self)];

    fn as_str(&self) -> &'static str;

    /// A status with no outgoing transitions is terminal.
    fn is_terminal(&self) -> bool {
        !Self::transitions().iter().any(|(from, _)| from == self)
    }
}

/// Whether `(from, to)` is listed in the type's transition table.
pub fn can_transition<S: WorkflowState>(from: S, to: S) -> bool {
    S::transitions().iter().any(|(f, t)| *f == from && *t == to)
}

/// Validate a requested transition against the type's table.
///
/// A same-status request is rejected before the table lookup so callers get
/// a distinct error for the no-op case.
pub fn validate_transition<S: WorkflowState>(from: S, to: S) -> Result<(), TransitionError> {
    if from == to {
        return Err(TransitionError::AlreadyInStatus {
            workflow: S::WORKFLOW,
            status: from.as_str(),
        });
    }
    if !can_transition(from, to) {
        return Err(TransitionError::NotAllowed {
            workflow: S::WORKFLOW,
            from: from.as_str(),
            to: to.as_str(),
        });
    }
    Ok(())
}

/// Rejected transition request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("{workflow} is already {status}")]
    AlreadyInStatus {
        workflow: &'static str,
        status: &'static str,
    },

    #[error("{workflow} cannot move from {from} to {to}")]
    NotAllowed {
        workflow: &'static str,
        from: &'static str,
        to: &'static str,
    },
}

/// The five workflow kinds that write applied-effect records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    Shipment,
    Restock,
    PurchaseOrder,
    ProductionPlan,
    SalesOrder,
}

impl WorkflowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowKind::Shipment => "shipment",
            WorkflowKind::Restock => "restock",
            WorkflowKind::PurchaseOrder => "purchase_order",
            WorkflowKind::ProductionPlan => "production_plan",
            WorkflowKind::SalesOrder => "sales_order",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "shipment" => Some(WorkflowKind::Shipment),
            "restock" => Some(WorkflowKind::Restock),
            "purchase_order" => Some(WorkflowKind::PurchaseOrder),
            "production_plan" => Some(WorkflowKind::ProductionPlan),
            "sales_order" => Some(WorkflowKind::SalesOrder),
            _ => None,
        }
    }
}
