//! Business logic services for the Warehouse Stock Management Platform

pub mod effects;
pub mod ledger;
pub mod production;
pub mod purchase;
pub mod restock;
pub mod sales;
pub mod shipment;
pub mod threshold;

pub use ledger::StockLedgerService;
pub use production::ProductionService;
pub use purchase::PurchaseOrderService;
pub use restock::RestockService;
pub use sales::SalesOrderService;
pub use shipment::ShipmentService;
pub use threshold::ThresholdService;

use std::collections::HashMap;

use crate::error::AppError;

/// Per-line quantity input used by workflow transitions
#[derive(Debug, serde::Deserialize)]
pub struct LineQtyInput {
    pub line_id: uuid::Uuid,
    pub quantity: i64,
}

/// Result of a workflow transition: the updated instance plus any stock
/// warnings raised by the ledger (e.g. a position driven negative).
#[derive(Debug, serde::Serialize)]
pub struct TransitionOutcome<T> {
    pub instance: T,
    pub warnings: Vec<String>,
}

/// Collect per-line quantity inputs into a map, rejecting duplicates.
pub(crate) fn collect_line_updates(
    inputs: &[LineQtyInput],
) -> Result<HashMap<uuid::Uuid, i64>, AppError> {
    let mut updates = HashMap::with_capacity(inputs.len());
    for input in inputs {
        if updates.insert(input.line_id, input.quantity).is_some() {
            return Err(AppError::Validation {
                field: "lines".to_string(),
                message: format!("Duplicate update for line item {}", input.line_id),
            });
        }
    }
    Ok(updates)
}

/// Map foreign-key violations against reference tables (locations, SKUs) to
/// NotFound; the core does not re-validate reference data redundantly.
pub(crate) fn map_reference_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23503") => {
            AppError::NotFound("Location or SKU".to_string())
        }
        _ => AppError::DatabaseError(err),
    }
}
