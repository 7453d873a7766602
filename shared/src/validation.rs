//! Validation and quantity arithmetic shared by the backend services
//!
//! These helpers are deliberately free of storage concerns so the ledger's
//! edge cases (clamping, zero deltas, over-receipt bounds) can be tested as
//! plain functions.

/// Result of clamping a manual adjustment at zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClampedAdjustment {
    /// Delta actually applied to the position and recorded in the ledger.
    pub applied_delta: i64,
    /// Position quantity after the adjustment.
    pub quantity_after: i64,
    /// True when the requested delta would have driven the quantity negative.
    pub clamped: bool,
}

/// Clamp an adjustment so the resulting quantity never goes below zero.
///
/// The `adjust` entry point uses this; `apply_change` deliberately does not
/// (negative positions are a legitimate transient state on that path).
pub fn clamp_adjustment(current: i64, delta: i64) -> ClampedAdjustment {
    let quantity_after = (current + delta).max(0);
    let applied_delta = quantity_after - current;
    ClampedAdjustment {
        applied_delta,
        quantity_after,
        clamped: applied_delta != delta,
    }
}

/// Reject empty line-item lists at workflow creation.
pub fn validate_line_items<T>(lines: &[T]) -> Result<(), &'static str> {
    if lines.is_empty() {
        return Err("At least one line item is required");
    }
    Ok(())
}

/// Reject non-positive quantities on workflow inputs.
pub fn validate_positive_qty(qty: i64) -> Result<(), &'static str> {
    if qty <= 0 {
        return Err("Quantity must be positive");
    }
    Ok(())
}

/// Reject non-negative violations on receipt inputs that allow zero.
pub fn validate_non_negative_qty(qty: i64) -> Result<(), &'static str> {
    if qty < 0 {
        return Err("Quantity cannot be negative");
    }
    Ok(())
}

/// Received quantity may not exceed what was shipped.
pub fn validate_received_within_shipped(
    received_qty: i64,
    shipped_qty: i64,
) -> Result<(), &'static str> {
    if received_qty > shipped_qty {
        return Err("Received quantity exceeds shipped quantity");
    }
    Ok(())
}
