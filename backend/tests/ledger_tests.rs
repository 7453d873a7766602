//! Stock ledger tests
//!
//! Tests for ledger arithmetic including:
//! - The core invariant: position quantity == sum of ledger qty_change
//! - The unclamped apply path vs. the clamped adjust path
//! - Convergence of same-key writes regardless of ordering

use proptest::prelude::*;
use std::collections::HashMap;
use uuid::Uuid;

use shared::clamp_adjustment;

/// In-memory model of the ledger's position/entry arithmetic
#[derive(Debug, Default)]
struct SimLedger {
    positions: HashMap<(Uuid, Uuid), i64>,
    entries: Vec<SimEntry>,
}

#[derive(Debug)]
struct SimEntry {
    location_id: Uuid,
    sku_id: Uuid,
    qty_change: i64,
    qty_after: i64,
}

impl SimLedger {
    /// The workflow path: unclamped, zero deltas rejected
    fn apply_change(
        &mut self,
        location_id: Uuid,
        sku_id: Uuid,
        delta: i64,
    ) -> Result<i64, &'static str> {
        if delta == 0 {
            return Err("Stock change must be non-zero");
        }
        let quantity = self.positions.entry((location_id, sku_id)).or_insert(0);
        *quantity += delta;
        let qty_after = *quantity;
        self.entries.push(SimEntry {
            location_id,
            sku_id,
            qty_change: delta,
            qty_after,
        });
        Ok(qty_after)
    }

    /// The operator path: clamped at zero, records the clamped delta
    fn adjust(
        &mut self,
        location_id: Uuid,
        sku_id: Uuid,
        delta: i64,
    ) -> Result<(i64, bool), &'static str> {
        if delta == 0 {
            return Err("Adjustment must be non-zero");
        }
        let current = self
            .positions
            .get(&(location_id, sku_id))
            .copied()
            .unwrap_or(0);
        let clamp = clamp_adjustment(current, delta);
        if clamp.applied_delta == 0 {
            return Err("Adjustment would have no effect");
        }
        self.apply_change(location_id, sku_id, clamp.applied_delta)?;
        Ok((clamp.quantity_after, clamp.clamped))
    }

    /// position.quantity == sum of qty_change, and every entry's qty_after
    /// matches the running sum for its key
    fn invariant_holds(&self) -> bool {
        let mut running: HashMap<(Uuid, Uuid), i64> = HashMap::new();
        for entry in &self.entries {
            let sum = running
                .entry((entry.location_id, entry.sku_id))
                .or_insert(0);
            *sum += entry.qty_change;
            if *sum != entry.qty_after {
                return false;
            }
        }
        self.positions
            .iter()
            .all(|(key, quantity)| running.get(key).copied().unwrap_or(0) == *quantity)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Apply path never clamps: -5 onto 3 yields -2 with the full delta logged
    #[test]
    fn test_apply_change_unclamped_goes_negative() {
        let mut ledger = SimLedger::default();
        let (location, sku) = (Uuid::new_v4(), Uuid::new_v4());

        ledger.apply_change(location, sku, 3).unwrap();
        let after = ledger.apply_change(location, sku, -5).unwrap();

        assert_eq!(after, -2);
        assert_eq!(ledger.entries.last().unwrap().qty_change, -5);
        assert!(ledger.invariant_holds());
    }

    /// Adjust path clamps: -5 onto 3 yields 0 with only -3 logged
    #[test]
    fn test_adjust_clamped_at_zero() {
        let mut ledger = SimLedger::default();
        let (location, sku) = (Uuid::new_v4(), Uuid::new_v4());

        ledger.apply_change(location, sku, 3).unwrap();
        let (after, clamped) = ledger.adjust(location, sku, -5).unwrap();

        assert_eq!(after, 0);
        assert!(clamped);
        assert_eq!(ledger.entries.last().unwrap().qty_change, -3);
        assert!(ledger.invariant_holds());
    }

    /// An adjustment within bounds is applied verbatim with no warning
    #[test]
    fn test_adjust_within_bounds_not_clamped() {
        let mut ledger = SimLedger::default();
        let (location, sku) = (Uuid::new_v4(), Uuid::new_v4());

        ledger.apply_change(location, sku, 10).unwrap();
        let (after, clamped) = ledger.adjust(location, sku, -4).unwrap();

        assert_eq!(after, 6);
        assert!(!clamped);
    }

    /// Zero deltas are rejected on both paths, leaving no entry behind
    #[test]
    fn test_zero_delta_rejected() {
        let mut ledger = SimLedger::default();
        let (location, sku) = (Uuid::new_v4(), Uuid::new_v4());

        assert!(ledger.apply_change(location, sku, 0).is_err());
        assert!(ledger.adjust(location, sku, 0).is_err());
        assert!(ledger.entries.is_empty());
    }

    /// A fully clamped adjustment (nothing left to remove) is rejected
    #[test]
    fn test_adjust_on_empty_position_rejected() {
        let mut ledger = SimLedger::default();
        let (location, sku) = (Uuid::new_v4(), Uuid::new_v4());

        assert!(ledger.adjust(location, sku, -5).is_err());
        assert!(ledger.entries.is_empty());
    }

    /// Clamp arithmetic on its own
    #[test]
    fn test_clamp_adjustment_arithmetic() {
        let clamp = clamp_adjustment(3, -5);
        assert_eq!(clamp.quantity_after, 0);
        assert_eq!(clamp.applied_delta, -3);
        assert!(clamp.clamped);

        let clamp = clamp_adjustment(10, 5);
        assert_eq!(clamp.quantity_after, 15);
        assert_eq!(clamp.applied_delta, 5);
        assert!(!clamp.clamped);

        let clamp = clamp_adjustment(0, -1);
        assert_eq!(clamp.applied_delta, 0);
        assert!(clamp.clamped);
    }

    /// Writers to different keys do not interfere
    #[test]
    fn test_distinct_keys_independent() {
        let mut ledger = SimLedger::default();
        let location = Uuid::new_v4();
        let (sku_a, sku_b) = (Uuid::new_v4(), Uuid::new_v4());

        ledger.apply_change(location, sku_a, 7).unwrap();
        ledger.apply_change(location, sku_b, -2).unwrap();

        assert_eq!(ledger.positions[&(location, sku_a)], 7);
        assert_eq!(ledger.positions[&(location, sku_b)], -2);
        assert!(ledger.invariant_holds());
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Non-zero deltas in a workable range
    fn delta_strategy() -> impl Strategy<Value = i64> {
        prop_oneof![(-500i64..=-1), (1i64..=500)]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// The invariant holds after any sequence of applied changes
        #[test]
        fn prop_invariant_after_apply_sequence(
            deltas in prop::collection::vec(delta_strategy(), 1..40)
        ) {
            let mut ledger = SimLedger::default();
            let (location, sku) = (Uuid::new_v4(), Uuid::new_v4());

            for delta in &deltas {
                ledger.apply_change(location, sku, *delta).unwrap();
            }

            let expected: i64 = deltas.iter().sum();
            prop_assert_eq!(ledger.positions[&(location, sku)], expected);
            prop_assert_eq!(ledger.entries.len(), deltas.len());
            prop_assert!(ledger.invariant_holds());
        }

        /// N same-key writes converge to initial + sum regardless of order,
        /// producing exactly N entries
        #[test]
        fn prop_same_key_writes_order_independent(
            deltas in prop::collection::vec(delta_strategy(), 1..20).prop_shuffle()
        ) {
            let (location, sku) = (Uuid::new_v4(), Uuid::new_v4());

            let mut shuffled = SimLedger::default();
            for delta in &deltas {
                shuffled.apply_change(location, sku, *delta).unwrap();
            }

            let mut sorted_deltas = deltas.clone();
            sorted_deltas.sort_unstable();
            let mut sorted = SimLedger::default();
            for delta in &sorted_deltas {
                sorted.apply_change(location, sku, *delta).unwrap();
            }

            prop_assert_eq!(
                shuffled.positions[&(location, sku)],
                sorted.positions[&(location, sku)]
            );
            prop_assert_eq!(shuffled.entries.len(), deltas.len());
            prop_assert!(shuffled.invariant_holds());
            prop_assert!(sorted.invariant_holds());
        }

        /// The adjust path never leaves a negative quantity
        #[test]
        fn prop_adjust_never_negative(
            initial in 0i64..1000,
            delta in delta_strategy()
        ) {
            let clamp = clamp_adjustment(initial, delta);
            prop_assert!(clamp.quantity_after >= 0);
            prop_assert_eq!(clamp.quantity_after, initial + clamp.applied_delta);
        }

        /// Clamping happens exactly when the raw result would be negative
        #[test]
        fn prop_clamp_flag_matches_raw_result(
            initial in 0i64..1000,
            delta in delta_strategy()
        ) {
            let clamp = clamp_adjustment(initial, delta);
            prop_assert_eq!(clamp.clamped, initial + delta < 0);
        }

        /// Interleaved writers on two keys stay independent
        #[test]
        fn prop_two_keys_sum_independently(
            deltas_a in prop::collection::vec(delta_strategy(), 1..20),
            deltas_b in prop::collection::vec(delta_strategy(), 1..20)
        ) {
            let location = Uuid::new_v4();
            let (sku_a, sku_b) = (Uuid::new_v4(), Uuid::new_v4());
            let mut ledger = SimLedger::default();

            let max_len = deltas_a.len().max(deltas_b.len());
            for i in 0..max_len {
                if let Some(delta) = deltas_a.get(i) {
                    ledger.apply_change(location, sku_a, *delta).unwrap();
                }
                if let Some(delta) = deltas_b.get(i) {
                    ledger.apply_change(location, sku_b, *delta).unwrap();
                }
            }

            prop_assert_eq!(
                ledger.positions[&(location, sku_a)],
                deltas_a.iter().sum::<i64>()
            );
            prop_assert_eq!(
                ledger.positions[&(location, sku_b)],
                deltas_b.iter().sum::<i64>()
            );
            prop_assert!(ledger.invariant_holds());
        }
    }
}
