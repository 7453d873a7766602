//! Production plan tests
//!
//! Tests for completion effects: raw-material debits from the recorded
//! consumption and finished-goods credits to the hub location.

use proptest::prelude::*;
use std::collections::HashMap;
use uuid::Uuid;

use shared::{plan_completion_effects, MaterialConsumption, TxType};

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Completion debits materials and credits the hub
    #[test]
    fn test_completion_effects() {
        let hub = Uuid::new_v4();
        let material_store = Uuid::new_v4();
        let (finished_sku, material_sku) = (Uuid::new_v4(), Uuid::new_v4());

        let consumptions = [MaterialConsumption {
            location_id: material_store,
            sku_id: material_sku,
            quantity: 12,
        }];
        let plan = plan_completion_effects(hub, &[(finished_sku, 5)], &consumptions);

        assert_eq!(plan.len(), 2);

        // Material debit first, then the hub credit
        assert_eq!(plan[0].location_id, material_store);
        assert_eq!(plan[0].sku_id, material_sku);
        assert_eq!(plan[0].delta, -12);
        assert_eq!(plan[0].tx_type, TxType::MaterialConsumption);

        assert_eq!(plan[1].location_id, hub);
        assert_eq!(plan[1].sku_id, finished_sku);
        assert_eq!(plan[1].delta, 5);
        assert_eq!(plan[1].tx_type, TxType::ProductionOutput);
    }

    /// Lines produced as zero are skipped; consumption still applies
    #[test]
    fn test_zero_produced_line_skipped() {
        let hub = Uuid::new_v4();
        let store = Uuid::new_v4();
        let (sku_a, sku_b, material) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let consumptions = [MaterialConsumption {
            location_id: store,
            sku_id: material,
            quantity: 3,
        }];
        let plan = plan_completion_effects(hub, &[(sku_a, 0), (sku_b, 7)], &consumptions);

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[1].sku_id, sku_b);
        assert_eq!(plan[1].delta, 7);
    }

    /// A run with no consumption still credits its output
    #[test]
    fn test_completion_without_consumption() {
        let hub = Uuid::new_v4();
        let sku = Uuid::new_v4();

        let plan = plan_completion_effects(hub, &[(sku, 20)], &[]);

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].delta, 20);
        assert_eq!(plan[0].tx_type, TxType::ProductionOutput);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Net stock movement equals outputs minus consumption per location
        #[test]
        fn prop_completion_conserves_quantities(
            produced_quantities in prop::collection::vec(0i64..500, 1..6),
            consumed_quantities in prop::collection::vec(1i64..500, 0..6)
        ) {
            let hub = Uuid::new_v4();
            let material_store = Uuid::new_v4();

            let produced: Vec<(Uuid, i64)> = produced_quantities
                .iter()
                .map(|qty| (Uuid::new_v4(), *qty))
                .collect();
            let consumptions: Vec<MaterialConsumption> = consumed_quantities
                .iter()
                .map(|qty| MaterialConsumption {
                    location_id: material_store,
                    sku_id: Uuid::new_v4(),
                    quantity: *qty,
                })
                .collect();

            let plan = plan_completion_effects(hub, &produced, &consumptions);

            let mut by_location: HashMap<Uuid, i64> = HashMap::new();
            for change in &plan {
                *by_location.entry(change.location_id).or_insert(0) += change.delta;
            }

            let produced_total: i64 = produced.iter().map(|(_, qty)| qty).sum();
            let consumed_total: i64 = consumed_quantities.iter().sum();

            prop_assert_eq!(by_location.get(&hub).copied().unwrap_or(0), produced_total);
            prop_assert_eq!(
                by_location.get(&material_store).copied().unwrap_or(0),
                -consumed_total
            );

            // Zero-quantity lines never reach the ledger
            prop_assert!(plan.iter().all(|change| change.delta != 0));
        }
    }
}
