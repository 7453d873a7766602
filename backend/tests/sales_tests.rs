//! Sales order tests
//!
//! Tests for completion effects (selling-location debits) and the pricing
//! math carried onto the immutable sale records.

use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

use shared::{plan_sale_effects, TxType};

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Completion debits the selling location by each line's quantity
    #[test]
    fn test_completion_debits_selling_location() {
        let store = Uuid::new_v4();
        let (sku_a, sku_b) = (Uuid::new_v4(), Uuid::new_v4());

        let plan = plan_sale_effects(store, &[(sku_a, 3), (sku_b, 1)]);

        assert_eq!(plan.len(), 2);
        for change in &plan {
            assert_eq!(change.location_id, store);
            assert_eq!(change.tx_type, TxType::Sale);
            assert!(change.delta < 0);
        }
        assert_eq!(plan[0].delta, -3);
        assert_eq!(plan[1].delta, -1);
    }

    /// Sale record total price is unit price times quantity
    #[test]
    fn test_total_price_calculation() {
        let unit_price = dec("19.99");
        let quantity = 3i64;
        let total = unit_price * Decimal::from(quantity);

        assert_eq!(total, dec("59.97"));
    }

    /// Missing unit price leaves the total unpriced rather than zero
    #[test]
    fn test_missing_unit_price_yields_no_total() {
        let unit_price: Option<Decimal> = None;
        let total = unit_price.map(|price| price * Decimal::from(4i64));

        assert!(total.is_none());
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Strategy for unit prices with two decimal places
    fn price_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=100000).prop_map(|n| Decimal::new(n, 2))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The total debit always equals the total ordered quantity
        #[test]
        fn prop_sale_debits_sum_to_order_total(
            quantities in prop::collection::vec(1i64..500, 1..10)
        ) {
            let store = Uuid::new_v4();
            let lines: Vec<(Uuid, i64)> = quantities
                .iter()
                .map(|qty| (Uuid::new_v4(), *qty))
                .collect();

            let plan = plan_sale_effects(store, &lines);

            let total_debit: i64 = plan.iter().map(|change| change.delta).sum();
            let total_ordered: i64 = quantities.iter().sum();
            prop_assert_eq!(total_debit, -total_ordered);
            prop_assert_eq!(plan.len(), lines.len());
        }

        /// Total price scales linearly with quantity
        #[test]
        fn prop_total_price_linear(
            unit_price in price_strategy(),
            quantity in 1i64..1000
        ) {
            let total = unit_price * Decimal::from(quantity);
            prop_assert!(total > Decimal::ZERO);
            prop_assert_eq!(total, unit_price * Decimal::from(quantity));
        }
    }
}
