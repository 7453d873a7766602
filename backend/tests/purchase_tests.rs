//! Purchase order tests
//!
//! Tests for partial receipts: cumulative per-line bounds, destination
//! credits per delivered delta, and the auto-advance rule that an order
//! only reaches RECEIVED once every line covers its ordered quantity.

use proptest::prelude::*;
use uuid::Uuid;

use shared::{
    is_fully_received, plan_purchase_receipt_effects, receipt_increment, TxType,
};

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_receipt_increment_within_bound() {
        assert_eq!(receipt_increment(10, 0, 4), Ok(4));
        assert_eq!(receipt_increment(10, 4, 6), Ok(10));
    }

    #[test]
    fn test_receipt_increment_rejects_over_receipt() {
        assert!(receipt_increment(10, 8, 3).is_err());
        assert!(receipt_increment(10, 10, 1).is_err());
    }

    #[test]
    fn test_receipt_increment_rejects_non_positive() {
        assert!(receipt_increment(10, 0, 0).is_err());
        assert!(receipt_increment(10, 0, -2).is_err());
    }

    /// One line fully received, one partially: the order is not yet received
    #[test]
    fn test_partially_received_order_stays_open() {
        let lines = [(10, 10), (10, 4)];
        assert!(!is_fully_received(&lines));

        let lines = [(10, 10), (10, 10)];
        assert!(is_fully_received(&lines));
    }

    #[test]
    fn test_untouched_order_not_received() {
        let lines = [(5, 0), (3, 0)];
        assert!(!is_fully_received(&lines));
    }

    /// Receipts credit the destination with purchase_receipt entries
    #[test]
    fn test_receipt_effects_credit_destination() {
        let destination = Uuid::new_v4();
        let (sku_a, sku_b) = (Uuid::new_v4(), Uuid::new_v4());

        let plan = plan_purchase_receipt_effects(destination, &[(sku_a, 4), (sku_b, 2)]);

        assert_eq!(plan.len(), 2);
        for change in &plan {
            assert_eq!(change.location_id, destination);
            assert_eq!(change.tx_type, TxType::PurchaseReceipt);
            assert!(change.delta > 0);
        }
        assert_eq!(plan[0].delta, 4);
        assert_eq!(plan[1].delta, 2);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Splitting a delivery into any sequence of partial receipts lands
        /// exactly on the ordered quantity, and only the final receipt
        /// completes the line
        #[test]
        fn prop_partial_receipts_sum_to_order(
            chunks in prop::collection::vec(1i64..50, 1..10)
        ) {
            let order_qty: i64 = chunks.iter().sum();
            let mut received = 0i64;

            for (i, chunk) in chunks.iter().enumerate() {
                let complete_before = is_fully_received(&[(order_qty, received)]);
                prop_assert!(!complete_before);

                received = receipt_increment(order_qty, received, *chunk).unwrap();

                let is_last = i == chunks.len() - 1;
                prop_assert_eq!(is_fully_received(&[(order_qty, received)]), is_last);
            }

            prop_assert_eq!(received, order_qty);
        }

        /// A receipt that would exceed the ordered quantity is always
        /// rejected and leaves the cumulative count unchanged
        #[test]
        fn prop_over_receipt_always_rejected(
            order_qty in 1i64..1000,
            received in 0i64..1000,
            delta in 1i64..1000
        ) {
            let received = received.min(order_qty);
            let result = receipt_increment(order_qty, received, delta);

            if received + delta > order_qty {
                prop_assert!(result.is_err());
            } else {
                prop_assert_eq!(result, Ok(received + delta));
            }
        }

        /// An order is fully received exactly when every line is
        #[test]
        fn prop_fully_received_is_conjunction(
            lines in prop::collection::vec((1i64..100, 0i64..100), 1..8)
        ) {
            let lines: Vec<(i64, i64)> = lines
                .into_iter()
                .map(|(order_qty, received)| (order_qty, received.min(order_qty)))
                .collect();

            let expected = lines.iter().all(|(order_qty, received)| received >= order_qty);
            prop_assert_eq!(is_fully_received(&lines), expected);
        }
    }
}
