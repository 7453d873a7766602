//! Workflow status machine tests
//!
//! Tests for the generic transition machinery and each of the five
//! per-entity transition tables: legal chains, rejected jumps, terminal
//! states, and same-status rejection.

use proptest::prelude::*;

use shared::{
    can_transition, validate_transition, ProductionStatus, PurchaseOrderStatus, RestockStatus,
    SalesOrderStatus, ShipmentStatus, TransitionError, WorkflowState,
};

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_shipment_transitions() {
        use ShipmentStatus::*;

        assert_eq!(ShipmentStatus::initial(), Pending);

        assert!(can_transition(Pending, Shipped));
        assert!(can_transition(Shipped, Received));
        assert!(can_transition(Pending, Cancelled));
        assert!(can_transition(Shipped, Cancelled));

        // No skipping, no going back, nothing out of a terminal state
        assert!(!can_transition(Pending, Received));
        assert!(!can_transition(Shipped, Pending));
        assert!(!can_transition(Received, Cancelled));
        assert!(!can_transition(Cancelled, Pending));

        assert!(Received.is_terminal());
        assert!(Cancelled.is_terminal());
        assert!(!Pending.is_terminal());
        assert!(!Shipped.is_terminal());
    }

    #[test]
    fn test_restock_transitions() {
        use RestockStatus::*;

        assert_eq!(RestockStatus::initial(), Draft);

        assert!(can_transition(Draft, Approved));
        assert!(can_transition(Approved, Ordered));
        assert!(can_transition(Ordered, Received));
        assert!(can_transition(Draft, Cancelled));
        assert!(can_transition(Approved, Cancelled));
        assert!(can_transition(Ordered, Cancelled));

        assert!(!can_transition(Draft, Ordered));
        assert!(!can_transition(Draft, Received));
        assert!(!can_transition(Received, Cancelled));
        assert!(!can_transition(Cancelled, Draft));

        assert!(Received.is_terminal());
        assert!(Cancelled.is_terminal());
    }

    #[test]
    fn test_purchase_order_transitions() {
        use PurchaseOrderStatus::*;

        assert_eq!(PurchaseOrderStatus::initial(), Draft);

        assert!(can_transition(Draft, Confirmed));
        assert!(can_transition(Confirmed, Shipped));
        assert!(can_transition(Shipped, Received));
        assert!(can_transition(Draft, Cancelled));
        assert!(can_transition(Confirmed, Cancelled));
        assert!(can_transition(Shipped, Cancelled));

        assert!(!can_transition(Draft, Shipped));
        assert!(!can_transition(Confirmed, Received));
        assert!(!can_transition(Received, Shipped));
        assert!(!can_transition(Cancelled, Confirmed));

        assert!(Received.is_terminal());
        assert!(Cancelled.is_terminal());
    }

    #[test]
    fn test_production_transitions() {
        use ProductionStatus::*;

        assert_eq!(ProductionStatus::initial(), Draft);

        assert!(can_transition(Draft, Confirmed));
        assert!(can_transition(Confirmed, InProduction));
        assert!(can_transition(InProduction, Completed));
        assert!(can_transition(Draft, Cancelled));
        assert!(can_transition(Confirmed, Cancelled));
        assert!(can_transition(InProduction, Cancelled));

        assert!(!can_transition(Draft, InProduction));
        assert!(!can_transition(Confirmed, Completed));
        assert!(!can_transition(Completed, Cancelled));
        assert!(!can_transition(Cancelled, Draft));

        assert!(Completed.is_terminal());
        assert!(Cancelled.is_terminal());
    }

    #[test]
    fn test_sales_order_transitions() {
        use SalesOrderStatus::*;

        assert_eq!(SalesOrderStatus::initial(), Pending);

        assert!(can_transition(Pending, Confirmed));
        assert!(can_transition(Confirmed, Processing));
        assert!(can_transition(Processing, Completed));
        assert!(can_transition(Pending, Cancelled));
        assert!(can_transition(Confirmed, Cancelled));
        assert!(can_transition(Processing, Cancelled));

        assert!(!can_transition(Pending, Processing));
        assert!(!can_transition(Pending, Completed));
        assert!(!can_transition(Completed, Cancelled));
        assert!(!can_transition(Cancelled, Pending));

        assert!(Completed.is_terminal());
        assert!(Cancelled.is_terminal());
    }

    /// A same-status request gets its own error, distinct from a disallowed
    /// pair
    #[test]
    fn test_same_status_rejected() {
        let err = validate_transition(ShipmentStatus::Shipped, ShipmentStatus::Shipped)
            .unwrap_err();
        assert!(matches!(err, TransitionError::AlreadyInStatus { .. }));

        let err = validate_transition(ShipmentStatus::Received, ShipmentStatus::Shipped)
            .unwrap_err();
        assert!(matches!(err, TransitionError::NotAllowed { .. }));
    }

    /// Error messages carry the workflow name and the offending statuses
    #[test]
    fn test_transition_error_messages() {
        let err = validate_transition(RestockStatus::Draft, RestockStatus::Received)
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Restock request"));
        assert!(message.contains("draft"));
        assert!(message.contains("received"));
    }

    /// Cancellation is reachable from every non-terminal state, for every
    /// workflow type
    #[test]
    fn test_cancel_reachable_from_all_non_terminal_states() {
        fn check<S: WorkflowState + std::fmt::Debug>(all: &[S], cancelled: S) {
            for status in all {
                if !status.is_terminal() {
                    assert!(
                        can_transition(*status, cancelled),
                        "{:?} should be cancellable",
                        status
                    );
                }
            }
        }

        check(
            &[
                ShipmentStatus::Pending,
                ShipmentStatus::Shipped,
                ShipmentStatus::Received,
                ShipmentStatus::Cancelled,
            ],
            ShipmentStatus::Cancelled,
        );
        check(
            &[
                RestockStatus::Draft,
                RestockStatus::Approved,
                RestockStatus::Ordered,
                RestockStatus::Received,
                RestockStatus::Cancelled,
            ],
            RestockStatus::Cancelled,
        );
        check(
            &[
                PurchaseOrderStatus::Draft,
                PurchaseOrderStatus::Confirmed,
                PurchaseOrderStatus::Shipped,
                PurchaseOrderStatus::Received,
                PurchaseOrderStatus::Cancelled,
            ],
            PurchaseOrderStatus::Cancelled,
        );
        check(
            &[
                ProductionStatus::Draft,
                ProductionStatus::Confirmed,
                ProductionStatus::InProduction,
                ProductionStatus::Completed,
                ProductionStatus::Cancelled,
            ],
            ProductionStatus::Cancelled,
        );
        check(
            &[
                SalesOrderStatus::Pending,
                SalesOrderStatus::Confirmed,
                SalesOrderStatus::Processing,
                SalesOrderStatus::Completed,
                SalesOrderStatus::Cancelled,
            ],
            SalesOrderStatus::Cancelled,
        );
    }

    /// Status strings round-trip through as_str/from_str
    #[test]
    fn test_status_string_round_trip() {
        for status in [
            ShipmentStatus::Pending,
            ShipmentStatus::Shipped,
            ShipmentStatus::Received,
            ShipmentStatus::Cancelled,
        ] {
            assert_eq!(ShipmentStatus::from_str(status.as_str()), Some(status));
        }
        for status in [
            ProductionStatus::Draft,
            ProductionStatus::Confirmed,
            ProductionStatus::InProduction,
            ProductionStatus::Completed,
            ProductionStatus::Cancelled,
        ] {
            assert_eq!(ProductionStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(ShipmentStatus::from_str("bogus"), None);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn shipment_status_strategy() -> impl Strategy<Value = ShipmentStatus> {
        prop_oneof![
            Just(ShipmentStatus::Pending),
            Just(ShipmentStatus::Shipped),
            Just(ShipmentStatus::Received),
            Just(ShipmentStatus::Cancelled),
        ]
    }

    fn sales_status_strategy() -> impl Strategy<Value = SalesOrderStatus> {
        prop_oneof![
            Just(SalesOrderStatus::Pending),
            Just(SalesOrderStatus::Confirmed),
            Just(SalesOrderStatus::Processing),
            Just(SalesOrderStatus::Completed),
            Just(SalesOrderStatus::Cancelled),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// validate_transition accepts exactly the listed pairs
        #[test]
        fn prop_validate_matches_table(
            from in shipment_status_strategy(),
            to in shipment_status_strategy()
        ) {
            let listed = ShipmentStatus::transitions()
                .iter()
                .any(|(f, t)| *f == from && *t == to);
            let accepted = validate_transition(from, to).is_ok();

            prop_assert_eq!(accepted, listed && from != to);
        }

        /// Terminal states never validate as a source
        #[test]
        fn prop_terminal_states_are_dead_ends(
            from in sales_status_strategy(),
            to in sales_status_strategy()
        ) {
            if from.is_terminal() {
                prop_assert!(validate_transition(from, to).is_err());
            }
        }
    }
}
