// tests/property/delta_test.rs

//! Property-based tests for value deltas recorded by the ledger.

use currencydb::core::storage::{AppendOutcome, LedgerStore, MemoryLedger, ValueDelta};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 100,
        max_shrink_iters: 1000,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_history_matches_appended_values(
        values in proptest::collection::vec(-1.0e6f64..1.0e6, 1..40)
    ) {
        let ledger = MemoryLedger::in_memory();
        ledger.add("XAU").unwrap();
        for value in &values {
            let outcome = ledger.append_value("XAU", *value).unwrap();
            prop_assert!(matches!(outcome, AppendOutcome::Updated(_)));
        }

        let history = ledger.history("XAU").unwrap().unwrap();
        let recorded: Vec<f64> = history.iter().map(|p| p.value.unwrap()).collect();
        prop_assert_eq!(recorded, values.clone());

        let current = &ledger.list().unwrap()[0];
        prop_assert_eq!(current.value, values.last().copied());
    }

    #[test]
    fn test_delta_is_consistent(previous in -1.0e6f64..1.0e6, value in -1.0e6f64..1.0e6) {
        let delta = ValueDelta::between(Some(previous), value);
        let absolute = delta.absolute.unwrap();
        prop_assert!((previous + absolute - value).abs() <= 1e-6 * value.abs().max(1.0));

        match delta.relative {
            Some(relative) => {
                prop_assert!(previous != 0.0);
                prop_assert!((relative * previous - absolute).abs() <= 1e-6 * absolute.abs().max(1.0));
            }
            None => prop_assert_eq!(previous, 0.0),
        }
    }

    #[test]
    fn test_first_value_has_no_delta(value in any::<f64>().prop_filter("finite", |v| v.is_finite())) {
        let delta = ValueDelta::between(None, value);
        prop_assert!(delta.is_initial());
        prop_assert_eq!(delta.absolute, None);
        prop_assert_eq!(delta.relative, None);
    }
}
