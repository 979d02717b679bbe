//! Property-based tests for the VSL sync core.
//!
//! Uses proptest to generate random address sets and append sequences,
//! verifying the structural guarantees that the unit tests only probe
//! with fixtures: component-wise ancestry and the minimal-covering-set
//! property of change log compaction.

use proptest::prelude::*;

use vsl_core::{address, ChangeLog, INITIAL_LOGPOINT};

/// Strategy: a well-formed address of 1..=4 components drawn from a
/// small alphabet, so ancestor/descendant and shared-prefix collisions
/// (`/1/3` vs `/1/32`) actually happen.
fn arb_address() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just("1".to_string()),
            Just("2".to_string()),
            Just("3".to_string()),
            Just("32".to_string()),
            Just("a".to_string()),
            Just("ab".to_string()),
        ],
        1..=4,
    )
    .prop_map(|components| format!("/{}", components.join("/")))
}

/// Reference ancestry: component sequence prefix.
fn components_prefix(ancestor: &str, addr: &str) -> bool {
    let a: Vec<&str> = address::components(ancestor).collect();
    let b: Vec<&str> = address::components(addr).collect();
    a.len() <= b.len() && a.iter().zip(&b).all(|(x, y)| x == y)
}

proptest! {
    #[test]
    fn ancestry_matches_component_prefix_semantics(
        a in arb_address(),
        b in arb_address(),
    ) {
        prop_assert_eq!(
            address::is_ancestor_or_self(&a, &b),
            components_prefix(&a, &b)
        );
    }

    #[test]
    fn ancestry_is_never_plain_string_prefixing(addr in arb_address()) {
        // Appending characters without a separator never forms a child.
        let not_a_child = format!("{addr}2");
        prop_assert!(!address::is_ancestor_or_self(&addr, &not_a_child));
        // Appending a component always does.
        let child = address::child_address(&addr, "x");
        prop_assert!(address::is_strict_ancestor(&addr, &child));
    }

    #[test]
    fn compaction_returns_a_minimal_covering_set(
        appends in prop::collection::vec(arb_address(), 0..24),
    ) {
        let log = ChangeLog::new();
        for addr in &appends {
            log.log_changed_address(addr);
        }
        let result = log.changes_since(INITIAL_LOGPOINT).unwrap();

        // Covering: every appended address has an ancestor-or-self in
        // the result.
        for addr in &appends {
            prop_assert!(
                result.iter().any(|kept| address::is_ancestor_or_self(kept, addr)),
                "{} not covered by {:?}", addr, result
            );
        }

        // Minimal: no result element covers another, and no duplicates.
        for (i, a) in result.iter().enumerate() {
            for (j, b) in result.iter().enumerate() {
                if i != j {
                    prop_assert!(!address::is_ancestor_or_self(a, b));
                }
            }
        }

        // Sound: every result element was actually appended.
        for kept in &result {
            prop_assert!(appends.contains(kept));
        }
    }

    #[test]
    fn compaction_preserves_first_occurrence_order(
        appends in prop::collection::vec(arb_address(), 0..24),
    ) {
        let log = ChangeLog::new();
        for addr in &appends {
            log.log_changed_address(addr);
        }
        let result = log.changes_since(INITIAL_LOGPOINT).unwrap();

        let first_position = |addr: &String| {
            appends.iter().position(|a| a == addr).unwrap()
        };
        for window in result.windows(2) {
            prop_assert!(first_position(&window[0]) < first_position(&window[1]));
        }
    }

    #[test]
    fn delta_after_final_checkpoint_is_always_empty(
        appends in prop::collection::vec(arb_address(), 0..16),
    ) {
        let log = ChangeLog::new();
        for addr in &appends {
            log.log_changed_address(addr);
        }
        log.new_logpoint("end");
        prop_assert!(log.changes_since("end").unwrap().is_empty());
    }
}
