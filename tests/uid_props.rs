use kube_graph::graph::derive_uid;
use proptest::prelude::*;

// Bottom-up property-based tests: identifier derivation over random samples
proptest! {
    // Same identifying tuple, same identifier, always
    #[test]
    fn derive_uid_is_deterministic(parts in prop::collection::vec("[a-z0-9]{1,12}", 1..5)) {
        prop_assert_eq!(derive_uid(&parts), derive_uid(&parts));
    }

    // Distinct tuples give distinct identifiers (separator-free parts, so
    // the joined representations cannot coincide)
    #[test]
    fn derive_uid_distinguishes_tuples(
        a in prop::collection::vec("[a-z0-9]{1,12}", 1..5),
        b in prop::collection::vec("[a-z0-9]{1,12}", 1..5),
    ) {
        prop_assume!(a != b);
        prop_assert_ne!(derive_uid(&a), derive_uid(&b));
    }

    // The rendered identifier always uses the 8-4-4-4-12 hex grouping
    #[test]
    fn derive_uid_layout_is_canonical(parts in prop::collection::vec(".*", 0..4)) {
        let uid = derive_uid(&parts);
        let lens: Vec<usize> = uid.0.split('-').map(str::len).collect();
        prop_assert_eq!(lens, vec![8, 4, 4, 4, 12]);
        prop_assert!(uid.0.chars().all(|c| c.is_ascii_hexdigit() || c == '-'));
    }
}
