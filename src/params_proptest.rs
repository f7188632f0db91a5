//! Property-based tests for the expression grammar.
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold for all possible inputs.

#[cfg(test)]
mod proptest_tests {
    use crate::params::{parse_expression, parse_params};
    use crate::target::parse_literal;
    use proptest::prelude::*;

    proptest! {
        /// Property: plain key=value lists round-trip into the map unchanged
        #[test]
        fn params_extract_plain_pairs(
            pairs in proptest::collection::btree_map("[a-z][a-z0-9_]{0,8}", "[A-Za-z0-9._/-]{0,12}", 0..6)
        ) {
            let list = pairs
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(",");
            let parsed = parse_params(&list).unwrap();
            prop_assert_eq!(parsed, pairs);
        }

        /// Property: single-quoted values may contain commas and parentheses
        #[test]
        fn quoted_values_survive(value in "[A-Za-z0-9 ,()=.-]{0,20}") {
            let list = format!("key='{}'", value);
            let parsed = parse_params(&list).unwrap();
            prop_assert_eq!(parsed.get("key"), Some(&value));
        }

        /// Property: parsing never panics on arbitrary input
        #[test]
        fn parse_expression_never_panics(input in ".*") {
            let _ = parse_expression(&input, "updater");
        }

        /// Property: repository literals extract owner, name and params exactly
        #[test]
        fn repository_literal_extracts_parts(
            owner in "[A-Za-z0-9][A-Za-z0-9-]{0,10}",
            name in "[A-Za-z0-9_.-]{1,12}",
            v1 in "[a-z0-9]{1,6}",
            v2 in "[a-z0-9]{1,6}",
        ) {
            let spec = format!("{}/{}(k1={},k2={})", owner, name, v1, v2);
            let target = parse_literal(&spec).unwrap();
            prop_assert_eq!(&target.owner, &owner);
            prop_assert_eq!(&target.name, &name);
            prop_assert_eq!(target.params.len(), 2);
            prop_assert_eq!(&target.params["k1"], &v1);
            prop_assert_eq!(&target.params["k2"], &v2);
        }

        /// Property: anything with zero or several slashes is rejected
        #[test]
        fn repository_literal_requires_one_slash(parts in proptest::collection::vec("[a-z]{1,5}", 1..5)) {
            let spec = parts.join("/");
            let result = parse_literal(&spec);
            if parts.len() == 2 {
                prop_assert!(result.is_ok());
            } else {
                prop_assert!(result.is_err());
            }
        }
    }
}
