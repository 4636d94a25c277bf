//! Property-based tests for phone number normalization
//!
//! Normalization is a best-effort heuristic, so the properties pin down what
//! it must never do (emit non-digits, lose digits it did not replace) and the
//! shapes it must always produce for well-formed local numbers.

use proptest::prelude::*;

use super::dispatcher::normalize_number;

proptest! {
    /// Property: the output is always a bare digit string, whatever the input.
    #[test]
    fn output_contains_only_digits(raw in ".*") {
        let normalized = normalize_number(&raw, "92");
        prop_assert!(normalized.chars().all(|c| c.is_ascii_digit()));
    }

    /// Property: formatting characters never change the result.
    #[test]
    fn formatting_is_irrelevant(digits in "[0-9]{7,14}") {
        let spaced = digits
            .chars()
            .map(|c| format!("{c} "))
            .collect::<String>();
        let decorated = format!("+({spaced})-");

        prop_assert_eq!(
            normalize_number(&decorated, "92"),
            normalize_number(&digits, "92")
        );
    }

    /// Property: a trunk-prefixed number always comes back with the trunk
    /// zero replaced by the country code.
    #[test]
    fn trunk_prefix_is_replaced(rest in "[1-9][0-9]{9}") {
        let raw = format!("0{rest}");
        prop_assert_eq!(normalize_number(&raw, "92"), format!("92{rest}"));
    }

    /// Property: a bare 10-digit local number is always country-prefixed.
    #[test]
    fn bare_local_number_is_prefixed(digits in "[1-9][0-9]{9}") {
        prop_assert_eq!(normalize_number(&digits, "92"), format!("92{digits}"));
    }

    /// Property: normalization is idempotent for trunk-prefixed and bare
    /// local numbers.
    #[test]
    fn normalization_is_idempotent(rest in "[1-9][0-9]{9}") {
        let raw = format!("0{rest}");
        let once = normalize_number(&raw, "92");
        prop_assert_eq!(normalize_number(&once, "92"), once);
    }
}
