// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property tests for the normalizer and key-factory round-trip laws.

use bgw_normalize::{cache_key, canonical_isbn13, normalize_author, normalize_title, Fingerprint};
use proptest::prelude::*;

/// ISBN-10 check digit for nine leading digits (`10` renders as `X`).
fn isbn10_check(digits: &[u8; 9]) -> char {
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| (i as u32 + 1) * u32::from(*d))
        .sum();
    match sum % 11 {
        10 => 'X',
        d => char::from_digit(d, 10).unwrap(),
    }
}

proptest! {
    #[test]
    fn title_normalization_is_idempotent(title in ".{0,64}") {
        let once = normalize_title(&title);
        prop_assert_eq!(normalize_title(&once), once.clone());
    }

    #[test]
    fn author_normalization_is_idempotent(name in "[a-zA-Z,. ]{0,48}") {
        let once = normalize_author(&name);
        prop_assert_eq!(normalize_author(&once), once.clone());
    }

    #[test]
    fn title_keys_ignore_casing(title in "[a-zA-Z ]{1,40}") {
        let upper = normalize_title(&title.to_uppercase());
        let lower = normalize_title(&title.to_lowercase());
        prop_assert_eq!(upper, lower);
    }

    #[test]
    fn key_is_order_independent(
        title in "[a-z ]{1,30}",
        author in "[a-z ]{1,30}",
        max in 1u32..40,
    ) {
        let forward = Fingerprint::new()
            .with("title", normalize_title(&title))
            .with("author", normalize_author(&author))
            .with("maxResults", max.to_string());
        let backward = Fingerprint::new()
            .with("maxResults", max.to_string())
            .with("author", normalize_author(&author))
            .with("title", normalize_title(&title));
        prop_assert_eq!(
            cache_key("v1:advanced", &forward),
            cache_key("v1:advanced", &backward)
        );
    }

    #[test]
    fn isbn_canonicalization_is_idempotent(digits in proptest::array::uniform9(0u8..10)) {
        let isbn10: String = digits
            .iter()
            .map(|d| char::from_digit(u32::from(*d), 10).unwrap())
            .chain(std::iter::once(isbn10_check(&digits)))
            .collect();
        let first = canonical_isbn13(&isbn10).expect("generated ISBN-10 must canonicalize");
        let second = canonical_isbn13(&first).expect("ISBN-13 must re-canonicalize");
        prop_assert_eq!(first, second);
    }

    #[test]
    fn ten_and_thirteen_digit_forms_collapse(digits in proptest::array::uniform9(0u8..10)) {
        let isbn10: String = digits
            .iter()
            .map(|d| char::from_digit(u32::from(*d), 10).unwrap())
            .chain(std::iter::once(isbn10_check(&digits)))
            .collect();
        let from10 = canonical_isbn13(&isbn10).unwrap();
        // Re-render the 13-digit form with hyphens; it must land on the same key.
        let hyphenated = format!(
            "{}-{}-{}",
            &from10[..3],
            &from10[3..9],
            &from10[9..]
        );
        prop_assert_eq!(canonical_isbn13(&hyphenated).unwrap(), from10);
    }
}
