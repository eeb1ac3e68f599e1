// SPDX-License-Identifier: MIT OR Apache-2.0
//! ISBN stripping, validation, and ISBN-10 → ISBN-13 canonicalization.
//!
//! ISBN-10 and ISBN-13 identifying the same edition must collapse to one
//! dedup key, so every key-facing path goes through [`canonical_isbn13`].

/// Remove hyphens and spaces.
pub fn strip_isbn(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect()
}

/// Shape-validate a stripped ISBN: ten characters ending in a digit or `X`,
/// or thirteen digits.
pub fn is_valid_isbn(stripped: &str) -> bool {
    match stripped.len() {
        10 => {
            let (head, tail) = stripped.split_at(9);
            head.chars().all(|c| c.is_ascii_digit())
                && tail
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_digit() || c == 'X' || c == 'x')
        }
        13 => stripped.chars().all(|c| c.is_ascii_digit()),
        _ => false,
    }
}

/// Convert a valid ISBN-10 to its ISBN-13 form (`978` prefix, recomputed
/// check digit). Returns `None` for anything that is not a valid ISBN-10.
pub fn isbn10_to_isbn13(isbn10: &str) -> Option<String> {
    if isbn10.len() != 10 || !is_valid_isbn(isbn10) {
        return None;
    }
    let mut digits: Vec<u32> = Vec::with_capacity(13);
    digits.extend([9, 7, 8]);
    for c in isbn10[..9].chars() {
        digits.push(c.to_digit(10)?);
    }
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { *d } else { 3 * d })
        .sum();
    let check = (10 - (sum % 10)) % 10;
    digits.push(check);
    Some(digits.iter().map(|d| char::from_digit(*d, 10).unwrap_or('0')).collect())
}

/// Strip, validate, and canonicalize to ISBN-13.
///
/// ```
/// use bgw_normalize::canonical_isbn13;
/// assert_eq!(
///     canonical_isbn13("978-0-7432-7356-5").as_deref(),
///     Some("9780743273565")
/// );
/// assert_eq!(canonical_isbn13("0743273567").as_deref(), Some("9780743273565"));
/// assert_eq!(canonical_isbn13("not-an-isbn"), None);
/// ```
pub fn canonical_isbn13(raw: &str) -> Option<String> {
    let stripped = strip_isbn(raw);
    if !is_valid_isbn(&stripped) {
        return None;
    }
    match stripped.len() {
        13 => Some(stripped),
        10 => isbn10_to_isbn13(&stripped),
        _ => None,
    }
}
