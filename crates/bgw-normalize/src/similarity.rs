// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fuzzy title matching for the editions search path.

use crate::text::normalize_title;

/// Similarity floor below which two titles are considered different works.
const TITLE_SIMILARITY_THRESHOLD: f64 = 0.70;

/// Accept two titles as the same work when their normalized forms are
/// equal, one contains the other, or Levenshtein similarity is ≥ 0.70.
///
/// ```
/// use bgw_normalize::titles_match;
/// assert!(titles_match("The Hobbit", "Hobbit"));
/// assert!(titles_match("The Hobbit", "The Hobbit: or There and Back Again"));
/// assert!(!titles_match("The Hobbit", "Dune"));
/// ```
pub fn titles_match(a: &str, b: &str) -> bool {
    let na = normalize_title(a);
    let nb = normalize_title(b);
    if na.is_empty() || nb.is_empty() {
        return false;
    }
    if na == nb || na.contains(&nb) || nb.contains(&na) {
        return true;
    }
    strsim::normalized_levenshtein(&na, &nb) >= TITLE_SIMILARITY_THRESHOLD
}
