// SPDX-License-Identifier: MIT OR Apache-2.0
//! Canonicalization of the fields cache keys and dedup decisions hang off:
//! titles, author names, ISBNs, and genre tags.
//!
//! Every function here is pure. The key factory guarantees that any
//! permutation, casing, or punctuation variant of the same logical query
//! produces the same cache key; the warming consumer and the live search
//! endpoints both rely on that.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod genre;
mod isbn;
mod keys;
mod similarity;
mod text;

pub use genre::normalize_subject;
pub use isbn::{canonical_isbn13, is_valid_isbn, isbn10_to_isbn13, strip_isbn};
pub use keys::{cache_key, Fingerprint};
pub use similarity::titles_match;
pub use text::{normalize_author, normalize_title};
