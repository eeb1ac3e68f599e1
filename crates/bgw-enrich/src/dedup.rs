// SPDX-License-Identifier: MIT OR Apache-2.0
//! Edition and author deduplication.

use bgw_core::{quality, Author, Edition};
use bgw_normalize::{normalize_author, normalize_title};
use std::collections::HashMap;

/// Deduplicate editions by canonical ISBN-13, keeping the highest-quality
/// edition per group, then sort by format priority, `isbndb_quality`
/// descending, and publication date descending.
///
/// Editions without an ISBN group by normalized title instead so distinct
/// ISBN-less printings survive.
pub fn dedup_editions(editions: Vec<Edition>) -> Vec<Edition> {
    let mut groups: HashMap<String, Edition> = HashMap::new();
    for edition in editions {
        let key = match &edition.isbn {
            Some(isbn) => format!("isbn:{isbn}"),
            None => format!("title:{}", normalize_title(&edition.title)),
        };
        match groups.get_mut(&key) {
            None => {
                groups.insert(key, edition);
            }
            Some(existing) => {
                if edition_quality(&edition) > edition_quality(existing) {
                    // Keep the richer record but remember every ISBN seen.
                    let mut replacement = edition;
                    for isbn in &existing.isbns {
                        replacement.add_isbn(isbn.clone());
                    }
                    *existing = replacement;
                } else {
                    for isbn in edition.isbns {
                        existing.add_isbn(isbn);
                    }
                }
            }
        }
    }

    let mut deduped: Vec<Edition> = groups.into_values().collect();
    deduped.sort_by(|a, b| {
        a.format
            .priority()
            .cmp(&b.format.priority())
            .then_with(|| b.isbndb_quality.unwrap_or(0).cmp(&a.isbndb_quality.unwrap_or(0)))
            .then_with(|| b.publish_date.cmp(&a.publish_date))
    });
    deduped
}

fn edition_quality(edition: &Edition) -> f64 {
    quality::record_completeness(None, Some(edition))
}

/// Deduplicate authors under name normalization, merging external ids and
/// preserving life dates wherever they are present.
pub fn dedup_authors(authors: Vec<Author>) -> Vec<Author> {
    let mut order: Vec<String> = Vec::new();
    let mut merged: HashMap<String, Author> = HashMap::new();
    for author in authors {
        let key = normalize_author(&author.name);
        if key.is_empty() {
            continue;
        }
        match merged.get_mut(&key) {
            None => {
                order.push(key.clone());
                merged.insert(key, author);
            }
            Some(existing) => existing.merge(&author),
        }
    }
    order
        .into_iter()
        .filter_map(|key| merged.remove(&key))
        .collect()
}
