// SPDX-License-Identifier: MIT OR Apache-2.0
//! Field-level merging of provider bundles.

use crate::dedup::{dedup_authors, dedup_editions};
use bgw_core::{quality, BookBundle, Work};
use bgw_normalize::titles_match;

/// Merge per-provider bundles into one.
///
/// The highest-completeness bundle is the base; every other bundle, in
/// completeness order, fills fields the merged works still lack. External-ID
/// arrays and contributor sets are unioned. Editions and authors from all
/// bundles are pooled and deduplicated, and orphan editions get synthetic
/// works.
pub fn merge_bundles(mut bundles: Vec<BookBundle>) -> BookBundle {
    bundles.retain(|b| !b.is_empty());
    if bundles.is_empty() {
        return BookBundle::default();
    }
    bundles.sort_by(|a, b| {
        quality::bundle_completeness(b)
            .partial_cmp(&quality::bundle_completeness(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut iter = bundles.into_iter();
    let mut merged = iter.next().expect("at least one non-empty bundle");

    for bundle in iter {
        for other_work in &bundle.works {
            match merged
                .works
                .iter_mut()
                .find(|w| titles_match(&w.title, &other_work.title))
            {
                Some(base) => fill_work(base, other_work),
                // A work the base provider never saw.
                None => merged.works.push(other_work.clone()),
            }
        }
        merged.editions.extend(bundle.editions);
        merged.authors.extend(bundle.authors);
    }

    merged.editions = dedup_editions(merged.editions);
    merged.authors = dedup_authors(merged.authors);
    synthesize_missing_works(&mut merged);
    merged
}

/// Adopt `other`'s values for every field `base` is missing; union the
/// provenance either way.
fn fill_work(base: &mut Work, other: &Work) {
    if base.description.is_none() {
        base.description = other.description.clone();
    }
    if base.cover_url.is_none() {
        base.cover_url = other.cover_url.clone();
    }
    if base.first_publish_year.is_none() {
        base.first_publish_year = other.first_publish_year;
    }
    if base.original_language.is_none() {
        base.original_language = other.original_language.clone();
    }
    if base.isbndb_quality.is_none() {
        base.isbndb_quality = other.isbndb_quality;
    }
    if base.last_isbndb_sync.is_none() {
        base.last_isbndb_sync = other.last_isbndb_sync;
    }
    base.subject_tags
        .extend(other.subject_tags.iter().cloned());
    base.external_ids.union(&other.external_ids);
    for contributor in &other.contributors {
        base.contributors.insert(*contributor);
    }
    base.contributors.insert(other.primary_provider);
}

/// Every edition must belong to a work. Editions whose title matches no
/// work get a synthetic placeholder carrying the edition's title, year,
/// provider, and cover.
pub fn synthesize_missing_works(bundle: &mut BookBundle) {
    let mut synthesized: Vec<Work> = Vec::new();
    for edition in &bundle.editions {
        let anchored = bundle
            .works
            .iter()
            .chain(synthesized.iter())
            .any(|w| titles_match(&w.title, &edition.title));
        if !anchored {
            synthesized.push(Work::synthesize_from(edition));
        }
    }
    bundle.works.append(&mut synthesized);
}

#[cfg(test)]
mod tests {
    use super::*;
    use bgw_core::{Author, Edition, ProviderId};

    fn long_description() -> String {
        "An enduring classic of speculative imagination and political nerve. ".repeat(3)
    }

    fn openlibrary_bundle() -> BookBundle {
        let mut w = Work::new("The Dispossessed", ProviderId::OpenLibrary);
        w.first_publish_year = Some(1974);
        w.external_ids.openlibrary = Some("OL59807W".into());
        BookBundle {
            works: vec![w],
            editions: vec![],
            authors: vec![Author::new("Ursula K. Le Guin")],
        }
    }

    fn isbndb_bundle() -> BookBundle {
        let mut w = Work::new("The Dispossessed", ProviderId::Isbndb);
        w.description = Some(long_description());
        w.cover_url = Some("https://covers/dispossessed.jpg".into());
        let mut e = Edition::new("The Dispossessed", ProviderId::Isbndb);
        e.set_isbn("9780061054884");
        e.publisher = Some("Harper Voyager".into());
        BookBundle {
            works: vec![w],
            editions: vec![e],
            authors: vec![Author::new("Le Guin, Ursula K.")],
        }
    }

    #[test]
    fn merge_fills_missing_fields_from_next_provider() {
        let merged = merge_bundles(vec![openlibrary_bundle(), isbndb_bundle()]);
        assert_eq!(merged.works.len(), 1);
        let w = &merged.works[0];
        // isbndb bundle is more complete, so it is the base...
        assert_eq!(w.primary_provider, ProviderId::Isbndb);
        // ...and the OpenLibrary bundle supplied the year and external id.
        assert_eq!(w.first_publish_year, Some(1974));
        assert_eq!(w.external_ids.openlibrary.as_deref(), Some("OL59807W"));
        assert!(w.contributors.contains(&ProviderId::OpenLibrary));
        assert!(w.contributors.contains(&ProviderId::Isbndb));
    }

    #[test]
    fn authors_collapse_across_providers() {
        let merged = merge_bundles(vec![openlibrary_bundle(), isbndb_bundle()]);
        assert_eq!(merged.authors.len(), 1);
    }

    #[test]
    fn orphan_editions_get_synthetic_works() {
        let mut e = Edition::new("Only Google Knows This", ProviderId::GoogleBooks);
        e.set_isbn("9780000000002");
        e.publish_date = Some("2019".into());
        let google = BookBundle {
            works: vec![],
            editions: vec![e],
            authors: vec![],
        };

        let merged = merge_bundles(vec![google]);
        assert_eq!(merged.works.len(), 1);
        let w = &merged.works[0];
        assert!(w.synthetic);
        assert_eq!(w.first_publish_year, Some(2019));
        assert_eq!(w.primary_provider, ProviderId::GoogleBooks);
    }

    #[test]
    fn matching_edition_does_not_synthesize() {
        let merged = merge_bundles(vec![isbndb_bundle()]);
        assert_eq!(merged.works.len(), 1);
        assert!(!merged.works[0].synthetic);
    }

    #[test]
    fn unrelated_works_are_both_kept() {
        let mut other = BookBundle::default();
        other
            .works
            .push(Work::new("The Word for World Is Forest", ProviderId::OpenLibrary));
        let merged = merge_bundles(vec![isbndb_bundle(), other]);
        assert_eq!(merged.works.len(), 2);
    }

    #[test]
    fn empty_input_merges_to_empty() {
        assert!(merge_bundles(vec![]).is_empty());
        assert!(merge_bundles(vec![BookBundle::default()]).is_empty());
    }
}
