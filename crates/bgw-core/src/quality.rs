// SPDX-License-Identifier: MIT OR Apache-2.0
//! Quality and completeness scoring.
//!
//! Two distinct scores share this module:
//!
//! * **cache quality**: `0.4*isbn + 0.4*cover + 0.2*description` averaged
//!   across the items of a bundle; feeds the quality-adjusted TTL policy.
//! * **completeness**: the weighted field-presence score used to rank
//!   provider results before merging.

use crate::book::{BookBundle, Edition, Work};

/// Description length below which a description does not count as present.
pub const MIN_DESCRIPTION_LEN: usize = 100;

// ---------------------------------------------------------------------------
// Cache quality
// ---------------------------------------------------------------------------

/// Quality of a single record from its three signal fields.
pub fn cache_quality(has_isbn: bool, has_cover: bool, description: Option<&str>) -> f64 {
    let has_desc = description.is_some_and(|d| d.len() >= MIN_DESCRIPTION_LEN);
    0.4 * f64::from(u8::from(has_isbn))
        + 0.4 * f64::from(u8::from(has_cover))
        + 0.2 * f64::from(u8::from(has_desc))
}

/// Average cache quality across a bundle's items.
///
/// Works are paired with editions by case-insensitive title equality so a
/// work inherits ISBN presence from its printings. A bundle with no works
/// scores its editions directly. An empty bundle scores 0.
pub fn bundle_quality(bundle: &BookBundle) -> f64 {
    if !bundle.works.is_empty() {
        let sum: f64 = bundle
            .works
            .iter()
            .map(|w| {
                let has_isbn = editions_of(bundle, w).any(|e| e.isbn.is_some());
                cache_quality(has_isbn, w.cover_url.is_some(), w.description.as_deref())
            })
            .sum();
        sum / bundle.works.len() as f64
    } else if !bundle.editions.is_empty() {
        let sum: f64 = bundle
            .editions
            .iter()
            .map(|e| cache_quality(e.isbn.is_some(), e.cover_url.is_some(), None))
            .sum();
        sum / bundle.editions.len() as f64
    } else {
        0.0
    }
}

fn editions_of<'a>(bundle: &'a BookBundle, work: &'a Work) -> impl Iterator<Item = &'a Edition> {
    bundle
        .editions
        .iter()
        .filter(move |e| e.title.eq_ignore_ascii_case(&work.title))
}

// ---------------------------------------------------------------------------
// Completeness
// ---------------------------------------------------------------------------

/// Completeness of one work/edition pairing.
///
/// `0.25*isbn + 0.25*cover + 0.15*publisher + 0.15*year + 0.10*pages +
/// 0.10*description`.
pub fn record_completeness(work: Option<&Work>, edition: Option<&Edition>) -> f64 {
    let has = |b: bool| f64::from(u8::from(b));

    let has_isbn = edition.is_some_and(|e| e.isbn.is_some());
    let has_cover = edition.is_some_and(|e| e.cover_url.is_some())
        || work.is_some_and(|w| w.cover_url.is_some());
    let has_publisher = edition.is_some_and(|e| e.publisher.is_some());
    let has_year = edition.is_some_and(|e| e.publish_year().is_some())
        || work.is_some_and(|w| w.first_publish_year.is_some());
    let has_pages = edition.is_some_and(|e| e.page_count.is_some());
    let has_desc = work.is_some_and(|w| {
        w.description
            .as_deref()
            .is_some_and(|d| d.len() >= MIN_DESCRIPTION_LEN)
    });

    0.25 * has(has_isbn)
        + 0.25 * has(has_cover)
        + 0.15 * has(has_publisher)
        + 0.15 * has(has_year)
        + 0.10 * has(has_pages)
        + 0.10 * has(has_desc)
}

/// Best completeness over a bundle's work/edition pairings.
pub fn bundle_completeness(bundle: &BookBundle) -> f64 {
    let mut best: f64 = 0.0;
    for work in &bundle.works {
        let paired = editions_of(bundle, work)
            .map(|e| record_completeness(Some(work), Some(e)))
            .fold(f64::NAN, f64::max);
        let score = if paired.is_nan() {
            record_completeness(Some(work), None)
        } else {
            paired
        };
        best = best.max(score);
    }
    for edition in &bundle.editions {
        if bundle.works.is_empty() {
            best = best.max(record_completeness(None, Some(edition)));
        }
    }
    best
}

/// High-completeness gate used by the fan-out short-circuit: the result must
/// carry an ISBN, a cover, and a real description.
pub fn is_high_completeness(bundle: &BookBundle) -> bool {
    let has_isbn = bundle.editions.iter().any(|e| e.isbn.is_some());
    let has_cover = bundle.works.iter().any(|w| w.cover_url.is_some())
        || bundle.editions.iter().any(|e| e.cover_url.is_some());
    let has_desc = bundle.works.iter().any(|w| {
        w.description
            .as_deref()
            .is_some_and(|d| d.len() >= MIN_DESCRIPTION_LEN)
    });
    has_isbn && has_cover && has_desc
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::ProviderId;

    fn long_description() -> String {
        "A sweeping tale of ambition and loss. ".repeat(4)
    }

    #[test]
    fn cache_quality_weights() {
        assert_eq!(cache_quality(false, false, None), 0.0);
        assert!((cache_quality(true, false, None) - 0.4).abs() < 1e-9);
        assert!((cache_quality(true, true, None) - 0.8).abs() < 1e-9);
        let desc = long_description();
        assert!((cache_quality(true, true, Some(&desc)) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn short_description_does_not_count() {
        assert_eq!(cache_quality(false, false, Some("terse")), 0.0);
    }

    #[test]
    fn bundle_quality_averages_works() {
        let mut rich = Work::new("Rich", ProviderId::GoogleBooks);
        rich.cover_url = Some("u".into());
        rich.description = Some(long_description());
        let poor = Work::new("Poor", ProviderId::GoogleBooks);
        let mut edition = Edition::new("Rich", ProviderId::GoogleBooks);
        edition.set_isbn("9780000000002");

        let bundle = BookBundle {
            works: vec![rich, poor],
            editions: vec![edition],
            authors: vec![],
        };
        // Rich scores 1.0, Poor scores 0.0.
        assert!((bundle_quality(&bundle) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn empty_bundle_scores_zero() {
        assert_eq!(bundle_quality(&BookBundle::default()), 0.0);
        assert_eq!(bundle_completeness(&BookBundle::default()), 0.0);
    }

    #[test]
    fn completeness_full_record_scores_one() {
        let mut w = Work::new("Gatsby", ProviderId::GoogleBooks);
        w.cover_url = Some("u".into());
        w.description = Some(long_description());
        let mut e = Edition::new("Gatsby", ProviderId::GoogleBooks);
        e.set_isbn("9780743273565");
        e.publisher = Some("Scribner".into());
        e.publish_date = Some("2004-09-30".into());
        e.page_count = Some(180);
        assert!((record_completeness(Some(&w), Some(&e)) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn completeness_edition_only() {
        let mut e = Edition::new("Bare", ProviderId::Isbndb);
        e.set_isbn("9780000000019");
        // isbn only: 0.25
        assert!((record_completeness(None, Some(&e)) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn high_completeness_requires_all_three() {
        let mut w = Work::new("Gatsby", ProviderId::GoogleBooks);
        w.cover_url = Some("u".into());
        w.description = Some(long_description());
        let mut e = Edition::new("Gatsby", ProviderId::GoogleBooks);
        e.set_isbn("9780743273565");
        let bundle = BookBundle {
            works: vec![w.clone()],
            editions: vec![e],
            authors: vec![],
        };
        assert!(is_high_completeness(&bundle));

        let no_isbn = BookBundle {
            works: vec![w],
            editions: vec![],
            authors: vec![],
        };
        assert!(!is_high_completeness(&no_isbn));
    }
}
