// SPDX-License-Identifier: MIT OR Apache-2.0
//! Canonical Work / Edition / Author DTOs and their provenance metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ---------------------------------------------------------------------------
// ProviderId
// ---------------------------------------------------------------------------

/// The external metadata providers the gateway orchestrates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderId {
    /// Google Books volumes API.
    GoogleBooks,
    /// OpenLibrary works/editions API.
    OpenLibrary,
    /// ISBNdb book API.
    Isbndb,
}

impl ProviderId {
    /// Stable string form used in cache metadata and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GoogleBooks => "google-books",
            Self::OpenLibrary => "openlibrary",
            Self::Isbndb => "isbndb",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Review metadata
// ---------------------------------------------------------------------------

/// Human-review state of an AI-detected or user-edited record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReviewStatus {
    /// Confirmed by enrichment or a human.
    #[default]
    Verified,
    /// Low-confidence detection awaiting review.
    NeedsReview,
    /// Manually corrected by a user; wins over provider data.
    UserEdited,
}

/// Normalized spine bounding box from an AI shelf scan.
///
/// Coordinates are fractions of the source image; all four values are
/// clamped to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Clamp every coordinate into the unit interval.
    pub fn clamp_unit(self) -> Self {
        let c = |v: f64| v.clamp(0.0, 1.0);
        Self {
            x: c(self.x),
            y: c(self.y),
            width: c(self.width),
            height: c(self.height),
        }
    }
}

// ---------------------------------------------------------------------------
// External IDs
// ---------------------------------------------------------------------------

/// Identifiers a Work carries in other catalogues.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkExternalIds {
    /// Goodreads work ids.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub goodreads: Vec<String>,
    /// Amazon ASINs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub amazon_asins: Vec<String>,
    /// LibraryThing work ids.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub librarything: Vec<String>,
    /// Google Books volume ids.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub google_volumes: Vec<String>,
    /// Legacy OpenLibrary work key (e.g. `OL45804W`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openlibrary: Option<String>,
    /// Legacy ISBNdb record id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbndb: Option<String>,
}

impl WorkExternalIds {
    /// Union `other` into `self`, deduplicating array ids and keeping
    /// existing scalar ids.
    pub fn union(&mut self, other: &WorkExternalIds) {
        fn merge(into: &mut Vec<String>, from: &[String]) {
            for id in from {
                if !into.iter().any(|x| x == id) {
                    into.push(id.clone());
                }
            }
        }
        merge(&mut self.goodreads, &other.goodreads);
        merge(&mut self.amazon_asins, &other.amazon_asins);
        merge(&mut self.librarything, &other.librarything);
        merge(&mut self.google_volumes, &other.google_volumes);
        if self.openlibrary.is_none() {
            self.openlibrary = other.openlibrary.clone();
        }
        if self.isbndb.is_none() {
            self.isbndb = other.isbndb.clone();
        }
    }
}

/// Identifiers an Author carries in other catalogues.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorExternalIds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openlibrary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goodreads: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google: Option<String>,
}

impl AuthorExternalIds {
    /// Fill any missing id from `other`.
    pub fn union(&mut self, other: &AuthorExternalIds) {
        if self.openlibrary.is_none() {
            self.openlibrary = other.openlibrary.clone();
        }
        if self.goodreads.is_none() {
            self.goodreads = other.goodreads.clone();
        }
        if self.google.is_none() {
            self.google = other.google.clone();
        }
    }
}

// ---------------------------------------------------------------------------
// Work
// ---------------------------------------------------------------------------

/// An abstract creative work, independent of any particular printing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Work {
    pub title: String,
    /// Deduped, lowercase genre tags drawn from a bounded vocabulary.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub subject_tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_publish_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,

    /// True when the work was inferred from an edition rather than returned
    /// by a provider.
    #[serde(default)]
    pub synthetic: bool,
    pub primary_provider: ProviderId,
    /// Providers that contributed at least one field. Always contains
    /// `primary_provider`.
    pub contributors: BTreeSet<ProviderId>,

    #[serde(default, skip_serializing_if = "is_default_work_ids")]
    pub external_ids: WorkExternalIds,

    /// ISBNdb data quality score, 0–100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbndb_quality: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_isbndb_sync: Option<DateTime<Utc>>,

    #[serde(default)]
    pub review_status: ReviewStatus,
    /// Present only for works detected by an AI shelf scan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
}

fn is_default_work_ids(ids: &WorkExternalIds) -> bool {
    *ids == WorkExternalIds::default()
}

impl Work {
    /// Build a minimal work attributed to `provider`.
    pub fn new(title: impl Into<String>, provider: ProviderId) -> Self {
        Self {
            title: title.into(),
            subject_tags: BTreeSet::new(),
            original_language: None,
            first_publish_year: None,
            description: None,
            cover_url: None,
            synthetic: false,
            primary_provider: provider,
            contributors: BTreeSet::from([provider]),
            external_ids: WorkExternalIds::default(),
            isbndb_quality: None,
            last_isbndb_sync: None,
            review_status: ReviewStatus::default(),
            bounding_box: None,
        }
    }

    /// Build a synthetic placeholder work from edition metadata.
    pub fn synthesize_from(edition: &Edition) -> Self {
        let mut work = Self::new(edition.title.clone(), edition.primary_provider);
        work.synthetic = true;
        work.first_publish_year = edition.publish_year();
        work.cover_url = edition.cover_url.clone();
        work.contributors = edition.contributors.clone();
        work.contributors.insert(edition.primary_provider);
        work
    }

    /// Record that `provider` contributed a field.
    pub fn add_contributor(&mut self, provider: ProviderId) {
        self.contributors.insert(provider);
    }
}

// ---------------------------------------------------------------------------
// Edition
// ---------------------------------------------------------------------------

/// Physical or digital manifestation of a work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EditionFormat {
    Hardcover,
    Paperback,
    #[serde(rename = "E-book")]
    Ebook,
    Audiobook,
    #[serde(rename = "Mass Market")]
    MassMarket,
    Other,
}

impl Default for EditionFormat {
    fn default() -> Self {
        Self::Other
    }
}

impl EditionFormat {
    /// Sort rank used by edition deduplication: hardcover first, unknown
    /// formats last.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Hardcover => 0,
            Self::Paperback => 1,
            Self::Ebook => 2,
            Self::Audiobook => 3,
            Self::MassMarket => 4,
            Self::Other => 5,
        }
    }
}

/// A concrete printing/issue of a work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edition {
    /// Primary ISBN (13 preferred). Always also present in `isbns`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    /// Every ISBN known for this edition.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub isbns: BTreeSet<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    /// `YYYY` or `YYYY-MM-DD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(default)]
    pub format: EditionFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    pub primary_provider: ProviderId,
    pub contributors: BTreeSet<ProviderId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbndb_quality: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_isbndb_sync: Option<DateTime<Utc>>,
}

impl Edition {
    /// Build a minimal edition attributed to `provider`.
    pub fn new(title: impl Into<String>, provider: ProviderId) -> Self {
        Self {
            isbn: None,
            isbns: BTreeSet::new(),
            title: title.into(),
            publisher: None,
            publish_date: None,
            page_count: None,
            format: EditionFormat::default(),
            cover_url: None,
            language: None,
            primary_provider: provider,
            contributors: BTreeSet::from([provider]),
            isbndb_quality: None,
            last_isbndb_sync: None,
        }
    }

    /// Set the primary ISBN, maintaining the `isbn ∈ isbns` invariant.
    pub fn set_isbn(&mut self, isbn: impl Into<String>) {
        let isbn = isbn.into();
        self.isbns.insert(isbn.clone());
        self.isbn = Some(isbn);
    }

    /// Add a secondary ISBN.
    pub fn add_isbn(&mut self, isbn: impl Into<String>) {
        self.isbns.insert(isbn.into());
    }

    /// Publication year extracted from `publish_date`.
    pub fn publish_year(&self) -> Option<i32> {
        let date = self.publish_date.as_deref()?;
        let year = date.get(..4)?;
        if year.chars().all(|c| c.is_ascii_digit()) {
            year.parse().ok()
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Author
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Female,
    Male,
    #[serde(rename = "Non-binary")]
    NonBinary,
    Other,
    #[default]
    Unknown,
}

/// A person who wrote or contributed to works.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub name: String,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cultural_region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub death_year: Option<i32>,
    #[serde(default, skip_serializing_if = "is_default_author_ids")]
    pub external_ids: AuthorExternalIds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_count: Option<u32>,
}

fn is_default_author_ids(ids: &AuthorExternalIds) -> bool {
    *ids == AuthorExternalIds::default()
}

impl Author {
    /// Build an author with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            gender: Gender::default(),
            cultural_region: None,
            nationality: None,
            birth_year: None,
            death_year: None,
            external_ids: AuthorExternalIds::default(),
            book_count: None,
        }
    }

    /// Merge `other` into `self`: union ids, keep present life dates.
    pub fn merge(&mut self, other: &Author) {
        self.external_ids.union(&other.external_ids);
        if self.birth_year.is_none() {
            self.birth_year = other.birth_year;
        }
        if self.death_year.is_none() {
            self.death_year = other.death_year;
        }
        if self.gender == Gender::Unknown {
            self.gender = other.gender;
        }
        if self.nationality.is_none() {
            self.nationality = other.nationality.clone();
        }
        if self.cultural_region.is_none() {
            self.cultural_region = other.cultural_region.clone();
        }
        if let (Some(a), Some(b)) = (self.book_count, other.book_count) {
            self.book_count = Some(a.max(b));
        } else if self.book_count.is_none() {
            self.book_count = other.book_count;
        }
    }
}

// ---------------------------------------------------------------------------
// BookBundle
// ---------------------------------------------------------------------------

/// The canonical search/enrichment payload: works, their editions, and the
/// authors involved. Provider normalizers produce partially populated
/// bundles; the enrichment pipeline merges them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookBundle {
    #[serde(default)]
    pub works: Vec<Work>,
    #[serde(default)]
    pub editions: Vec<Edition>,
    #[serde(default)]
    pub authors: Vec<Author>,
}

impl BookBundle {
    /// True when no resource of any kind is present.
    pub fn is_empty(&self) -> bool {
        self.works.is_empty() && self.editions.is_empty() && self.authors.is_empty()
    }

    /// Append everything from `other`.
    pub fn extend(&mut self, other: BookBundle) {
        self.works.extend(other.works);
        self.editions.extend(other.editions);
        self.authors.extend(other.authors);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
