// SPDX-License-Identifier: MIT OR Apache-2.0
//! OpenLibrary client and normalizer.
//!
//! OpenLibrary's `search.json` returns work-level documents carrying author
//! names, subjects, and the ISBNs of known printings, so the normalizer can
//! emit works, editions, and authors in one pass.

use crate::contract::{
    categorize_status, categorize_transport, with_deadline, BookProvider, ProviderFailure,
    ProviderResult,
};
use bgw_core::{Author, BookBundle, Edition, ProviderId, Work};
use bgw_normalize::{canonical_isbn13, normalize_subject};
use async_trait::async_trait;
use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "https://openlibrary.org";
const COVER_BASE_URL: &str = "https://covers.openlibrary.org";
/// Subjects beyond this are noise (OpenLibrary lists hundreds per work).
const MAX_SUBJECTS: usize = 8;

/// OpenLibrary search API client. Keyless.
#[derive(Clone)]
pub struct OpenLibraryProvider {
    http: reqwest::Client,
    base_url: String,
}

impl OpenLibraryProvider {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Client against a custom base URL (tests point this at a local mock).
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn search(&self, params: Vec<(&'static str, String)>) -> ProviderResult {
        let response = self
            .http
            .get(format!("{}/search.json", self.base_url))
            .query(&params)
            .send()
            .await
            .map_err(categorize_transport)?;
        if let Some(failure) = categorize_status(&response) {
            return Err(failure);
        }
        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderFailure::Transient(format!("decode: {e}")))?;
        Ok(normalize_docs(body.docs))
    }
}

impl Default for OpenLibraryProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookProvider for OpenLibraryProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenLibrary
    }

    async fn search_by_title(&self, query: &str, max_results: u32) -> ProviderResult {
        with_deadline(self.search(vec![
            ("title", query.to_string()),
            ("limit", max_results.to_string()),
        ]))
        .await
    }

    async fn search_by_isbn(&self, isbn: &str) -> ProviderResult {
        with_deadline(self.search(vec![("isbn", isbn.to_string()), ("limit", "5".into())])).await
    }

    async fn list_author_works(&self, name: &str, limit: u32, offset: u32) -> ProviderResult {
        with_deadline(self.search(vec![
            ("author", name.to_string()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ]))
        .await
    }

    async fn list_editions_for_work(&self, title: &str, author: &str) -> ProviderResult {
        with_deadline(self.search(vec![
            ("title", title.to_string()),
            ("author", author.to_string()),
            ("limit", "40".into()),
        ]))
        .await
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<Doc>,
}

#[derive(Debug, Deserialize)]
struct Doc {
    #[serde(default)]
    title: String,
    key: Option<String>,
    author_name: Option<Vec<String>>,
    first_publish_year: Option<i32>,
    subject: Option<Vec<String>>,
    cover_i: Option<i64>,
    isbn: Option<Vec<String>>,
    language: Option<Vec<String>>,
    publisher: Option<Vec<String>>,
    number_of_pages_median: Option<u32>,
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

fn normalize_docs(docs: Vec<Doc>) -> BookBundle {
    let mut bundle = BookBundle::default();
    for doc in docs {
        if doc.title.trim().is_empty() {
            continue;
        }

        let mut work = Work::new(doc.title.trim(), ProviderId::OpenLibrary);
        work.first_publish_year = doc.first_publish_year;
        work.original_language = doc
            .language
            .as_ref()
            .and_then(|langs| langs.first())
            .cloned();
        work.cover_url = doc
            .cover_i
            .map(|id| format!("{COVER_BASE_URL}/b/id/{id}-L.jpg"));
        work.external_ids.openlibrary = doc
            .key
            .as_deref()
            .map(|k| k.trim_start_matches("/works/").to_string());
        for subject in doc.subject.unwrap_or_default().iter().take(MAX_SUBJECTS) {
            if let Some(tag) = normalize_subject(subject) {
                work.subject_tags.insert(tag);
            }
        }

        // One edition per doc, carrying every canonical ISBN OpenLibrary
        // knows for the work's printings.
        let isbns: Vec<String> = doc
            .isbn
            .unwrap_or_default()
            .iter()
            .filter_map(|raw| canonical_isbn13(raw))
            .collect();
        if !isbns.is_empty() {
            let mut edition = Edition::new(work.title.clone(), ProviderId::OpenLibrary);
            edition.cover_url = work.cover_url.clone();
            edition.publisher = doc
                .publisher
                .as_ref()
                .and_then(|p| p.first())
                .cloned();
            edition.page_count = doc.number_of_pages_median;
            edition.publish_date = doc.first_publish_year.map(|y| y.to_string());
            edition.language = work.original_language.clone();
            for (i, isbn) in isbns.into_iter().enumerate() {
                if i == 0 {
                    edition.set_isbn(isbn);
                } else {
                    edition.add_isbn(isbn);
                }
            }
            bundle.editions.push(edition);
        }

        for name in doc.author_name.unwrap_or_default() {
            if !name.trim().is_empty() {
                bundle.authors.push(Author::new(name.trim()));
            }
        }

        bundle.works.push(work);
    }
    bundle
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizer_emits_work_edition_and_author() {
        let docs: Vec<Doc> = serde_json::from_value(json!([{
            "title": "The Left Hand of Darkness",
            "key": "/works/OL45804W",
            "author_name": ["Ursula K. Le Guin"],
            "first_publish_year": 1969,
            "subject": ["Science fiction", "Gender"],
            "cover_i": 12345,
            "isbn": ["0441478123", "9780441478125"],
            "language": ["eng"],
            "publisher": ["Ace Books"]
        }]))
        .unwrap();

        let bundle = normalize_docs(docs);
        assert_eq!(bundle.works.len(), 1);
        let w = &bundle.works[0];
        assert_eq!(w.first_publish_year, Some(1969));
        assert_eq!(w.external_ids.openlibrary.as_deref(), Some("OL45804W"));
        assert!(w.subject_tags.contains("science fiction"));
        assert_eq!(
            w.cover_url.as_deref(),
            Some("https://covers.openlibrary.org/b/id/12345-L.jpg")
        );

        // ISBN-10 and ISBN-13 of the same printing collapse to one.
        let e = &bundle.editions[0];
        assert_eq!(e.isbns.len(), 1);
        assert_eq!(e.isbn.as_deref(), Some("9780441478125"));
        assert_eq!(bundle.authors[0].name, "Ursula K. Le Guin");
    }

    #[test]
    fn docs_without_isbns_emit_no_edition() {
        let docs: Vec<Doc> =
            serde_json::from_value(json!([{"title": "Obscure Pamphlet"}])).unwrap();
        let bundle = normalize_docs(docs);
        assert_eq!(bundle.works.len(), 1);
        assert!(bundle.editions.is_empty());
    }

    #[test]
    fn subjects_are_bounded() {
        let subjects: Vec<String> = (0..40).map(|i| format!("subject {i}")).collect();
        let docs: Vec<Doc> = serde_json::from_value(json!([{
            "title": "Tagged",
            "subject": subjects,
        }]))
        .unwrap();
        let bundle = normalize_docs(docs);
        assert!(bundle.works[0].subject_tags.len() <= MAX_SUBJECTS);
    }
}
