// SPDX-License-Identifier: MIT OR Apache-2.0
//! ISBNdb client and normalizer.

use crate::contract::{
    categorize_status, categorize_transport, with_deadline, BookProvider, ProviderFailure,
    ProviderResult,
};
use bgw_config::Secret;
use bgw_core::{quality, Author, BookBundle, Edition, EditionFormat, ProviderId, Work};
use bgw_normalize::{canonical_isbn13, normalize_subject};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "https://api2.isbndb.com";

/// ISBNdb REST client. Requires an API key in the `Authorization` header.
#[derive(Clone)]
pub struct IsbndbProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Secret,
}

impl IsbndbProvider {
    pub fn new(api_key: Secret) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Client against a custom base URL (tests point this at a local mock).
    pub fn with_base_url(api_key: Secret, base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn get_books(&self, path: String, query: Vec<(&'static str, String)>) -> ProviderResult {
        let response = self
            .http
            .get(format!("{}{path}", self.base_url))
            .header(reqwest::header::AUTHORIZATION, self.api_key.expose())
            .query(&query)
            .send()
            .await
            .map_err(categorize_transport)?;
        if let Some(failure) = categorize_status(&response) {
            return Err(failure);
        }
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderFailure::Transient(format!("decode: {e}")))?;

        // `/book/{isbn}` wraps a single record in `book`; list endpoints
        // return `books`.
        let books: Vec<Book> = if let Some(book) = body.get("book") {
            serde_json::from_value(book.clone())
                .map(|b| vec![b])
                .unwrap_or_default()
        } else {
            body.get("books")
                .and_then(|b| serde_json::from_value(b.clone()).ok())
                .unwrap_or_default()
        };
        Ok(normalize_books(books))
    }
}

#[async_trait]
impl BookProvider for IsbndbProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Isbndb
    }

    async fn search_by_title(&self, query: &str, max_results: u32) -> ProviderResult {
        with_deadline(self.get_books(
            format!("/books/{}", urlencode(query)),
            vec![("pageSize", max_results.to_string()), ("column", "title".into())],
        ))
        .await
    }

    async fn search_by_isbn(&self, isbn: &str) -> ProviderResult {
        with_deadline(self.get_books(format!("/book/{isbn}"), vec![])).await
    }

    async fn list_author_works(&self, name: &str, limit: u32, offset: u32) -> ProviderResult {
        let page = offset / limit.max(1) + 1;
        with_deadline(self.get_books(
            format!("/author/{}", urlencode(name)),
            vec![("page", page.to_string()), ("pageSize", limit.to_string())],
        ))
        .await
    }

    async fn list_editions_for_work(&self, title: &str, _author: &str) -> ProviderResult {
        with_deadline(self.get_books(
            format!("/books/{}", urlencode(title)),
            vec![("pageSize", "40".into()), ("column", "title".into())],
        ))
        .await
    }
}

fn urlencode(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~') {
                c.to_string()
            } else {
                c.to_string()
                    .bytes()
                    .map(|b| format!("%{b:02X}"))
                    .collect()
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Book {
    #[serde(default)]
    title: String,
    isbn13: Option<String>,
    isbn: Option<String>,
    publisher: Option<String>,
    date_published: Option<String>,
    pages: Option<u32>,
    binding: Option<String>,
    image: Option<String>,
    synopsis: Option<String>,
    subjects: Option<Vec<String>>,
    authors: Option<Vec<String>>,
    language: Option<String>,
}

/// ISBNdb binding strings → canonical format.
fn map_binding(binding: Option<&str>) -> EditionFormat {
    let Some(binding) = binding else {
        return EditionFormat::Other;
    };
    let lowered = binding.to_lowercase();
    if lowered.contains("mass market") {
        EditionFormat::MassMarket
    } else if lowered.contains("hardcover") || lowered.contains("hardback") {
        EditionFormat::Hardcover
    } else if lowered.contains("paperback") || lowered.contains("softcover") {
        EditionFormat::Paperback
    } else if lowered.contains("kindle") || lowered.contains("ebook") || lowered.contains("e-book")
    {
        EditionFormat::Ebook
    } else if lowered.contains("audio") || lowered.contains("mp3") {
        EditionFormat::Audiobook
    } else {
        EditionFormat::Other
    }
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

fn normalize_books(books: Vec<Book>) -> BookBundle {
    let now = Utc::now();
    let mut bundle = BookBundle::default();
    for book in books {
        if book.title.trim().is_empty() {
            continue;
        }

        let mut edition = Edition::new(book.title.trim(), ProviderId::Isbndb);
        edition.publisher = book.publisher;
        edition.publish_date = book.date_published;
        edition.page_count = book.pages;
        edition.format = map_binding(book.binding.as_deref());
        edition.cover_url = book.image.clone();
        edition.language = book.language;
        for raw in [book.isbn13.as_deref(), book.isbn.as_deref()].into_iter().flatten() {
            if let Some(isbn13) = canonical_isbn13(raw) {
                match &edition.isbn {
                    None => edition.set_isbn(isbn13),
                    Some(_) => edition.add_isbn(isbn13),
                }
            }
        }

        let mut work = Work::new(edition.title.clone(), ProviderId::Isbndb);
        work.description = book.synopsis;
        work.cover_url = book.image;
        work.first_publish_year = edition.publish_year();
        for subject in book.subjects.unwrap_or_default() {
            if let Some(tag) = normalize_subject(&subject) {
                work.subject_tags.insert(tag);
            }
        }

        // ISBNdb's quality stamp tracks how much of the record is filled in.
        let score = quality::record_completeness(Some(&work), Some(&edition));
        let stamp = (score * 100.0).round() as u8;
        edition.isbndb_quality = Some(stamp);
        edition.last_isbndb_sync = Some(now);
        work.isbndb_quality = Some(stamp);
        work.last_isbndb_sync = Some(now);

        for name in book.authors.unwrap_or_default() {
            if !name.trim().is_empty() {
                bundle.authors.push(Author::new(name.trim()));
            }
        }

        bundle.editions.push(edition);
        bundle.works.push(work);
    }
    bundle
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
