// SPDX-License-Identifier: MIT OR Apache-2.0
//! Google Books client and normalizer.
//!
//! Google returns volumes (editions) with no work identity, so the
//! normalizer emits editions and authors only; the enrichment pipeline
//! synthesizes the missing works.

use crate::contract::{
    categorize_status, categorize_transport, with_deadline, BookProvider, ProviderFailure,
    ProviderResult,
};
use bgw_config::Secret;
use bgw_core::{Author, BookBundle, Edition, ProviderId};
use bgw_normalize::canonical_isbn13;
use async_trait::async_trait;
use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/books/v1";
/// Google caps `maxResults` at 40.
const MAX_RESULTS_CAP: u32 = 40;

/// Google Books volumes API client.
#[derive(Clone)]
pub struct GoogleBooksProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<Secret>,
}

impl GoogleBooksProvider {
    pub fn new(api_key: Option<Secret>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Client against a custom base URL (tests point this at a local mock).
    pub fn with_base_url(api_key: Option<Secret>, base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn volumes(&self, query: String, max_results: u32) -> ProviderResult {
        let max = max_results.min(MAX_RESULTS_CAP).to_string();
        let mut request = self
            .http
            .get(format!("{}/volumes", self.base_url))
            .query(&[("q", query.as_str()), ("maxResults", max.as_str())]);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key.expose())]);
        }

        let response = request.send().await.map_err(categorize_transport)?;
        if let Some(failure) = categorize_status(&response) {
            return Err(failure);
        }
        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderFailure::Transient(format!("decode: {e}")))?;
        Ok(normalize_volumes(body.items.unwrap_or_default()))
    }
}

#[async_trait]
impl BookProvider for GoogleBooksProvider {
    fn id(&self) -> ProviderId {
        ProviderId::GoogleBooks
    }

    async fn search_by_title(&self, query: &str, max_results: u32) -> ProviderResult {
        with_deadline(self.volumes(format!("intitle:{query}"), max_results)).await
    }

    async fn search_by_isbn(&self, isbn: &str) -> ProviderResult {
        with_deadline(self.volumes(format!("isbn:{isbn}"), 5)).await
    }

    async fn list_author_works(&self, name: &str, limit: u32, _offset: u32) -> ProviderResult {
        // The volumes API has no stable offset; pagination is limit-only here.
        with_deadline(self.volumes(format!("inauthor:{name}"), limit)).await
    }

    async fn list_editions_for_work(&self, title: &str, author: &str) -> ProviderResult {
        with_deadline(self.volumes(format!("intitle:{title} inauthor:{author}"), MAX_RESULTS_CAP))
            .await
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SearchResponse {
    items: Option<Vec<Volume>>,
}

#[derive(Debug, Deserialize)]
struct Volume {
    #[serde(rename = "volumeInfo")]
    volume_info: VolumeInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeInfo {
    #[serde(default)]
    title: String,
    authors: Option<Vec<String>>,
    publisher: Option<String>,
    published_date: Option<String>,
    industry_identifiers: Option<Vec<IndustryIdentifier>>,
    page_count: Option<i32>,
    image_links: Option<ImageLinks>,
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndustryIdentifier {
    #[serde(rename = "type")]
    id_type: Option<String>,
    identifier: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageLinks {
    small_thumbnail: Option<String>,
    thumbnail: Option<String>,
    small: Option<String>,
    medium: Option<String>,
    large: Option<String>,
    extra_large: Option<String>,
}

impl ImageLinks {
    /// Largest available image first.
    fn best(&self) -> Option<String> {
        self.extra_large
            .clone()
            .or_else(|| self.large.clone())
            .or_else(|| self.medium.clone())
            .or_else(|| self.small.clone())
            .or_else(|| self.thumbnail.clone())
            .or_else(|| self.small_thumbnail.clone())
    }
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

fn normalize_volumes(volumes: Vec<Volume>) -> BookBundle {
    let mut bundle = BookBundle::default();
    for volume in volumes {
        let info = volume.volume_info;
        if info.title.trim().is_empty() {
            continue;
        }

        let mut edition = Edition::new(info.title.trim(), ProviderId::GoogleBooks);
        edition.publisher = info.publisher;
        edition.publish_date = info.published_date;
        edition.page_count = info.page_count.and_then(|p| u32::try_from(p).ok());
        edition.cover_url = info.image_links.as_ref().and_then(ImageLinks::best);
        edition.language = info.language;

        for id in info.industry_identifiers.unwrap_or_default() {
            let Some(raw) = id.identifier else { continue };
            match id.id_type.as_deref() {
                Some("ISBN_13") | Some("ISBN_10") => {
                    if let Some(isbn13) = canonical_isbn13(&raw) {
                        match &edition.isbn {
                            None => edition.set_isbn(isbn13),
                            Some(_) => edition.add_isbn(isbn13),
                        }
                    }
                }
                _ => {}
            }
        }

        for name in info.authors.unwrap_or_default() {
            if !name.trim().is_empty() {
                bundle.authors.push(Author::new(name.trim()));
            }
        }

        bundle.editions.push(edition);
    }
    bundle
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
