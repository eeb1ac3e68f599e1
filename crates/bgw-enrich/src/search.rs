// SPDX-License-Identifier: MIT OR Apache-2.0
//! The search service.
//!
//! Cache-first lookups shared by the HTTP search endpoints and the warming
//! consumer. Warming must call these functions instead of re-deriving keys,
//! so the keys it populates are exactly the keys the live endpoints read.

use crate::dedup::dedup_editions;
use crate::identifier::BookIdentifier;
use crate::merge::{merge_bundles, synthesize_missing_works};
use crate::pipeline::Enricher;
use bgw_cache::{CacheNamespace, CacheRecord, TieredCache};
use bgw_core::{quality, BookBundle, CacheSource};
use bgw_error::{ErrorCode, ErrorDto};
use bgw_normalize::{cache_key, canonical_isbn13, normalize_author, normalize_title, titles_match, Fingerprint};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Default `maxResults` when a caller does not pass one. Part of the cache
/// key, so warming and live traffic must agree on it.
pub const DEFAULT_MAX_RESULTS: u32 = 20;

/// A search answer plus where it came from.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub bundle: BookBundle,
    pub source: CacheSource,
    pub age_secs: Option<u64>,
    /// Primary provider of the freshly fetched payload, when not cached.
    pub provider: Option<String>,
    /// Wall-clock milliseconds spent producing this answer.
    pub elapsed_ms: u64,
    /// The cache key this answer lives under. Callers journal it for the
    /// archival job instead of re-deriving keys.
    pub cache_key: String,
}

/// Cache-first search over the enrichment pipeline.
pub struct SearchService {
    cache: Arc<TieredCache>,
    enricher: Arc<Enricher>,
}

impl SearchService {
    pub fn new(cache: Arc<TieredCache>, enricher: Arc<Enricher>) -> Self {
        Self { cache, enricher }
    }

    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    /// `GET /v1/search/title`.
    pub async fn search_title(
        &self,
        query: &str,
        max_results: Option<u32>,
    ) -> Result<SearchOutcome, ErrorDto> {
        let normalized = normalize_title(query);
        if normalized.is_empty() {
            return Err(ErrorDto::new(ErrorCode::InvalidQuery, "empty title query"));
        }
        let max_results = max_results.unwrap_or(DEFAULT_MAX_RESULTS);
        let key = cache_key(
            CacheNamespace::SearchTitle.as_str(),
            &Fingerprint::new()
                .with("title", &normalized)
                .with("maxResults", max_results.to_string()),
        );
        self.cached_enrich(
            key,
            CacheNamespace::SearchTitle,
            BookIdentifier::TitleAuthor {
                title: query.trim().to_string(),
                author: None,
            },
        )
        .await
    }

    /// `GET /v1/search/isbn`.
    pub async fn search_isbn(&self, raw_isbn: &str) -> Result<SearchOutcome, ErrorDto> {
        let Some(isbn) = canonical_isbn13(raw_isbn) else {
            return Err(ErrorDto::new(
                ErrorCode::InvalidIsbn,
                format!("'{raw_isbn}' is not a valid ISBN-10 or ISBN-13"),
            ));
        };
        let key = cache_key(
            CacheNamespace::SearchIsbn.as_str(),
            &Fingerprint::new().with("isbn", &isbn),
        );
        self.cached_enrich(key, CacheNamespace::SearchIsbn, BookIdentifier::Isbn { isbn })
            .await
    }

    /// `GET /v1/search/advanced`.
    pub async fn search_advanced(
        &self,
        title: Option<&str>,
        author: Option<&str>,
    ) -> Result<SearchOutcome, ErrorDto> {
        let title = title.map(str::trim).filter(|t| !t.is_empty());
        let author = author.map(str::trim).filter(|a| !a.is_empty());
        if title.is_none() && author.is_none() {
            return Err(ErrorDto::new(
                ErrorCode::MissingParam,
                "at least one of title or author is required",
            ));
        }

        let mut fp = Fingerprint::new();
        if let Some(title) = title {
            fp = fp.with("title", normalize_title(title));
        }
        if let Some(author) = author {
            fp = fp.with("author", normalize_author(author));
        }
        let key = cache_key(CacheNamespace::Advanced.as_str(), &fp);

        let identifier = match (title, author) {
            (Some(title), author) => BookIdentifier::TitleAuthor {
                title: title.to_string(),
                author: author.map(String::from),
            },
            // Author-only search funnels through the title path with the
            // author as the query; providers treat it as an author lookup.
            (None, Some(author)) => BookIdentifier::TitleAuthor {
                title: author.to_string(),
                author: None,
            },
            (None, None) => unreachable!("validated above"),
        };
        self.cached_enrich(key, CacheNamespace::Advanced, identifier).await
    }

    /// Author search used by the warming consumer.
    pub async fn search_author(
        &self,
        name: &str,
        limit: u32,
        offset: u32,
    ) -> Result<SearchOutcome, ErrorDto> {
        let normalized = normalize_author(name);
        if normalized.is_empty() {
            return Err(ErrorDto::new(ErrorCode::InvalidQuery, "empty author name"));
        }
        let key = cache_key(
            CacheNamespace::SearchAuthor.as_str(),
            &Fingerprint::new()
                .with("author", &normalized)
                .with("limit", limit.to_string())
                .with("offset", offset.to_string()),
        );

        if let Some(outcome) = self.try_cache(&key).await {
            return Ok(outcome);
        }

        let started = Instant::now();
        let mut bundles = Vec::new();
        for provider in self.enricher.providers() {
            match provider.list_author_works(name, limit, offset).await {
                Ok(bundle) => bundles.push(bundle),
                Err(failure) => debug!(provider = %provider.id(), %failure, "author listing failed"),
            }
        }
        let bundle = merge_bundles(bundles);
        self.store(&key, CacheNamespace::SearchAuthor, &bundle, started).await;
        Ok(fresh_outcome(bundle, started, key))
    }

    /// `GET /v1/editions/search`.
    pub async fn search_editions(
        &self,
        work_title: &str,
        author: &str,
        limit: Option<u32>,
    ) -> Result<SearchOutcome, ErrorDto> {
        let title_norm = normalize_title(work_title);
        let author_norm = normalize_author(author);
        if title_norm.is_empty() || author_norm.is_empty() {
            return Err(ErrorDto::new(
                ErrorCode::MissingParam,
                "workTitle and author are both required",
            ));
        }
        let limit = limit.unwrap_or(DEFAULT_MAX_RESULTS) as usize;
        let key = cache_key(
            CacheNamespace::Editions.as_str(),
            &Fingerprint::new().with("title", &title_norm).with("author", &author_norm),
        );

        if let Some(mut outcome) = self.try_cache(&key).await {
            outcome.bundle.editions.truncate(limit);
            return Ok(outcome);
        }

        let started = Instant::now();
        let mut bundles = Vec::new();
        for provider in self.enricher.providers() {
            match provider.list_editions_for_work(work_title, author).await {
                Ok(bundle) => bundles.push(bundle),
                Err(failure) => {
                    debug!(provider = %provider.id(), %failure, "editions listing failed");
                }
            }
        }

        let mut merged = merge_bundles(bundles);
        // Keep only editions that plausibly belong to the requested work.
        merged
            .editions
            .retain(|e| titles_match(&e.title, work_title));
        merged.editions = dedup_editions(std::mem::take(&mut merged.editions));
        merged
            .works
            .retain(|w| titles_match(&w.title, work_title) || w.synthetic);
        synthesize_missing_works(&mut merged);

        self.store(&key, CacheNamespace::Editions, &merged, started).await;
        let mut outcome = fresh_outcome(merged, started, key);
        outcome.bundle.editions.truncate(limit);
        Ok(outcome)
    }

    // -- shared plumbing ----------------------------------------------------

    async fn cached_enrich(
        &self,
        key: String,
        namespace: CacheNamespace,
        identifier: BookIdentifier,
    ) -> Result<SearchOutcome, ErrorDto> {
        if let Some(outcome) = self.try_cache(&key).await {
            return Ok(outcome);
        }
        let started = Instant::now();
        let bundle = self.enricher.enrich_one(&identifier).await?;
        self.store(&key, namespace, &bundle, started).await;
        Ok(fresh_outcome(bundle, started, key))
    }

    async fn try_cache(&self, key: &str) -> Option<SearchOutcome> {
        let lookup = self.cache.get(key).await;
        let record = lookup.record?;
        let bundle: BookBundle = serde_json::from_value(record.data).ok()?;
        Some(SearchOutcome {
            bundle,
            source: lookup.source,
            age_secs: lookup.age_secs,
            provider: record.provider,
            elapsed_ms: 0,
            cache_key: key.to_string(),
        })
    }

    async fn store(
        &self,
        key: &str,
        namespace: CacheNamespace,
        bundle: &BookBundle,
        started: Instant,
    ) {
        let Ok(data) = serde_json::to_value(bundle) else {
            return;
        };
        let provider = bundle.works.first().map(|w| w.primary_provider.to_string());
        let record = CacheRecord::new(data, started.elapsed().as_millis() as u64, provider);
        let score = quality::bundle_quality(bundle);
        self.cache.put(key, record, namespace, score).await;
    }
}

fn fresh_outcome(bundle: BookBundle, started: Instant, cache_key: String) -> SearchOutcome {
    let provider = bundle.works.first().map(|w| w.primary_provider.to_string());
    SearchOutcome {
        bundle,
        source: CacheSource::Miss,
        age_secs: None,
        provider,
        elapsed_ms: started.elapsed().as_millis() as u64,
        cache_key,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use bgw_core::{Author, Edition, EditionFormat, ProviderId, Work};
    use bgw_providers::StaticProvider;

    fn service_with(provider: StaticProvider) -> SearchService {
        SearchService::new(
            Arc::new(TieredCache::in_memory()),
            Arc::new(Enricher::new(vec![Arc::new(provider)])),
        )
    }

    fn gatsby_bundle() -> BookBundle {
        let mut w = Work::new("The Great Gatsby", ProviderId::Isbndb);
        w.cover_url = Some("https://covers/gatsby.jpg".into());
        w.description = Some("Jay Gatsby's obsession with Daisy Buchanan ".repeat(4));
        let mut e = Edition::new("The Great Gatsby", ProviderId::Isbndb);
        e.set_isbn("9780743273565");
        e.format = EditionFormat::Paperback;
        BookBundle {
            works: vec![w],
            editions: vec![e],
            authors: vec![Author::new("F. Scott Fitzgerald")],
        }
    }

    #[tokio::test]
    async fn isbn_search_normalizes_and_caches() {
        let provider = StaticProvider::new(ProviderId::Isbndb);
        provider.stub_isbn("9780743273565", gatsby_bundle());
        let service = service_with(provider);

        // Hyphenated input normalizes to the canonical key.
        let first = service.search_isbn("978-0-7432-7356-5").await.unwrap();
        assert_eq!(first.source, CacheSource::Miss);
        assert_eq!(first.bundle.works.len(), 1);
        assert_eq!(first.bundle.authors.len(), 1);
        assert!(!first.bundle.editions.is_empty());

        // Second identical call comes from the edge.
        let second = service.search_isbn("9780743273565").await.unwrap();
        assert_eq!(second.source, CacheSource::Edge);
        assert_eq!(second.bundle, first.bundle);
    }

    #[tokio::test]
    async fn invalid_isbn_is_rejected_before_any_io() {
        let service = service_with(StaticProvider::new(ProviderId::Isbndb));
        let err = service.search_isbn("123").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidIsbn);
    }

    #[tokio::test]
    async fn title_search_caches_under_normalized_key() {
        let provider = StaticProvider::new(ProviderId::Isbndb);
        provider.stub_title("great gatsby", gatsby_bundle());
        let service = service_with(provider);

        service.search_title("The Great Gatsby!", None).await.unwrap();
        // Different casing/punctuation, same key.
        let hit = service.search_title("the GREAT gatsby", None).await.unwrap();
        assert!(hit.source.is_hit());
    }

    #[tokio::test]
    async fn advanced_requires_a_parameter() {
        let service = service_with(StaticProvider::new(ProviderId::Isbndb));
        let err = service.search_advanced(None, None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingParam);
    }

    #[tokio::test]
    async fn editions_search_filters_foreign_titles() {
        let provider = StaticProvider::new(ProviderId::Isbndb);
        let mut bundle = gatsby_bundle();
        let mut stray = Edition::new("Completely Different Book", ProviderId::Isbndb);
        stray.set_isbn("9780451524935");
        bundle.editions.push(stray);
        provider.stub_title("great gatsby", bundle);
        let service = service_with(provider);

        let outcome = service
            .search_editions("The Great Gatsby", "F. Scott Fitzgerald", None)
            .await
            .unwrap();
        assert_eq!(outcome.bundle.editions.len(), 1);
        assert!(outcome
            .bundle
            .editions
            .iter()
            .all(|e| titles_match(&e.title, "The Great Gatsby")));
    }

    #[tokio::test]
    async fn author_search_is_cached_for_warming() {
        let provider = StaticProvider::new(ProviderId::OpenLibrary);
        provider.stub_title("fitzgerald", gatsby_bundle());
        let service = service_with(provider);

        let first = service.search_author("Fitzgerald, F. Scott", 20, 0).await.unwrap();
        assert_eq!(first.source, CacheSource::Miss);
        let second = service.search_author("F. Scott Fitzgerald", 20, 0).await.unwrap();
        assert!(second.source.is_hit(), "normalized author keys must collide");
    }
}
