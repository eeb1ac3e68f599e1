// SPDX-License-Identifier: MIT OR Apache-2.0
//! The daily cover harvest.

use bgw_enrich::SearchService;
use bgw_pipelines::ImageStore;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// How many recently searched ISBNs the log retains.
const LOG_CAPACITY: usize = 5_000;

/// Bounded, deduplicating log of ISBNs seen by recent searches. The search
/// handlers record into it; the harvester drains a snapshot daily.
#[derive(Debug, Default)]
pub struct RecentIsbnLog {
    entries: Mutex<VecDeque<String>>,
}

impl RecentIsbnLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a canonical ISBN-13. Duplicates are moved to the back.
    pub async fn record(&self, isbn: &str) {
        let mut entries = self.entries.lock().await;
        if let Some(pos) = entries.iter().position(|e| e == isbn) {
            entries.remove(pos);
        }
        entries.push_back(isbn.to_string());
        if entries.len() > LOG_CAPACITY {
            entries.pop_front();
        }
    }

    /// Snapshot for one harvest run.
    pub async fn snapshot(&self) -> Vec<String> {
        self.entries.lock().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

/// Walks recently searched ISBNs and fills the cover bucket for any cover
/// the blob store is missing.
pub struct CoverHarvester {
    service: Arc<SearchService>,
    images: Arc<dyn ImageStore>,
    log: Arc<RecentIsbnLog>,
    http: reqwest::Client,
}

impl CoverHarvester {
    pub fn new(
        service: Arc<SearchService>,
        images: Arc<dyn ImageStore>,
        log: Arc<RecentIsbnLog>,
    ) -> Self {
        Self {
            service,
            images,
            log,
            http: reqwest::Client::new(),
        }
    }

    /// One harvest pass. Returns how many covers were written.
    pub async fn run(&self) -> usize {
        let isbns = self.log.snapshot().await;
        let mut written = 0usize;
        for isbn in isbns {
            match self.harvest_one(&isbn).await {
                Ok(true) => written += 1,
                Ok(false) => {}
                Err(error) => warn!(%isbn, error, "cover harvest failed"),
            }
        }
        info!(written, "cover harvest finished");
        written
    }

    async fn harvest_one(&self, isbn: &str) -> Result<bool, String> {
        let path = format!("covers/{isbn}.jpg");
        if self.images.exists(&path).await.map_err(|e| e.to_string())? {
            return Ok(false);
        }

        // The search path merges providers by completeness, so the cover it
        // surfaces is already the best available one.
        let outcome = self
            .service
            .search_isbn(isbn)
            .await
            .map_err(|e| e.message)?;
        let cover_url = outcome
            .bundle
            .works
            .iter()
            .filter_map(|w| w.cover_url.as_deref())
            .chain(outcome.bundle.editions.iter().filter_map(|e| e.cover_url.as_deref()))
            .next();
        let Some(cover_url) = cover_url else {
            debug!(%isbn, "no provider has a cover");
            return Ok(false);
        };

        let response = self
            .http
            .get(cover_url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("cover fetch status {}", response.status()));
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        let bytes = response.bytes().await.map_err(|e| e.to_string())?;

        self.images
            .put(&path, bytes.to_vec(), &content_type)
            .await
            .map_err(|e| e.to_string())?;
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use bgw_cache::TieredCache;
    use bgw_core::{BookBundle, Edition, ProviderId, Work};
    use bgw_enrich::Enricher;
    use bgw_pipelines::MemoryImageStore;
    use bgw_providers::StaticProvider;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn log_dedupes_and_bounds() {
        let log = RecentIsbnLog::new();
        log.record("9780441013593").await;
        log.record("9780451524935").await;
        log.record("9780441013593").await;
        assert_eq!(log.len().await, 2);
        // Re-recorded ISBN moved to the back.
        assert_eq!(log.snapshot().await[1], "9780441013593");
    }

    #[tokio::test]
    async fn harvest_fetches_missing_covers_once() {
        let cover_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dune.jpg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/jpeg")
                    .set_body_bytes(vec![0xFF, 0xD8, 0xFF]),
            )
            .expect(1)
            .mount(&cover_server)
            .await;

        let mut work = Work::new("Dune", ProviderId::Isbndb);
        work.cover_url = Some(format!("{}/dune.jpg", cover_server.uri()));
        let mut edition = Edition::new("Dune", ProviderId::Isbndb);
        edition.set_isbn("9780441013593");
        let bundle = BookBundle {
            works: vec![work],
            editions: vec![edition],
            authors: vec![],
        };

        let provider = StaticProvider::new(ProviderId::Isbndb);
        provider.stub_isbn("9780441013593", bundle);
        let service = Arc::new(SearchService::new(
            Arc::new(TieredCache::in_memory()),
            Arc::new(Enricher::new(vec![Arc::new(provider)])),
        ));

        let images = Arc::new(MemoryImageStore::new());
        let log = Arc::new(RecentIsbnLog::new());
        log.record("9780441013593").await;

        let harvester = CoverHarvester::new(
            service,
            Arc::clone(&images) as Arc<dyn ImageStore>,
            Arc::clone(&log),
        );
        assert_eq!(harvester.run().await, 1);
        assert!(images.exists("covers/9780441013593.jpg").await.unwrap());

        // Second pass: cover already present, nothing fetched (the mock's
        // expect(1) would trip otherwise).
        assert_eq!(harvester.run().await, 0);
    }
}
