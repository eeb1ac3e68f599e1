// SPDX-License-Identifier: MIT OR Apache-2.0
//! A scriptable in-process provider for tests and local runs.

use crate::contract::{BookProvider, ProviderFailure, ProviderResult};
use bgw_core::{BookBundle, ProviderId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Serves canned bundles keyed by query string. Unknown queries return an
/// empty bundle. Optionally delays every call or fails outright, which is
/// enough to exercise fan-out ordering, short-circuiting, and deadlines.
pub struct StaticProvider {
    id: ProviderId,
    by_title: Mutex<HashMap<String, BookBundle>>,
    by_isbn: Mutex<HashMap<String, BookBundle>>,
    delay: Option<Duration>,
    failure: Option<ProviderFailure>,
    calls: AtomicU64,
}

impl StaticProvider {
    pub fn new(id: ProviderId) -> Self {
        Self {
            id,
            by_title: Mutex::new(HashMap::new()),
            by_isbn: Mutex::new(HashMap::new()),
            delay: None,
            failure: None,
            calls: AtomicU64::new(0),
        }
    }

    /// Delay every call by `delay` before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every call with `failure`.
    #[must_use]
    pub fn with_failure(mut self, failure: ProviderFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Serve `bundle` for title (and author) queries containing `query`.
    pub fn stub_title(&self, query: &str, bundle: BookBundle) {
        self.by_title
            .lock()
            .expect("stub lock poisoned")
            .insert(query.to_lowercase(), bundle);
    }

    /// Serve `bundle` for an exact ISBN.
    pub fn stub_isbn(&self, isbn: &str, bundle: BookBundle) {
        self.by_isbn
            .lock()
            .expect("stub lock poisoned")
            .insert(isbn.to_string(), bundle);
    }

    /// Total calls across all operations.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    async fn answer_title(&self, query: &str) -> ProviderResult {
        self.pre_answer().await?;
        let stubs = self.by_title.lock().expect("stub lock poisoned");
        let query = query.to_lowercase();
        Ok(stubs
            .iter()
            .find(|(k, _)| query.contains(*k) || k.contains(&query))
            .map(|(_, v)| v.clone())
            .unwrap_or_default())
    }

    async fn pre_answer(&self) -> Result<(), ProviderFailure> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl BookProvider for StaticProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    async fn search_by_title(&self, query: &str, _max_results: u32) -> ProviderResult {
        self.answer_title(query).await
    }

    async fn search_by_isbn(&self, isbn: &str) -> ProviderResult {
        self.pre_answer().await?;
        let stubs = self.by_isbn.lock().expect("stub lock poisoned");
        Ok(stubs.get(isbn).cloned().unwrap_or_default())
    }

    async fn list_author_works(&self, name: &str, _limit: u32, _offset: u32) -> ProviderResult {
        self.answer_title(name).await
    }

    async fn list_editions_for_work(&self, title: &str, _author: &str) -> ProviderResult {
        self.answer_title(title).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bgw_core::Work;

    #[tokio::test]
    async fn stubbed_title_is_served() {
        let provider = StaticProvider::new(ProviderId::OpenLibrary);
        let mut bundle = BookBundle::default();
        bundle.works.push(Work::new("Dune", ProviderId::OpenLibrary));
        provider.stub_title("dune", bundle);

        let out = provider.search_by_title("Dune", 10).await.unwrap();
        assert_eq!(out.works.len(), 1);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn failure_mode_fails_every_call() {
        let provider =
            StaticProvider::new(ProviderId::Isbndb).with_failure(ProviderFailure::Auth);
        assert_eq!(
            provider.search_by_isbn("9780743273565").await.unwrap_err(),
            ProviderFailure::Auth
        );
    }

    #[tokio::test]
    async fn unknown_queries_return_empty() {
        let provider = StaticProvider::new(ProviderId::GoogleBooks);
        assert!(provider.search_by_title("nothing", 10).await.unwrap().is_empty());
    }
}
