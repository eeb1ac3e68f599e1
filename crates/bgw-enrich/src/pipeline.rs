// SPDX-License-Identifier: MIT OR Apache-2.0
//! Provider fan-out and batch orchestration.

use crate::identifier::BookIdentifier;
use crate::merge::merge_bundles;
use bgw_core::{quality, BookBundle};
use bgw_error::{ErrorCode, ErrorDto};
use bgw_providers::{BookProvider, ProviderFailure};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Default batch concurrency cap.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Per-item failure inside a batch. The batch itself never aborts.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItemError {
    pub index: usize,
    pub identifier: BookIdentifier,
    pub error: ErrorDto,
}

/// Result of a batch enrichment.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Merged bundle per successful item, in input order.
    pub books: Vec<(usize, BookBundle)>,
    pub errors: Vec<BatchItemError>,
}

/// Fans lookups out across the configured providers.
pub struct Enricher {
    providers: Vec<Arc<dyn BookProvider>>,
    concurrency: usize,
}

impl Enricher {
    pub fn new(providers: Vec<Arc<dyn BookProvider>>) -> Self {
        Self {
            providers,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Override the batch concurrency cap.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn providers(&self) -> &[Arc<dyn BookProvider>] {
        &self.providers
    }

    /// Enrich one identifier: parallel fan-out with per-provider deadlines,
    /// short-circuit on the first non-empty high-completeness result, then a
    /// completeness-ordered merge of everything collected.
    ///
    /// Short-circuiting stops *waiting*, not the in-flight requests; results
    /// that happen to have finished already are still collected for field
    /// supplementation.
    pub async fn enrich_one(&self, identifier: &BookIdentifier) -> Result<BookBundle, ErrorDto> {
        let mut join_set = JoinSet::new();
        for provider in &self.providers {
            let provider = Arc::clone(provider);
            let identifier = identifier.clone();
            join_set.spawn(async move {
                let result = match &identifier {
                    BookIdentifier::Isbn { isbn } => provider.search_by_isbn(isbn).await,
                    BookIdentifier::TitleAuthor { title, author } => {
                        let query = match author {
                            Some(author) => format!("{title} {author}"),
                            None => title.clone(),
                        };
                        provider.search_by_title(&query, 10).await
                    }
                };
                (provider.id(), result)
            });
        }

        let mut collected: Vec<BookBundle> = Vec::new();
        let mut failures: Vec<(String, ProviderFailure)> = Vec::new();
        let provider_count = self.providers.len();

        while let Some(joined) = join_set.join_next().await {
            let Ok((provider_id, result)) = joined else {
                continue;
            };
            match result {
                Ok(bundle) => {
                    let short_circuit =
                        !bundle.is_empty() && quality::is_high_completeness(&bundle);
                    collected.push(bundle);
                    if short_circuit {
                        // Drain whatever else already finished, then stop
                        // waiting. Remaining requests run to completion
                        // detached.
                        while let Some(Ok((_, Ok(extra)))) = join_set.try_join_next() {
                            collected.push(extra);
                        }
                        join_set.detach_all();
                        break;
                    }
                }
                Err(failure) => {
                    debug!(provider = %provider_id, %failure, "provider failed in fan-out");
                    failures.push((provider_id.to_string(), failure));
                }
            }
        }

        if !failures.is_empty()
            && failures.len() == provider_count
            && collected.iter().all(|b| b.is_empty())
        {
            let timeouts = failures
                .iter()
                .all(|(_, f)| matches!(f, ProviderFailure::Timeout));
            let code = if timeouts {
                ErrorCode::ProviderTimeout
            } else {
                ErrorCode::ProviderError
            };
            let attempted: Vec<String> = failures.into_iter().map(|(name, _)| name).collect();
            warn!(?attempted, "all providers failed");
            let mut dto = ErrorDto::new(code, "all providers failed");
            dto.details.insert(
                "attempted".into(),
                serde_json::to_value(attempted).unwrap_or_default(),
            );
            return Err(dto);
        }

        Ok(merge_bundles(collected))
    }

    /// Enrich a batch concurrently. Individual failures become error
    /// records; authors are deduplicated across the whole batch by the
    /// caller-facing merge in each bundle.
    pub async fn enrich_many(&self, identifiers: &[BookIdentifier]) -> BatchOutcome {
        let results: Vec<(usize, Result<BookBundle, ErrorDto>)> =
            stream::iter(identifiers.iter().cloned().enumerate())
                .map(|(index, identifier)| async move {
                    (index, self.enrich_one(&identifier).await)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        let mut outcome = BatchOutcome::default();
        for (index, result) in results {
            match result {
                Ok(bundle) => outcome.books.push((index, bundle)),
                Err(error) => outcome.errors.push(BatchItemError {
                    index,
                    identifier: identifiers[index].clone(),
                    error,
                }),
            }
        }
        outcome.books.sort_by_key(|(index, _)| *index);
        outcome.errors.sort_by_key(|e| e.index);
        outcome
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use bgw_core::{Author, Edition, ProviderId, Work};
    use bgw_providers::StaticProvider;
    use std::time::Duration;

    fn rich_bundle(title: &str, provider: ProviderId) -> BookBundle {
        let mut w = Work::new(title, provider);
        w.cover_url = Some("https://covers/x.jpg".into());
        w.description = Some("long ".repeat(30));
        let mut e = Edition::new(title, provider);
        e.set_isbn("9780441013593");
        BookBundle {
            works: vec![w],
            editions: vec![e],
            authors: vec![Author::new("Frank Herbert")],
        }
    }

    #[tokio::test]
    async fn single_provider_roundtrip() {
        let provider = StaticProvider::new(ProviderId::OpenLibrary);
        provider.stub_title("dune", rich_bundle("Dune", ProviderId::OpenLibrary));
        let enricher = Enricher::new(vec![Arc::new(provider)]);

        let bundle = enricher
            .enrich_one(&BookIdentifier::TitleAuthor {
                title: "Dune".into(),
                author: None,
            })
            .await
            .unwrap();
        assert_eq!(bundle.works.len(), 1);
    }

    #[tokio::test]
    async fn fast_high_completeness_result_short_circuits_slow_provider() {
        let fast = StaticProvider::new(ProviderId::Isbndb);
        fast.stub_isbn("9780441013593", rich_bundle("Dune", ProviderId::Isbndb));
        let slow = Arc::new(
            StaticProvider::new(ProviderId::GoogleBooks).with_delay(Duration::from_secs(5)),
        );

        let enricher = Enricher::new(vec![Arc::new(fast), Arc::clone(&slow) as _]);
        let started = std::time::Instant::now();
        let bundle = enricher
            .enrich_one(&BookIdentifier::Isbn {
                isbn: "9780441013593".into(),
            })
            .await
            .unwrap();
        assert!(!bundle.is_empty());
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "short-circuit did not fire"
        );
    }

    #[tokio::test]
    async fn partial_failures_still_merge() {
        let good = StaticProvider::new(ProviderId::OpenLibrary);
        good.stub_title("dune", rich_bundle("Dune", ProviderId::OpenLibrary));
        let bad = StaticProvider::new(ProviderId::Isbndb)
            .with_failure(ProviderFailure::Transient("boom".into()));

        let enricher = Enricher::new(vec![Arc::new(good), Arc::new(bad)]);
        let bundle = enricher
            .enrich_one(&BookIdentifier::TitleAuthor {
                title: "Dune".into(),
                author: None,
            })
            .await
            .unwrap();
        assert_eq!(bundle.works.len(), 1);
    }

    #[tokio::test]
    async fn all_failures_surface_provider_error_with_attempts() {
        let a = StaticProvider::new(ProviderId::OpenLibrary)
            .with_failure(ProviderFailure::Transient("a".into()));
        let b = StaticProvider::new(ProviderId::GoogleBooks)
            .with_failure(ProviderFailure::Transient("b".into()));

        let enricher = Enricher::new(vec![Arc::new(a), Arc::new(b)]);
        let err = enricher
            .enrich_one(&BookIdentifier::Isbn {
                isbn: "9780441013593".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ProviderError);
        let attempted = err.details.get("attempted").unwrap();
        assert_eq!(attempted.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn all_timeouts_surface_provider_timeout() {
        let a = StaticProvider::new(ProviderId::OpenLibrary)
            .with_failure(ProviderFailure::Timeout);
        let enricher = Enricher::new(vec![Arc::new(a)]);
        let err = enricher
            .enrich_one(&BookIdentifier::Isbn {
                isbn: "9780441013593".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ProviderTimeout);
    }

    #[tokio::test]
    async fn batch_collects_errors_without_aborting() {
        let provider = StaticProvider::new(ProviderId::OpenLibrary);
        provider.stub_title("dune", rich_bundle("Dune", ProviderId::OpenLibrary));
        let enricher = Enricher::new(vec![Arc::new(provider)]).with_concurrency(4);

        let identifiers = vec![
            BookIdentifier::TitleAuthor {
                title: "Dune".into(),
                author: None,
            },
            BookIdentifier::TitleAuthor {
                title: "Unknown Book".into(),
                author: None,
            },
        ];
        let outcome = enricher.enrich_many(&identifiers).await;
        // Unknown queries return empty bundles, not errors.
        assert_eq!(outcome.books.len(), 2);
        assert!(outcome.errors.is_empty());
        assert!(outcome.books[1].1.is_empty());
    }
}
