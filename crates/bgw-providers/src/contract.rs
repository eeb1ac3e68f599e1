// SPDX-License-Identifier: MIT OR Apache-2.0
//! The provider contract: operations, deadline, and failure categorization.

use bgw_core::{BookBundle, ProviderId};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Hard per-call deadline. A provider that has not answered by now is
/// reported as [`ProviderFailure::Timeout`].
pub const PROVIDER_DEADLINE: Duration = Duration::from_secs(10);

/// Categorized provider failure. Raw upstream messages stay server-side.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderFailure {
    /// The provider has no record for the query.
    #[error("not found")]
    NotFound,

    /// Upstream 429; skip this provider for the current call.
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited {
        /// Upstream `Retry-After`, when sent.
        retry_after: Option<Duration>,
    },

    /// The 10-second deadline elapsed.
    #[error("deadline elapsed")]
    Timeout,

    /// 5xx or network-level failure; the next provider is tried.
    #[error("transient: {0}")]
    Transient(String),

    /// Credential rejected.
    #[error("authentication failed")]
    Auth,

    /// The provider rejected the request shape.
    #[error("invalid request: {0}")]
    Invalid(String),
}

/// Outcome of one provider call.
pub type ProviderResult = Result<BookBundle, ProviderFailure>;

/// The four query operations every provider exposes.
#[async_trait]
pub trait BookProvider: Send + Sync {
    /// Which provider this is; stamped on every normalized record.
    fn id(&self) -> ProviderId;

    /// Full-text title search.
    async fn search_by_title(&self, query: &str, max_results: u32) -> ProviderResult;

    /// Exact ISBN lookup (canonical ISBN-13 in).
    async fn search_by_isbn(&self, isbn: &str) -> ProviderResult;

    /// Works by an author, paginated.
    async fn list_author_works(&self, name: &str, limit: u32, offset: u32) -> ProviderResult;

    /// Editions of a given work.
    async fn list_editions_for_work(&self, title: &str, author: &str) -> ProviderResult;
}

/// Run `fut` under [`PROVIDER_DEADLINE`].
pub async fn with_deadline<F>(fut: F) -> ProviderResult
where
    F: Future<Output = ProviderResult>,
{
    match tokio::time::timeout(PROVIDER_DEADLINE, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProviderFailure::Timeout),
    }
}

/// Map an HTTP response status onto the failure taxonomy. `2xx` maps to
/// `None` (no failure).
pub(crate) fn categorize_status(response: &reqwest::Response) -> Option<ProviderFailure> {
    let status = response.status();
    if status.is_success() {
        return None;
    }
    Some(match status.as_u16() {
        404 => ProviderFailure::NotFound,
        429 => ProviderFailure::RateLimited {
            retry_after: response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs),
        },
        401 | 403 => ProviderFailure::Auth,
        400 | 422 => ProviderFailure::Invalid(format!("upstream rejected request: {status}")),
        _ => ProviderFailure::Transient(format!("upstream status {status}")),
    })
}

/// Map a transport-level reqwest error onto the taxonomy.
pub(crate) fn categorize_transport(err: reqwest::Error) -> ProviderFailure {
    if err.is_timeout() {
        ProviderFailure::Timeout
    } else {
        ProviderFailure::Transient(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deadline_times_out_slow_calls() {
        let result = tokio::time::timeout(Duration::from_millis(50), async {
            // A future that never resolves; the outer timeout just bounds the test.
            with_deadline(std::future::pending::<ProviderResult>()).await
        })
        .await;
        // Still pending after 50ms: the 10s deadline has not fired yet.
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn deadline_passes_fast_results_through() {
        let result = with_deadline(async { Ok(BookBundle::default()) }).await;
        assert!(result.unwrap().is_empty());
    }
}
