// SPDX-License-Identifier: MIT OR Apache-2.0
//! The warming queue and its consumer.

use bgw_enrich::SearchService;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

/// Depth ceiling; anything higher is clamped.
pub const MAX_WARMING_DEPTH: u8 = 3;

/// How many works of an author each depth level warms.
fn titles_for_depth(depth: u8) -> usize {
    match depth.min(MAX_WARMING_DEPTH) {
        0 => 0,
        1 => 5,
        2 => 10,
        _ => 20,
    }
}

/// One queued warming request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmingMessage {
    pub author: String,
    /// 0 warms the author search only; higher levels also warm title
    /// searches for the author's works.
    pub depth: u8,
}

/// A message that exhausted its retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    pub message: WarmingMessage,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

/// In-process warming queue with a dead-letter side channel. A hosted
/// queue binding replaces the channel in deployment; the consumer logic is
/// identical.
pub struct WarmingQueue {
    tx: mpsc::UnboundedSender<WarmingMessage>,
    dead: Arc<RwLock<Vec<DeadLetter>>>,
}

impl WarmingQueue {
    /// Build the queue; the receiver goes to [`WarmingConsumer::run`].
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WarmingMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                dead: Arc::new(RwLock::new(Vec::new())),
            },
            rx,
        )
    }

    /// Enqueue one message. Returns `false` when the consumer is gone.
    pub fn enqueue(&self, message: WarmingMessage) -> bool {
        self.tx.send(message).is_ok()
    }

    /// Shared handle to the dead-letter storage.
    pub fn dead_letters(&self) -> Arc<RwLock<Vec<DeadLetter>>> {
        Arc::clone(&self.dead)
    }

    /// Current dead-letter depth (the monitoring endpoint reports this).
    pub async fn dead_letter_depth(&self) -> usize {
        self.dead.read().await.len()
    }
}

/// Drains the queue through the live search paths.
pub struct WarmingConsumer {
    service: Arc<SearchService>,
    dead: Arc<RwLock<Vec<DeadLetter>>>,
    max_attempts: u32,
}

impl WarmingConsumer {
    pub fn new(service: Arc<SearchService>, queue: &WarmingQueue) -> Self {
        Self {
            service,
            dead: queue.dead_letters(),
            max_attempts: 3,
        }
    }

    /// Override the retry budget.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Consume until the queue closes.
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<WarmingMessage>) {
        while let Some(message) = rx.recv().await {
            self.consume_one(message).await;
        }
        debug!("warming queue closed; consumer stopping");
    }

    /// Process one message with retries and exponential backoff; terminal
    /// failures go to the DLQ.
    pub async fn consume_one(&self, message: WarmingMessage) {
        let mut last_error = String::new();
        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                let backoff = Duration::from_millis(100 * 2u64.pow(attempt - 2));
                tokio::time::sleep(backoff).await;
            }
            match self.warm(&message).await {
                Ok(warmed_titles) => {
                    info!(
                        author = %message.author,
                        depth = message.depth,
                        warmed_titles,
                        "warming message processed"
                    );
                    return;
                }
                Err(error) => {
                    warn!(author = %message.author, attempt, %error, "warming attempt failed");
                    last_error = error;
                }
            }
        }
        self.dead.write().await.push(DeadLetter {
            message,
            error: last_error,
            failed_at: Utc::now(),
        });
    }

    /// Author search first (warms the author cache), then a title search
    /// per returned work (warms the title cache), all through the exact
    /// functions the live endpoints call, so the keys match.
    async fn warm(&self, message: &WarmingMessage) -> Result<usize, String> {
        let outcome = self
            .service
            .search_author(&message.author, 20, 0)
            .await
            .map_err(|e| e.message)?;

        let limit = titles_for_depth(message.depth);
        let mut warmed = 0usize;
        for work in outcome.bundle.works.iter().take(limit) {
            match self.service.search_title(&work.title, None).await {
                Ok(_) => warmed += 1,
                Err(error) => {
                    debug!(title = %work.title, code = %error.code, "title warm failed");
                }
            }
        }
        Ok(warmed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use bgw_cache::TieredCache;
    use bgw_core::{Author, BookBundle, ProviderId, Work};
    use bgw_enrich::Enricher;
    use bgw_providers::StaticProvider;

    fn herbert_bundle() -> BookBundle {
        BookBundle {
            works: vec![
                Work::new("Dune", ProviderId::OpenLibrary),
                Work::new("Dune Messiah", ProviderId::OpenLibrary),
            ],
            editions: vec![],
            authors: vec![Author::new("Frank Herbert")],
        }
    }

    fn service() -> Arc<SearchService> {
        let provider = StaticProvider::new(ProviderId::OpenLibrary);
        provider.stub_title("frank herbert", herbert_bundle());
        provider.stub_title("dune", herbert_bundle());
        Arc::new(SearchService::new(
            Arc::new(TieredCache::in_memory()),
            Arc::new(Enricher::new(vec![Arc::new(provider)])),
        ))
    }

    #[tokio::test]
    async fn warming_populates_the_live_search_keys() {
        let service = service();
        let (queue, rx) = WarmingQueue::new();
        let consumer = WarmingConsumer::new(Arc::clone(&service), &queue);

        queue.enqueue(WarmingMessage {
            author: "Frank Herbert".into(),
            depth: 2,
        });
        drop(queue);
        consumer.run(rx).await;

        // The exact same call the live endpoint makes now hits the cache.
        let outcome = service.search_author("Frank Herbert", 20, 0).await.unwrap();
        assert!(outcome.source.is_hit(), "author cache not warmed");
        let outcome = service.search_title("Dune", None).await.unwrap();
        assert!(outcome.source.is_hit(), "title cache not warmed");
    }

    #[tokio::test]
    async fn depth_zero_warms_author_only() {
        let service = service();
        let (queue, _rx) = WarmingQueue::new();
        let consumer = WarmingConsumer::new(Arc::clone(&service), &queue);
        consumer
            .consume_one(WarmingMessage {
                author: "Frank Herbert".into(),
                depth: 0,
            })
            .await;

        assert!(service.search_author("Frank Herbert", 20, 0).await.unwrap().source.is_hit());
        // Title searches were never run.
        let title = service.search_title("Dune", None).await.unwrap();
        assert!(!title.source.is_hit());
    }

    #[tokio::test]
    async fn repeated_failure_lands_in_the_dead_letter_queue() {
        // Empty author name makes search_author fail deterministically.
        let service = service();
        let (queue, _rx) = WarmingQueue::new();
        let consumer =
            WarmingConsumer::new(Arc::clone(&service), &queue).with_max_attempts(2);
        consumer
            .consume_one(WarmingMessage {
                author: "   ".into(),
                depth: 1,
            })
            .await;

        assert_eq!(queue.dead_letter_depth().await, 1);
        let dead = queue.dead_letters();
        let dead = dead.read().await;
        assert_eq!(dead[0].message.depth, 1);
        assert!(!dead[0].error.is_empty());
    }

    #[test]
    fn depth_is_clamped() {
        assert_eq!(titles_for_depth(0), 0);
        assert_eq!(titles_for_depth(1), 5);
        assert_eq!(titles_for_depth(2), 10);
        assert_eq!(titles_for_depth(3), 20);
        assert_eq!(titles_for_depth(200), 20);
    }
}
