// SPDX-License-Identifier: MIT OR Apache-2.0
//! The daily cold-tier archival job.

use bgw_cache::TieredCache;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// How many distinct cache keys the journal retains between archival runs.
const JOURNAL_CAPACITY: usize = 20_000;

/// Bounded, deduplicating journal of cache keys written by live traffic.
/// The tiers themselves cannot enumerate keys, so the write path records
/// here and the archiver replays the journal.
#[derive(Debug, Default)]
pub struct KeyJournal {
    keys: Mutex<VecDeque<String>>,
}

impl KeyJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a written cache key.
    pub async fn record(&self, key: &str) {
        let mut keys = self.keys.lock().await;
        if let Some(pos) = keys.iter().position(|k| k == key) {
            keys.remove(pos);
        }
        keys.push_back(key.to_string());
        if keys.len() > JOURNAL_CAPACITY {
            keys.pop_front();
        }
    }

    /// Drain every journaled key for one archival run.
    pub async fn drain(&self) -> Vec<String> {
        self.keys.lock().await.drain(..).collect()
    }

    pub async fn len(&self) -> usize {
        self.keys.lock().await.len()
    }
}

/// Copies journaled KV records into the cold `YYYY/MM` index.
pub struct Archiver {
    cache: Arc<TieredCache>,
    journal: Arc<KeyJournal>,
}

impl Archiver {
    pub fn new(cache: Arc<TieredCache>, journal: Arc<KeyJournal>) -> Self {
        Self { cache, journal }
    }

    /// One archival pass. Keys whose KV record already expired are skipped.
    /// Returns how many records were archived.
    pub async fn run(&self) -> usize {
        let keys = self.journal.drain().await;
        let mut archived = 0usize;
        for key in keys {
            if self.cache.archive(&key).await {
                archived += 1;
            }
        }
        info!(archived, "archival pass finished");
        archived
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bgw_cache::{CacheNamespace, CacheRecord};
    use serde_json::json;

    #[tokio::test]
    async fn journal_dedupes_and_drains() {
        let journal = KeyJournal::new();
        journal.record("a").await;
        journal.record("b").await;
        journal.record("a").await;
        assert_eq!(journal.len().await, 2);
        let drained = journal.drain().await;
        assert_eq!(drained, vec!["b".to_string(), "a".to_string()]);
        assert_eq!(journal.len().await, 0);
    }

    #[tokio::test]
    async fn archiver_copies_live_records_to_cold() {
        let cache = Arc::new(TieredCache::in_memory());
        let journal = Arc::new(KeyJournal::new());

        cache
            .put(
                "search:isbn:isbn=9780441013593",
                CacheRecord::new(json!({"works": []}), 3, None),
                CacheNamespace::SearchIsbn,
                0.9,
            )
            .await;
        journal.record("search:isbn:isbn=9780441013593").await;
        journal.record("search:title:title=missing").await;

        let archiver = Archiver::new(Arc::clone(&cache), Arc::clone(&journal));
        // Only the live key archives; the missing one is skipped.
        assert_eq!(archiver.run().await, 1);

        // A second run has nothing left to do.
        assert_eq!(archiver.run().await, 0);
    }
}
