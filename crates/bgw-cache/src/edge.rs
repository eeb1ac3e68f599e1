// SPDX-License-Identifier: MIT OR Apache-2.0
//! Moka-backed edge tier with per-entry TTLs.

use crate::record::StoredRecord;
use crate::tier::{TierError, TierStore};
use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use std::time::{Duration, Instant};

const DEFAULT_MAX_ENTRIES: u64 = 10_000;

/// Reads each entry's TTL out of the stored record.
struct PerEntryTtl;

impl Expiry<String, StoredRecord> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredRecord,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Process-near L1 tier.
pub struct MokaEdge {
    cache: Cache<String, StoredRecord>,
}

impl MokaEdge {
    /// Edge tier with the default entry bound.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }

    /// Edge tier bounded to `max_entries` records.
    pub fn with_capacity(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryTtl)
            .build();
        Self { cache }
    }

    /// Live entry count (approximate, per moka semantics).
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for MokaEdge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TierStore for MokaEdge {
    fn name(&self) -> &'static str {
        "moka-edge"
    }

    async fn get(&self, key: &str) -> Result<Option<StoredRecord>, TierError> {
        Ok(self.cache.get(key).await)
    }

    async fn put(&self, key: &str, record: StoredRecord) -> Result<(), TierError> {
        self.cache.insert(key.to_string(), record).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), TierError> {
        self.cache.invalidate(key).await;
        Ok(())
    }
}
