// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory tier backends.
//!
//! `MemoryKv` stands in for the durable KV binding in tests and local runs;
//! `MemoryBlobStore` does the same for the cold blob store.

use crate::record::StoredRecord;
use crate::tier::{cold_object_path, ColdStore, TierError, TierStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

// ---------------------------------------------------------------------------
// MemoryKv
// ---------------------------------------------------------------------------

/// Expiring in-memory key-value store.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: RwLock<HashMap<String, StoredRecord>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let now = Utc::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|r| !r.is_expired(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl TierStore for MemoryKv {
    fn name(&self) -> &'static str {
        "memory-kv"
    }

    async fn get(&self, key: &str) -> Result<Option<StoredRecord>, TierError> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(record) if !record.is_expired(Utc::now()) => Ok(Some(record.clone())),
            _ => Ok(None),
        }
    }

    async fn put(&self, key: &str, record: StoredRecord) -> Result<(), TierError> {
        self.entries.write().await.insert(key.to_string(), record);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), TierError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryBlobStore
// ---------------------------------------------------------------------------

/// In-memory cold index. Objects live under `cold-cache/YYYY/MM/<key>.json`;
/// a tombstone is an object with no payload.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<String, Option<StoredRecord>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Object count, tombstones included.
    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl ColdStore for MemoryBlobStore {
    async fn fetch(&self, key: &str) -> Result<Option<StoredRecord>, TierError> {
        let suffix = format!("/{key}.json");
        let objects = self.objects.read().await;
        // Newest month first so a re-archived key shadows older copies.
        let mut paths: Vec<&String> = objects
            .keys()
            .filter(|path| path.ends_with(&suffix))
            .collect();
        paths.sort();
        for path in paths.into_iter().rev() {
            return match &objects[path] {
                Some(record) => Ok(Some(record.clone())),
                // Tombstone.
                None => Ok(None),
            };
        }
        Ok(None)
    }

    async fn archive(
        &self,
        key: &str,
        record: StoredRecord,
        archived_at: DateTime<Utc>,
    ) -> Result<(), TierError> {
        let path = cold_object_path(key, archived_at);
        self.objects.write().await.insert(path, Some(record));
        Ok(())
    }

    async fn tombstone(&self, key: &str) -> Result<(), TierError> {
        let suffix = format!("/{key}.json");
        let mut objects = self.objects.write().await;
        for (_, slot) in objects.iter_mut().filter(|(path, _)| path.ends_with(&suffix)) {
            *slot = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CacheRecord;
    use serde_json::json;
    use std::time::Duration;

    fn stored(v: i64, ttl_secs: u64) -> StoredRecord {
        StoredRecord::new(
            CacheRecord::new(json!(v), 1, None),
            Duration::from_secs(ttl_secs),
        )
    }

    #[tokio::test]
    async fn kv_expiry_reads_as_none() {
        let kv = MemoryKv::new();
        let mut record = stored(1, 60);
        record.stored_at = Utc::now() - chrono::Duration::seconds(120);
        kv.put("k", record).await.unwrap();
        assert!(kv.get("k").await.unwrap().is_none());
        assert!(kv.is_empty().await);
    }

    #[tokio::test]
    async fn kv_roundtrip_and_delete() {
        let kv = MemoryKv::new();
        kv.put("k", stored(7, 60)).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap().unwrap().record.data, json!(7));
        kv.delete("k").await.unwrap();
        assert!(kv.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cold_fetch_prefers_newest_month() {
        use chrono::TimeZone;
        let cold = MemoryBlobStore::new();
        let jan = Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap();
        let jun = Utc.with_ymd_and_hms(2026, 6, 10, 0, 0, 0).unwrap();
        cold.archive("k", stored(1, 60), jan).await.unwrap();
        cold.archive("k", stored(2, 60), jun).await.unwrap();
        let hit = cold.fetch("k").await.unwrap().unwrap();
        assert_eq!(hit.record.data, json!(2));
    }

    #[tokio::test]
    async fn cold_tombstone_hides_all_copies() {
        use chrono::TimeZone;
        let cold = MemoryBlobStore::new();
        let jan = Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap();
        cold.archive("k", stored(1, 60), jan).await.unwrap();
        cold.tombstone("k").await.unwrap();
        assert!(cold.fetch("k").await.unwrap().is_none());
        // The object itself survives as a tombstone.
        assert_eq!(cold.object_count().await, 1);
    }
}
