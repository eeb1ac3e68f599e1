// SPDX-License-Identifier: MIT OR Apache-2.0
//! The tiered cache facade.

use crate::record::{CacheRecord, StoredRecord};
use crate::tier::{ColdStore, TierStore};
use crate::ttl::{quality_adjusted_ttl, CacheNamespace, EDGE_TTL_CAP};
use bgw_core::CacheSource;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Per-tier hit counters, shared with the alerting sweep.
#[derive(Debug, Default)]
pub struct TierCounters {
    edge_hits: AtomicU64,
    kv_hits: AtomicU64,
    cold_hits: AtomicU64,
    misses: AtomicU64,
}

impl TierCounters {
    fn record(&self, source: CacheSource) {
        let counter = match source {
            CacheSource::Edge => &self.edge_hits,
            CacheSource::Kv => &self.kv_hits,
            CacheSource::Cold => &self.cold_hits,
            CacheSource::Miss => &self.misses,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Overall hit rate in `[0, 1]`; `None` before any lookup.
    pub fn hit_rate(&self) -> Option<f64> {
        let hits = self.edge_hits.load(Ordering::Relaxed)
            + self.kv_hits.load(Ordering::Relaxed)
            + self.cold_hits.load(Ordering::Relaxed);
        let total = hits + self.misses.load(Ordering::Relaxed);
        if total == 0 {
            None
        } else {
            Some(hits as f64 / total as f64)
        }
    }

    /// (edge, kv, cold, miss) totals.
    pub fn totals(&self) -> (u64, u64, u64, u64) {
        (
            self.edge_hits.load(Ordering::Relaxed),
            self.kv_hits.load(Ordering::Relaxed),
            self.cold_hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

// ---------------------------------------------------------------------------
// Lookup result
// ---------------------------------------------------------------------------

/// Outcome of a tiered lookup.
#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub source: CacheSource,
    pub record: Option<CacheRecord>,
    /// Seconds since the payload was produced, for hits.
    pub age_secs: Option<u64>,
}

impl CacheLookup {
    fn miss() -> Self {
        Self {
            source: CacheSource::Miss,
            record: None,
            age_secs: None,
        }
    }

    fn hit(source: CacheSource, stored: StoredRecord) -> Self {
        let age = stored.record.age_secs(Utc::now());
        Self {
            source,
            record: Some(stored.record),
            age_secs: Some(age),
        }
    }
}

// ---------------------------------------------------------------------------
// TieredCache
// ---------------------------------------------------------------------------

/// One logical cache over edge, KV, and cold backings.
pub struct TieredCache {
    edge: Arc<dyn TierStore>,
    kv: Arc<dyn TierStore>,
    cold: Arc<dyn ColdStore>,
    counters: TierCounters,
}

impl TieredCache {
    pub fn new(edge: Arc<dyn TierStore>, kv: Arc<dyn TierStore>, cold: Arc<dyn ColdStore>) -> Self {
        Self {
            edge,
            kv,
            cold,
            counters: TierCounters::default(),
        }
    }

    /// Fully in-memory stack for tests and local runs.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(crate::edge::MokaEdge::new()),
            Arc::new(crate::memory::MemoryKv::new()),
            Arc::new(crate::memory::MemoryBlobStore::new()),
        )
    }

    pub fn counters(&self) -> &TierCounters {
        &self.counters
    }

    /// Probe edge → KV → cold. A hit in a slower tier schedules promotion
    /// into the faster tiers without blocking the caller; duplicate
    /// concurrent promotions are idempotent overwrites.
    pub async fn get(&self, key: &str) -> CacheLookup {
        match self.edge.get(key).await {
            Ok(Some(stored)) => {
                self.counters.record(CacheSource::Edge);
                return CacheLookup::hit(CacheSource::Edge, stored);
            }
            Ok(None) => {}
            Err(err) => warn!(key, tier = self.edge.name(), %err, "edge read failed"),
        }

        match self.kv.get(key).await {
            Ok(Some(stored)) => {
                self.counters.record(CacheSource::Kv);
                self.promote_to_edge(key, &stored);
                return CacheLookup::hit(CacheSource::Kv, stored);
            }
            Ok(None) => {}
            Err(err) => warn!(key, tier = self.kv.name(), %err, "kv read failed"),
        }

        match self.cold.fetch(key).await {
            Ok(Some(stored)) => {
                self.counters.record(CacheSource::Cold);
                self.rehydrate_from_cold(key, &stored);
                return CacheLookup::hit(CacheSource::Cold, stored);
            }
            Ok(None) => {}
            Err(err) => warn!(key, %err, "cold read failed"),
        }

        self.counters.record(CacheSource::Miss);
        CacheLookup::miss()
    }

    /// Write-through: KV with the quality-adjusted TTL, edge with the capped
    /// TTL. Failures are logged and discarded.
    pub async fn put(
        &self,
        key: &str,
        record: CacheRecord,
        namespace: CacheNamespace,
        quality: f64,
    ) {
        let ttl = quality_adjusted_ttl(namespace.base_ttl(), quality);
        let stored = StoredRecord::new(record, ttl);

        if let Err(err) = self.kv.put(key, stored.clone()).await {
            warn!(key, tier = self.kv.name(), %err, "kv write failed");
        }

        let mut edge_copy = stored;
        if namespace.edge_capped() {
            edge_copy.ttl = edge_copy.ttl.min(EDGE_TTL_CAP);
        }
        if let Err(err) = self.edge.put(key, edge_copy).await {
            warn!(key, tier = self.edge.name(), %err, "edge write failed");
        }
    }

    /// Delete from edge and KV; tombstone cold.
    pub async fn invalidate(&self, key: &str) {
        if let Err(err) = self.edge.delete(key).await {
            warn!(key, %err, "edge delete failed");
        }
        if let Err(err) = self.kv.delete(key).await {
            warn!(key, %err, "kv delete failed");
        }
        if let Err(err) = self.cold.tombstone(key).await {
            warn!(key, %err, "cold tombstone failed");
        }
    }

    /// Copy a live KV record into the cold index. Used only by the scheduled
    /// archival job. Returns whether anything was archived.
    pub async fn archive(&self, key: &str) -> bool {
        let stored = match self.kv.get(key).await {
            Ok(Some(stored)) => stored,
            Ok(None) => return false,
            Err(err) => {
                warn!(key, %err, "archival read failed");
                return false;
            }
        };
        match self.cold.archive(key, stored, Utc::now()).await {
            Ok(()) => true,
            Err(err) => {
                warn!(key, %err, "archival write failed");
                false
            }
        }
    }

    /// KV hit: refill the edge with the record's remaining TTL.
    fn promote_to_edge(&self, key: &str, stored: &StoredRecord) {
        let Some(remaining) = remaining_ttl(stored) else {
            return;
        };
        let edge = Arc::clone(&self.edge);
        let key = key.to_string();
        let mut copy = stored.clone();
        copy.ttl = remaining.min(EDGE_TTL_CAP);
        copy.stored_at = Utc::now();
        tokio::spawn(async move {
            if let Err(err) = edge.put(&key, copy).await {
                debug!(key, %err, "edge promotion failed");
            }
        });
    }

    /// Cold hit: rehydrate KV with a fresh TTL window, then the edge.
    fn rehydrate_from_cold(&self, key: &str, stored: &StoredRecord) {
        let kv = Arc::clone(&self.kv);
        let edge = Arc::clone(&self.edge);
        let key = key.to_string();
        let mut warm = stored.clone();
        warm.stored_at = Utc::now();
        tokio::spawn(async move {
            if let Err(err) = kv.put(&key, warm.clone()).await {
                debug!(key, %err, "kv rehydration failed");
            }
            warm.ttl = warm.ttl.min(EDGE_TTL_CAP);
            if let Err(err) = edge.put(&key, warm).await {
                debug!(key, %err, "edge rehydration failed");
            }
        });
    }
}

fn remaining_ttl(stored: &StoredRecord) -> Option<Duration> {
    let elapsed = (Utc::now() - stored.stored_at).to_std().ok()?;
    stored.ttl.checked_sub(elapsed).filter(|d| !d.is_zero())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
