// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tier contracts.
//!
//! The edge and KV tiers share one flat key-value contract; the cold tier
//! has its own because its index is addressed by year/month and is written
//! only by the scheduled archival job.

use crate::record::StoredRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// A tier operation failure. Callers log it and fall through to the next
/// tier; it never surfaces to a request.
#[derive(Debug, Error)]
pub enum TierError {
    #[error("tier backend unavailable: {0}")]
    Unavailable(String),
    #[error("stored record corrupt: {0}")]
    Corrupt(String),
}

/// Flat key-value tier (edge or KV).
#[async_trait]
pub trait TierStore: Send + Sync {
    /// Backend name for logs and stats.
    fn name(&self) -> &'static str;

    /// Fetch a live record. Expired entries read as `None`.
    async fn get(&self, key: &str) -> Result<Option<StoredRecord>, TierError>;

    /// Store a record under `key`; the TTL rides inside the record.
    async fn put(&self, key: &str, record: StoredRecord) -> Result<(), TierError>;

    /// Drop `key` if present.
    async fn delete(&self, key: &str) -> Result<(), TierError>;
}

/// Cold blob-store index, keyed `cold-cache/YYYY/MM/<key>.json`.
#[async_trait]
pub trait ColdStore: Send + Sync {
    /// Locate `key` anywhere in the index (newest month first).
    async fn fetch(&self, key: &str) -> Result<Option<StoredRecord>, TierError>;

    /// Write a record into the month bucket for `archived_at`.
    async fn archive(
        &self,
        key: &str,
        record: StoredRecord,
        archived_at: DateTime<Utc>,
    ) -> Result<(), TierError>;

    /// Tombstone every copy of `key` so later fetches miss.
    async fn tombstone(&self, key: &str) -> Result<(), TierError>;
}

/// Render the cold-index object path for a key and archival instant.
pub(crate) fn cold_object_path(key: &str, archived_at: DateTime<Utc>) -> String {
    format!("cold-cache/{}/{}.json", archived_at.format("%Y/%m"), key)
}
