// SPDX-License-Identifier: MIT OR Apache-2.0
//! The envelope stored in every tier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What the gateway caches: an opaque JSON payload plus the metadata needed
/// to rebuild a response envelope on a hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    pub data: serde_json::Value,
    /// When the payload was produced.
    pub timestamp: DateTime<Utc>,
    /// How long the original request took, in milliseconds.
    pub processing_time: u64,
    /// Primary provider that produced the payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl CacheRecord {
    /// Wrap a payload produced just now.
    pub fn new(data: serde_json::Value, processing_time: u64, provider: Option<String>) -> Self {
        Self {
            data,
            timestamp: Utc::now(),
            processing_time,
            provider,
        }
    }

    /// Seconds since the payload was produced, clamped at zero.
    pub fn age_secs(&self, now: DateTime<Utc>) -> u64 {
        (now - self.timestamp).num_seconds().max(0) as u64
    }
}

/// A record plus its tier bookkeeping: when it was stored and for how long.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub record: CacheRecord,
    pub stored_at: DateTime<Utc>,
    /// Time-to-live from `stored_at`, in seconds on the wire.
    #[serde(with = "ttl_secs")]
    pub ttl: Duration,
}

impl StoredRecord {
    /// Store `record` now with the given TTL.
    pub fn new(record: CacheRecord, ttl: Duration) -> Self {
        Self {
            record,
            stored_at: Utc::now(),
            ttl,
        }
    }

    /// True once `stored_at + ttl` has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let Ok(ttl) = chrono::Duration::from_std(self.ttl) else {
            return false;
        };
        now >= self.stored_at + ttl
    }
}

mod ttl_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(ttl: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(ttl.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn age_is_clamped_at_zero() {
        let mut rec = CacheRecord::new(json!({"works": []}), 12, None);
        rec.timestamp = Utc::now() + chrono::Duration::seconds(30);
        assert_eq!(rec.age_secs(Utc::now()), 0);
    }

    #[test]
    fn expiry_respects_ttl() {
        let rec = CacheRecord::new(json!(1), 1, Some("google-books".into()));
        let stored = StoredRecord::new(rec, Duration::from_secs(60));
        assert!(!stored.is_expired(Utc::now()));
        assert!(stored.is_expired(Utc::now() + chrono::Duration::seconds(61)));
    }

    #[test]
    fn stored_record_serde_roundtrip() {
        let stored = StoredRecord::new(
            CacheRecord::new(json!({"n": 1}), 5, Some("isbndb".into())),
            Duration::from_secs(86_400),
        );
        let json = serde_json::to_string(&stored).unwrap();
        let back: StoredRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(stored, back);
    }
}
