// SPDX-License-Identifier: MIT OR Apache-2.0
//! The response envelope every HTTP endpoint returns.

use bgw_error::ErrorDto;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// CacheSource
// ---------------------------------------------------------------------------

/// Which cache tier satisfied a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheSource {
    /// L1 process-near cache.
    Edge,
    /// L2 durable key-value store.
    Kv,
    /// L3 blob-store cold index.
    Cold,
    /// No tier had the key.
    Miss,
}

impl CacheSource {
    /// True for any tier hit.
    pub fn is_hit(&self) -> bool {
        !matches!(self, Self::Miss)
    }
}

impl fmt::Display for CacheSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Edge => "EDGE",
            Self::Kv => "KV",
            Self::Cold => "COLD",
            Self::Miss => "MISS",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Metadata attached to every response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub timestamp: DateTime<Utc>,
    /// Wall-clock handling time in milliseconds.
    pub processing_time: u64,
    /// Primary provider that produced the data, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub cached: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_source: Option<CacheSource>,
}

impl ResponseMetadata {
    /// Metadata for a fresh (uncached) response.
    pub fn fresh(processing_time: u64) -> Self {
        Self {
            timestamp: Utc::now(),
            processing_time,
            provider: None,
            cached: false,
            cache_source: None,
        }
    }

    /// Metadata for a response served from `source`.
    pub fn cached_from(source: CacheSource, processing_time: u64) -> Self {
        Self {
            timestamp: Utc::now(),
            processing_time,
            provider: None,
            cached: source.is_hit(),
            cache_source: Some(source),
        }
    }
}

/// Standard wrapper `{data, metadata, error?}` common to all endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope<T> {
    pub data: Option<T>,
    pub metadata: ResponseMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDto>,
}

impl<T> ResponseEnvelope<T> {
    /// Successful envelope around `data`.
    pub fn ok(data: T, metadata: ResponseMetadata) -> Self {
        Self {
            data: Some(data),
            metadata,
            error: None,
        }
    }

    /// Error envelope with `data: null`.
    pub fn err(error: ErrorDto, metadata: ResponseMetadata) -> Self {
        Self {
            data: None,
            metadata,
            error: Some(error),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use bgw_error::ErrorCode;

    #[test]
    fn cache_source_wire_form() {
        assert_eq!(serde_json::to_string(&CacheSource::Edge).unwrap(), r#""EDGE""#);
        assert_eq!(serde_json::to_string(&CacheSource::Kv).unwrap(), r#""KV""#);
        assert_eq!(CacheSource::Cold.to_string(), "COLD");
        assert!(CacheSource::Kv.is_hit());
        assert!(!CacheSource::Miss.is_hit());
    }

    #[test]
    fn ok_envelope_has_no_error() {
        let env = ResponseEnvelope::ok(42u32, ResponseMetadata::fresh(7));
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["data"], 42);
        assert!(json.get("error").is_none());
        assert_eq!(json["metadata"]["cached"], false);
    }

    #[test]
    fn err_envelope_nulls_data() {
        let env: ResponseEnvelope<u32> = ResponseEnvelope::err(
            ErrorDto::new(ErrorCode::NotFound, "no editions found"),
            ResponseMetadata::fresh(1),
        );
        let json = serde_json::to_value(&env).unwrap();
        assert!(json["data"].is_null());
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[test]
    fn cached_metadata_records_source() {
        let m = ResponseMetadata::cached_from(CacheSource::Edge, 3);
        assert!(m.cached);
        assert_eq!(m.cache_source, Some(CacheSource::Edge));
        let m = ResponseMetadata::cached_from(CacheSource::Miss, 3);
        assert!(!m.cached);
    }
}
