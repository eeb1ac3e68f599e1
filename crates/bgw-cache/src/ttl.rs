// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-namespace TTLs and the quality multiplier.

use std::fmt;
use std::time::Duration;

/// Ceiling on edge-tier TTLs for search namespaces. The edge tier is cheap
/// to refill from KV, so entries there are kept short-lived.
pub const EDGE_TTL_CAP: Duration = Duration::from_secs(6 * 60 * 60);

const HOUR: u64 = 60 * 60;
const DAY: u64 = 24 * HOUR;

/// The cache namespaces the gateway writes, each with its own base TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    /// `search:title`: title search envelopes.
    SearchTitle,
    /// `search:author`: author search envelopes (warming path).
    SearchAuthor,
    /// `search:isbn`: ISBN search envelopes.
    SearchIsbn,
    /// `v1:advanced`: combined title/author search envelopes.
    Advanced,
    /// `v1:editions`: editions-for-work envelopes.
    Editions,
    /// `isbn`: single-ISBN enrichment records.
    Isbn,
    /// `csv-results`: full CSV-import results, fetched out-of-band.
    CsvResults,
    /// `scan-results`: full AI-scan results, fetched out-of-band.
    ScanResults,
}

impl CacheNamespace {
    /// The key prefix written to the tiers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SearchTitle => "search:title",
            Self::SearchAuthor => "search:author",
            Self::SearchIsbn => "search:isbn",
            Self::Advanced => "v1:advanced",
            Self::Editions => "v1:editions",
            Self::Isbn => "isbn",
            Self::CsvResults => "csv-results",
            Self::ScanResults => "scan-results",
        }
    }

    /// Base TTL before quality adjustment.
    pub fn base_ttl(&self) -> Duration {
        let secs = match self {
            Self::SearchTitle | Self::Advanced => 24 * HOUR,
            Self::SearchAuthor | Self::Editions => 7 * DAY,
            Self::SearchIsbn | Self::Isbn => 30 * DAY,
            Self::CsvResults | Self::ScanResults => 24 * HOUR,
        };
        Duration::from_secs(secs)
    }

    /// Whether the edge cap applies. Job-result namespaces already sit at
    /// the 24h floor and are read once, so they skip the cap.
    pub fn edge_capped(&self) -> bool {
        !matches!(self, Self::CsvResults | Self::ScanResults)
    }
}

impl fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scale a base TTL by payload quality: rich answers live twice as long,
/// thin ones half as long.
pub fn quality_adjusted_ttl(base: Duration, quality: f64) -> Duration {
    let multiplier = if quality >= 0.8 {
        2.0
    } else if quality >= 0.4 {
        1.0
    } else {
        0.5
    };
    Duration::from_secs_f64(base.as_secs_f64() * multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_ttls_match_policy() {
        assert_eq!(CacheNamespace::SearchTitle.base_ttl(), Duration::from_secs(24 * HOUR));
        assert_eq!(CacheNamespace::SearchAuthor.base_ttl(), Duration::from_secs(7 * DAY));
        assert_eq!(CacheNamespace::SearchIsbn.base_ttl(), Duration::from_secs(30 * DAY));
        assert_eq!(CacheNamespace::Editions.base_ttl(), Duration::from_secs(7 * DAY));
        assert_eq!(CacheNamespace::CsvResults.base_ttl(), Duration::from_secs(24 * HOUR));
    }

    #[test]
    fn quality_bands() {
        let day = Duration::from_secs(DAY);
        assert_eq!(quality_adjusted_ttl(day, 0.9), Duration::from_secs(2 * DAY));
        assert_eq!(quality_adjusted_ttl(day, 0.8), Duration::from_secs(2 * DAY));
        assert_eq!(quality_adjusted_ttl(day, 0.5), day);
        assert_eq!(quality_adjusted_ttl(day, 0.4), day);
        assert_eq!(quality_adjusted_ttl(day, 0.39), Duration::from_secs(DAY / 2));
        assert_eq!(quality_adjusted_ttl(day, 0.0), Duration::from_secs(DAY / 2));
    }

    #[test]
    fn job_result_namespaces_skip_edge_cap() {
        assert!(CacheNamespace::SearchTitle.edge_capped());
        assert!(!CacheNamespace::CsvResults.edge_capped());
        assert!(!CacheNamespace::ScanResults.edge_capped());
    }
}
