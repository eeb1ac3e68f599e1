// SPDX-License-Identifier: MIT OR Apache-2.0
//! Request metrics and the `/metrics` exporters.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// Hard cap on retained samples; the oldest fall off first.
const MAX_SAMPLES: usize = 50_000;

// ---------------------------------------------------------------------------
// Period
// ---------------------------------------------------------------------------

/// Reporting window accepted by `GET /metrics?period=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    /// Last 15 minutes.
    M15,
    /// Last hour.
    H1,
    /// Last 24 hours.
    D1,
    /// Last 7 days.
    D7,
}

impl Period {
    /// Window length.
    pub fn window(&self) -> ChronoDuration {
        match self {
            Self::M15 => ChronoDuration::minutes(15),
            Self::H1 => ChronoDuration::hours(1),
            Self::D1 => ChronoDuration::hours(24),
            Self::D7 => ChronoDuration::days(7),
        }
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "15m" => Ok(Self::M15),
            "1h" => Ok(Self::H1),
            "24h" => Ok(Self::D1),
            "7d" => Ok(Self::D7),
            other => Err(format!("unknown period '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Samples
// ---------------------------------------------------------------------------

/// One handled request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSample {
    /// Route label (e.g. `"/v1/search/title"`).
    pub endpoint: String,
    /// HTTP status returned.
    pub status: u16,
    /// Handling time in milliseconds.
    pub duration_ms: u64,
    /// Whether a cache tier answered.
    pub cached: bool,
    /// When the request finished.
    pub at: DateTime<Utc>,
}

impl RequestSample {
    fn is_error(&self) -> bool {
        self.status >= 500
    }
}

/// Aggregated statistics over one period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSummary {
    /// Requests inside the window.
    pub count: usize,
    /// Mean handling time.
    pub mean_duration_ms: f64,
    /// Median handling time.
    pub p50_duration_ms: f64,
    /// 99th percentile handling time.
    pub p99_duration_ms: f64,
    /// 5xx fraction.
    pub error_rate: f64,
    /// Fraction answered by a cache tier.
    pub cache_hit_rate: f64,
    /// Per-endpoint request counts (deterministic ordering).
    pub endpoint_counts: BTreeMap<String, usize>,
}

/// Compute a percentile value from a **sorted** slice.
fn percentile(sorted: &[u64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0] as f64;
    }
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    sorted[lower] as f64 * (1.0 - frac) + sorted[upper] as f64 * frac
}

// ---------------------------------------------------------------------------
// Collector
// ---------------------------------------------------------------------------

/// Thread-safe sample collector shared by the request middleware and the
/// alert sweep.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    inner: Arc<Mutex<Vec<RequestSample>>>,
}

impl MetricsCollector {
    /// New, empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one handled request.
    pub fn record(&self, sample: RequestSample) {
        let mut data = self.inner.lock().expect("metrics lock poisoned");
        data.push(sample);
        if data.len() > MAX_SAMPLES {
            let excess = data.len() - MAX_SAMPLES;
            data.drain(..excess);
        }
    }

    /// Number of retained samples.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("metrics lock poisoned").len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Aggregate the samples inside `period`.
    pub fn summary(&self, period: Period) -> MetricsSummary {
        let cutoff = Utc::now() - period.window();
        let data = self.inner.lock().expect("metrics lock poisoned");
        let window: Vec<&RequestSample> = data.iter().filter(|s| s.at >= cutoff).collect();
        if window.is_empty() {
            return MetricsSummary::default();
        }

        let count = window.len();
        let mut durations: Vec<u64> = window.iter().map(|s| s.duration_ms).collect();
        durations.sort_unstable();

        let errors = window.iter().filter(|s| s.is_error()).count();
        let hits = window.iter().filter(|s| s.cached).count();

        let mut endpoint_counts: BTreeMap<String, usize> = BTreeMap::new();
        for sample in &window {
            *endpoint_counts.entry(sample.endpoint.clone()).or_insert(0) += 1;
        }

        MetricsSummary {
            count,
            mean_duration_ms: durations.iter().sum::<u64>() as f64 / count as f64,
            p50_duration_ms: percentile(&durations, 50.0),
            p99_duration_ms: percentile(&durations, 99.0),
            error_rate: errors as f64 / count as f64,
            cache_hit_rate: hits as f64 / count as f64,
            endpoint_counts,
        }
    }
}

// ---------------------------------------------------------------------------
// Exporters
// ---------------------------------------------------------------------------

/// Render a summary for the `format=` query parameter.
pub trait MetricsExporter {
    /// Serialize `summary`; the string is the response body.
    fn export(&self, summary: &MetricsSummary) -> String;

    /// Response content type.
    fn content_type(&self) -> &'static str;
}

/// `format=json`.
#[derive(Debug, Default)]
pub struct JsonExporter;

impl MetricsExporter for JsonExporter {
    fn export(&self, summary: &MetricsSummary) -> String {
        serde_json::to_string_pretty(summary).unwrap_or_else(|_| "{}".into())
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }
}

/// `format=prometheus`.
#[derive(Debug, Default)]
pub struct PrometheusExporter;

impl MetricsExporter for PrometheusExporter {
    fn export(&self, summary: &MetricsSummary) -> String {
        let mut out = String::new();
        out.push_str("# TYPE bookgate_requests_total counter\n");
        out.push_str(&format!("bookgate_requests_total {}\n", summary.count));
        out.push_str("# TYPE bookgate_request_duration_ms summary\n");
        out.push_str(&format!(
            "bookgate_request_duration_ms{{quantile=\"0.5\"}} {}\n",
            summary.p50_duration_ms
        ));
        out.push_str(&format!(
            "bookgate_request_duration_ms{{quantile=\"0.99\"}} {}\n",
            summary.p99_duration_ms
        ));
        out.push_str("# TYPE bookgate_error_rate gauge\n");
        out.push_str(&format!("bookgate_error_rate {}\n", summary.error_rate));
        out.push_str("# TYPE bookgate_cache_hit_rate gauge\n");
        out.push_str(&format!("bookgate_cache_hit_rate {}\n", summary.cache_hit_rate));
        for (endpoint, count) in &summary.endpoint_counts {
            out.push_str(&format!(
                "bookgate_endpoint_requests_total{{endpoint=\"{endpoint}\"}} {count}\n"
            ));
        }
        out
    }

    fn content_type(&self) -> &'static str {
        "text/plain; version=0.0.4"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(endpoint: &str, status: u16, duration: u64, cached: bool) -> RequestSample {
        RequestSample {
            endpoint: endpoint.into(),
            status,
            duration_ms: duration,
            cached,
            at: Utc::now(),
        }
    }

    #[test]
    fn empty_collector_summary_is_zeroed() {
        let c = MetricsCollector::new();
        let s = c.summary(Period::H1);
        assert_eq!(s.count, 0);
        assert_eq!(s.error_rate, 0.0);
    }

    #[test]
    fn rates_and_percentiles() {
        let c = MetricsCollector::new();
        c.record(sample("/v1/search/title", 200, 10, true));
        c.record(sample("/v1/search/title", 200, 20, true));
        c.record(sample("/v1/search/isbn", 502, 30, false));
        c.record(sample("/v1/search/isbn", 200, 40, false));

        let s = c.summary(Period::M15);
        assert_eq!(s.count, 4);
        assert!((s.error_rate - 0.25).abs() < f64::EPSILON);
        assert!((s.cache_hit_rate - 0.5).abs() < f64::EPSILON);
        assert!((s.mean_duration_ms - 25.0).abs() < f64::EPSILON);
        assert!((s.p50_duration_ms - 25.0).abs() < f64::EPSILON);
        assert_eq!(s.endpoint_counts["/v1/search/title"], 2);
    }

    #[test]
    fn old_samples_fall_out_of_short_windows() {
        let c = MetricsCollector::new();
        let mut old = sample("/health", 200, 1, false);
        old.at = Utc::now() - ChronoDuration::hours(2);
        c.record(old);
        c.record(sample("/health", 200, 1, false));

        assert_eq!(c.summary(Period::M15).count, 1);
        assert_eq!(c.summary(Period::D7).count, 2);
    }

    #[test]
    fn retention_cap_drops_oldest() {
        let c = MetricsCollector::new();
        for _ in 0..(MAX_SAMPLES + 10) {
            c.record(sample("/health", 200, 1, false));
        }
        assert_eq!(c.len(), MAX_SAMPLES);
    }

    #[test]
    fn period_parsing() {
        assert_eq!("15m".parse::<Period>().unwrap(), Period::M15);
        assert_eq!("1h".parse::<Period>().unwrap(), Period::H1);
        assert_eq!("24h".parse::<Period>().unwrap(), Period::D1);
        assert_eq!("7d".parse::<Period>().unwrap(), Period::D7);
        assert!("2h".parse::<Period>().is_err());
    }

    #[test]
    fn json_exporter_is_parseable() {
        let c = MetricsCollector::new();
        c.record(sample("/health", 200, 5, false));
        let body = JsonExporter.export(&c.summary(Period::H1));
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["count"], 1);
        assert_eq!(JsonExporter.content_type(), "application/json");
    }

    #[test]
    fn prometheus_exporter_emits_gauges() {
        let c = MetricsCollector::new();
        c.record(sample("/v1/search/title", 200, 5, true));
        let body = PrometheusExporter.export(&c.summary(Period::H1));
        assert!(body.contains("bookgate_requests_total 1"));
        assert!(body.contains("bookgate_cache_hit_rate 1"));
        assert!(body.contains(r#"endpoint="/v1/search/title""#));
    }
}
