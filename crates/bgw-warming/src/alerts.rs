// SPDX-License-Identifier: MIT OR Apache-2.0
//! The 15-minute alert sweep.

use bgw_cache::TieredCache;
use bgw_telemetry::{MetricsCollector, Period};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

/// What went out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    ErrorRateHigh,
    CacheHitRateLow,
}

/// One raised alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub kind: AlertKind,
    pub observed: f64,
    pub threshold: f64,
    pub raised_at: DateTime<Utc>,
}

/// Sweep thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    /// 5xx fraction above which an alert raises.
    pub max_error_rate: f64,
    /// Cache hit fraction below which an alert raises (only once there is
    /// traffic to judge).
    pub min_cache_hit_rate: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            max_error_rate: 0.05,
            min_cache_hit_rate: 0.3,
        }
    }
}

/// Inspects recent error rate and cache hit rate; raises alert records.
pub struct AlertMonitor {
    metrics: MetricsCollector,
    cache: Arc<TieredCache>,
    thresholds: AlertThresholds,
    raised: Mutex<Vec<Alert>>,
}

impl AlertMonitor {
    pub fn new(
        metrics: MetricsCollector,
        cache: Arc<TieredCache>,
        thresholds: AlertThresholds,
    ) -> Self {
        Self {
            metrics,
            cache,
            thresholds,
            raised: Mutex::new(Vec::new()),
        }
    }

    /// One sweep over the last 15 minutes. Returns the alerts it raised.
    pub async fn sweep(&self) -> Vec<Alert> {
        let summary = self.metrics.summary(Period::M15);
        let now = Utc::now();
        let mut fresh = Vec::new();

        if summary.count > 0 && summary.error_rate > self.thresholds.max_error_rate {
            fresh.push(Alert {
                kind: AlertKind::ErrorRateHigh,
                observed: summary.error_rate,
                threshold: self.thresholds.max_error_rate,
                raised_at: now,
            });
        }

        if let Some(hit_rate) = self.cache.counters().hit_rate() {
            if hit_rate < self.thresholds.min_cache_hit_rate {
                fresh.push(Alert {
                    kind: AlertKind::CacheHitRateLow,
                    observed: hit_rate,
                    threshold: self.thresholds.min_cache_hit_rate,
                    raised_at: now,
                });
            }
        }

        for alert in &fresh {
            warn!(kind = ?alert.kind, observed = alert.observed, "alert raised");
        }
        self.raised.lock().await.extend(fresh.iter().cloned());
        fresh
    }

    /// Every alert raised since startup (newest last).
    pub async fn history(&self) -> Vec<Alert> {
        self.raised.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bgw_telemetry::RequestSample;

    fn sample(status: u16, cached: bool) -> RequestSample {
        RequestSample {
            endpoint: "/v1/search/title".into(),
            status,
            duration_ms: 5,
            cached,
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn quiet_system_raises_nothing() {
        let metrics = MetricsCollector::new();
        metrics.record(sample(200, true));
        let monitor = AlertMonitor::new(
            metrics,
            Arc::new(TieredCache::in_memory()),
            AlertThresholds::default(),
        );
        assert!(monitor.sweep().await.is_empty());
    }

    #[tokio::test]
    async fn elevated_error_rate_raises() {
        let metrics = MetricsCollector::new();
        for _ in 0..9 {
            metrics.record(sample(200, false));
        }
        metrics.record(sample(502, false));

        let monitor = AlertMonitor::new(
            metrics,
            Arc::new(TieredCache::in_memory()),
            AlertThresholds::default(),
        );
        let alerts = monitor.sweep().await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::ErrorRateHigh);
        assert!((alerts[0].observed - 0.1).abs() < 1e-9);
        assert_eq!(monitor.history().await.len(), 1);
    }

    #[tokio::test]
    async fn cold_cache_raises_once_there_are_lookups() {
        let cache = Arc::new(TieredCache::in_memory());
        // All misses.
        cache.get("nothing-here").await;
        let monitor = AlertMonitor::new(
            MetricsCollector::new(),
            Arc::clone(&cache),
            AlertThresholds::default(),
        );
        let alerts = monitor.sweep().await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::CacheHitRateLow);
    }
}
