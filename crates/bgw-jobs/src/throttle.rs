// SPDX-License-Identifier: MIT OR Apache-2.0
//! Persistence throttling.
//!
//! Broadcasts are cheap, storage writes are not. Each pipeline has a
//! count threshold and a time threshold; a write goes through when either
//! fires. Terminal transitions always persist; the throttle only governs
//! progress updates.

use bgw_core::Pipeline;
use std::time::{Duration, Instant};

/// Decides when a progress update is worth a storage write.
#[derive(Debug)]
pub struct PersistThrottle {
    count_threshold: u32,
    time_threshold: Duration,
    updates_since_persist: u32,
    last_persist: Instant,
}

impl PersistThrottle {
    /// Thresholds per pipeline: batch enrichment persists every 5 updates
    /// or 10 s, CSV import every 20 updates or 30 s, AI scan every update
    /// (scans have few, chunky steps) or 60 s.
    pub fn for_pipeline(pipeline: Pipeline) -> Self {
        let (count_threshold, time_threshold) = match pipeline {
            Pipeline::BatchEnrichment => (5, Duration::from_secs(10)),
            Pipeline::CsvImport => (20, Duration::from_secs(30)),
            Pipeline::AiScan => (1, Duration::from_secs(60)),
        };
        Self {
            count_threshold,
            time_threshold,
            updates_since_persist: 0,
            last_persist: Instant::now(),
        }
    }

    /// Record one update; `true` means persist now.
    pub fn should_persist(&mut self) -> bool {
        self.updates_since_persist += 1;
        if self.updates_since_persist >= self.count_threshold
            || self.last_persist.elapsed() >= self.time_threshold
        {
            self.mark_persisted();
            true
        } else {
            false
        }
    }

    /// Reset after an out-of-band persist (initialize, terminal states).
    pub fn mark_persisted(&mut self) {
        self.updates_since_persist = 0;
        self.last_persist = Instant::now();
    }
}
