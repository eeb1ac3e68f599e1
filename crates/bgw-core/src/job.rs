// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-job state: pipeline tags, the status machine, and the persisted
//! snapshot mutated only by the owning job actor.

use bgw_error::ErrorDto;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a long-running job. One actor owns each id.
pub type JobId = Uuid;

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// The three long-running job kinds. Tags every progress message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pipeline {
    BatchEnrichment,
    CsvImport,
    AiScan,
}

impl Pipeline {
    /// Stable string form used in message envelopes and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BatchEnrichment => "batch_enrichment",
            Self::CsvImport => "csv_import",
            Self::AiScan => "ai_scan",
        }
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// State persisted, work not yet scheduled.
    Initialized,
    /// The timer-run pipeline is executing.
    Running,
    /// All items processed.
    Completed,
    /// The pipeline raised an unrecoverable error.
    Failed,
    /// A cancel request took effect.
    Canceled,
}

impl JobStatus {
    /// Returns `true` if this status represents a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }

    /// Returns the set of statuses that are valid successors of `self`.
    pub fn valid_transitions(&self) -> &'static [JobStatus] {
        match self {
            Self::Initialized => &[Self::Running, Self::Canceled, Self::Failed],
            Self::Running => &[Self::Completed, Self::Failed, Self::Canceled],
            Self::Completed | Self::Failed | Self::Canceled => &[],
        }
    }

    /// Returns `true` if transitioning from `self` to `next` is valid.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

// ---------------------------------------------------------------------------
// JobState
// ---------------------------------------------------------------------------

/// Persisted snapshot of a job. Mutated only by the owning actor; deleted
/// 24 hours after reaching a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobState {
    pub job_id: JobId,
    pub pipeline: Pipeline,
    pub total_count: u32,
    pub processed_count: u32,
    /// Fraction complete in `[0, 1]`.
    pub progress: f64,
    pub status: JobStatus,
    pub start_time: DateTime<Utc>,
    pub last_update_time: DateTime<Utc>,
    /// Cooperative cancellation flag polled by the running pipeline.
    pub canceled: bool,
    /// Terminal summary for completed jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Terminal error for failed jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDto>,
}

impl JobState {
    /// Fresh state as persisted by `initialize`.
    pub fn new(job_id: JobId, pipeline: Pipeline, total_count: u32) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            pipeline,
            total_count,
            processed_count: 0,
            progress: 0.0,
            status: JobStatus::Initialized,
            start_time: now,
            last_update_time: now,
            canceled: false,
            result: None,
            error: None,
        }
    }

    /// Record `processed` items done, recomputing `progress`.
    pub fn record_progress(&mut self, processed: u32) {
        self.processed_count = processed;
        self.progress = if self.total_count == 0 {
            0.0
        } else {
            f64::from(processed.min(self.total_count)) / f64::from(self.total_count)
        };
        self.last_update_time = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
