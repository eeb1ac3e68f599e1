// SPDX-License-Identifier: MIT OR Apache-2.0
//! The shared message envelope and its typed payloads.

use bgw_core::{JobId, JobStatus, Pipeline};
use bgw_error::ErrorDto;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Protocol version stamped on every envelope. Bump the minor for additive
/// payload fields, the major for breaking changes.
pub const PROTOCOL_VERSION: &str = "1.0.0";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures while parsing a wire message.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed JSON: {0}")]
    MalformedJson(String),

    #[error("message missing required 'type' field")]
    MissingType,

    #[error("unknown message type '{0}'")]
    UnknownType(String),
}

// ---------------------------------------------------------------------------
// Message kinds
// ---------------------------------------------------------------------------

/// Discriminant of a server→client message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    JobStarted,
    JobProgress,
    JobComplete,
    Error,
    Ping,
    Pong,
    /// Snapshot replayed to a client that reattached to a live job.
    Reconnected,
}

impl MessageKind {
    /// Terminal messages end the conversation; the server sends at most one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::JobComplete | Self::Error)
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// `job_started` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStartedPayload {
    pub total_count: u32,
}

/// `job_progress` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressPayload {
    pub processed_count: u32,
    pub total_count: u32,
    /// Fraction complete in `[0, 1]`.
    pub progress: f64,
    /// Human-readable note (current row, current image index).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `job_complete` payload. Counts only; the full result lives at
/// `resource_id` in the cache for 24 hours and travels over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCompletePayload {
    pub total_processed: u32,
    pub success_count: u32,
    pub failure_count: u32,
    /// Wall-clock milliseconds from start to completion.
    pub duration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

/// `error` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl From<&ErrorDto> for ErrorPayload {
    fn from(dto: &ErrorDto) -> Self {
        Self {
            code: dto.code.as_str().to_string(),
            message: dto.message.clone(),
            retryable: dto.code.retryable(),
        }
    }
}

/// `reconnected` payload: the current job snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectedPayload {
    pub status: JobStatus,
    pub processed_count: u32,
    pub total_count: u32,
    pub progress: f64,
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The wire envelope shared by every message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEnvelope {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub job_id: JobId,
    pub pipeline: Pipeline,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub payload: serde_json::Value,
}

impl ProgressEnvelope {
    fn new(kind: MessageKind, job_id: JobId, pipeline: Pipeline, payload: serde_json::Value) -> Self {
        Self {
            kind,
            job_id,
            pipeline,
            timestamp: Utc::now(),
            version: PROTOCOL_VERSION.to_string(),
            payload,
        }
    }

    pub fn job_started(job_id: JobId, pipeline: Pipeline, payload: &JobStartedPayload) -> Self {
        Self::new(MessageKind::JobStarted, job_id, pipeline, to_value(payload))
    }

    pub fn job_progress(job_id: JobId, pipeline: Pipeline, payload: &JobProgressPayload) -> Self {
        Self::new(MessageKind::JobProgress, job_id, pipeline, to_value(payload))
    }

    pub fn job_complete(job_id: JobId, pipeline: Pipeline, payload: &JobCompletePayload) -> Self {
        Self::new(MessageKind::JobComplete, job_id, pipeline, to_value(payload))
    }

    pub fn error(job_id: JobId, pipeline: Pipeline, payload: &ErrorPayload) -> Self {
        Self::new(MessageKind::Error, job_id, pipeline, to_value(payload))
    }

    pub fn pong(job_id: JobId, pipeline: Pipeline) -> Self {
        Self::new(MessageKind::Pong, job_id, pipeline, serde_json::Value::Null)
    }

    pub fn reconnected(job_id: JobId, pipeline: Pipeline, payload: &ReconnectedPayload) -> Self {
        Self::new(MessageKind::Reconnected, job_id, pipeline, to_value(payload))
    }

    /// Serialize for the socket.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Parse a wire message, distinguishing bad JSON from a missing or
    /// unknown `type` (both close 1002, but logs differ).
    pub fn parse(input: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value =
            serde_json::from_str(input).map_err(|e| ProtocolError::MalformedJson(e.to_string()))?;
        let kind = value.get("type").ok_or(ProtocolError::MissingType)?;
        let kind_str = kind.as_str().ok_or(ProtocolError::MissingType)?;
        if serde_json::from_value::<MessageKind>(serde_json::Value::String(kind_str.into())).is_err()
        {
            return Err(ProtocolError::UnknownType(kind_str.to_string()));
        }
        serde_json::from_value(value).map_err(|e| ProtocolError::MalformedJson(e.to_string()))
    }
}

fn to_value<T: Serialize>(payload: &T) -> serde_json::Value {
    serde_json::to_value(payload).unwrap_or(serde_json::Value::Null)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn roundtrip(envelope: &ProgressEnvelope) -> ProgressEnvelope {
        ProgressEnvelope::parse(&envelope.to_json()).expect("roundtrip parse")
    }

    #[test]
    fn every_message_kind_roundtrips() {
        let job = Uuid::new_v4();
        let messages = vec![
            ProgressEnvelope::job_started(
                job,
                Pipeline::CsvImport,
                &JobStartedPayload { total_count: 3 },
            ),
            ProgressEnvelope::job_progress(
                job,
                Pipeline::CsvImport,
                &JobProgressPayload {
                    processed_count: 1,
                    total_count: 3,
                    progress: 1.0 / 3.0,
                    message: Some("row 1".into()),
                },
            ),
            ProgressEnvelope::job_complete(
                job,
                Pipeline::CsvImport,
                &JobCompletePayload {
                    total_processed: 3,
                    success_count: 3,
                    failure_count: 0,
                    duration: 1234,
                    resource_id: Some(format!("csv-results:{job}")),
                },
            ),
            ProgressEnvelope::error(
                job,
                Pipeline::AiScan,
                &ErrorPayload {
                    code: "PROVIDER_TIMEOUT".into(),
                    message: "deadline elapsed".into(),
                    retryable: true,
                },
            ),
            ProgressEnvelope::pong(job, Pipeline::BatchEnrichment),
            ProgressEnvelope::reconnected(
                job,
                Pipeline::BatchEnrichment,
                &ReconnectedPayload {
                    status: JobStatus::Running,
                    processed_count: 20,
                    total_count: 50,
                    progress: 0.4,
                },
            ),
        ];
        for message in &messages {
            assert_eq!(&roundtrip(message), message);
        }
    }

    #[test]
    fn envelope_carries_version_and_pipeline_tag() {
        let env = ProgressEnvelope::job_started(
            Uuid::new_v4(),
            Pipeline::AiScan,
            &JobStartedPayload { total_count: 1 },
        );
        let json: serde_json::Value = serde_json::from_str(&env.to_json()).unwrap();
        assert_eq!(json["version"], PROTOCOL_VERSION);
        assert_eq!(json["pipeline"], "ai_scan");
        assert_eq!(json["type"], "job_started");
        assert!(json["jobId"].is_string());
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn malformed_json_is_distinguished() {
        assert!(matches!(
            ProgressEnvelope::parse("{not json"),
            Err(ProtocolError::MalformedJson(_))
        ));
    }

    #[test]
    fn missing_type_is_rejected() {
        assert!(matches!(
            ProgressEnvelope::parse(r#"{"jobId": "x"}"#),
            Err(ProtocolError::MissingType)
        ));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let input = r#"{"type": "job_exploded", "jobId": "x"}"#;
        assert!(matches!(
            ProgressEnvelope::parse(input),
            Err(ProtocolError::UnknownType(t)) if t == "job_exploded"
        ));
    }

    #[test]
    fn terminal_kinds() {
        assert!(MessageKind::JobComplete.is_terminal());
        assert!(MessageKind::Error.is_terminal());
        assert!(!MessageKind::JobProgress.is_terminal());
        assert!(!MessageKind::Reconnected.is_terminal());
    }

    #[test]
    fn error_payload_from_dto_derives_retryability() {
        let dto = ErrorDto::new(bgw_error::ErrorCode::ProviderTimeout, "slow upstream");
        let payload = ErrorPayload::from(&dto);
        assert_eq!(payload.code, "PROVIDER_TIMEOUT");
        assert!(payload.retryable);

        let dto = ErrorDto::new(bgw_error::ErrorCode::InvalidRequest, "bad body");
        assert!(!ErrorPayload::from(&dto).retryable);
    }
}
