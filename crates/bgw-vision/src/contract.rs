// SPDX-License-Identifier: MIT OR Apache-2.0
//! The vision-model contract.

use bgw_core::BoundingBox;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use thiserror::Error;

/// Version of the CSV parsing prompt. Part of the csv-results cache key so
/// a prompt change invalidates previously parsed files.
pub const CSV_PROMPT_VERSION: &str = "csv-parse-v3";

/// One row the model extracted from a CSV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedRow {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
}

/// One book the model detected in a shelf image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    /// Model confidence in `[0, 1]`.
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
}

/// Vision-layer failures, sanitized of upstream detail.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VisionError {
    #[error("vision model rejected the request: {0}")]
    Rejected(String),

    #[error("vision model unavailable: {0}")]
    Unavailable(String),

    #[error("vision model answered with unparseable output")]
    BadModelOutput,
}

/// What the orchestrators need from a vision model.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Extract `{title, author, isbn?}` rows from raw CSV text.
    async fn parse_csv(&self, csv_text: &str) -> Result<Vec<ParsedRow>, VisionError>;

    /// Detect book spines in an image.
    async fn detect_books(
        &self,
        image: &[u8],
        content_type: &str,
    ) -> Result<Vec<Detection>, VisionError>;
}

// ---------------------------------------------------------------------------
// Mock
// ---------------------------------------------------------------------------

/// Scripted vision model for tests and local runs.
#[derive(Default)]
pub struct MockVision {
    rows: Mutex<Vec<ParsedRow>>,
    detections: Mutex<Vec<Detection>>,
    fail_with: Mutex<Option<VisionError>>,
}

impl MockVision {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve these rows for every `parse_csv` call.
    pub fn script_rows(&self, rows: Vec<ParsedRow>) {
        *self.rows.lock().expect("mock lock") = rows;
    }

    /// Serve these detections for every `detect_books` call.
    pub fn script_detections(&self, detections: Vec<Detection>) {
        *self.detections.lock().expect("mock lock") = detections;
    }

    /// Fail every call with `error`.
    pub fn script_failure(&self, error: VisionError) {
        *self.fail_with.lock().expect("mock lock") = Some(error);
    }
}

#[async_trait]
impl VisionModel for MockVision {
    async fn parse_csv(&self, _csv_text: &str) -> Result<Vec<ParsedRow>, VisionError> {
        if let Some(error) = self.fail_with.lock().expect("mock lock").clone() {
            return Err(error);
        }
        Ok(self.rows.lock().expect("mock lock").clone())
    }

    async fn detect_books(
        &self,
        _image: &[u8],
        _content_type: &str,
    ) -> Result<Vec<Detection>, VisionError> {
        if let Some(error) = self.fail_with.lock().expect("mock lock").clone() {
            return Err(error);
        }
        Ok(self.detections.lock().expect("mock lock").clone())
    }
}
