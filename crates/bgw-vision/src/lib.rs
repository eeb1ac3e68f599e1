// SPDX-License-Identifier: MIT OR Apache-2.0
//! Vision-model integration.
//!
//! The gateway never parses CSVs or reads book spines itself; it delegates
//! both to a vision model behind the [`VisionModel`] contract. This crate
//! carries that contract, the Gemini implementation, the CSV pre-validation
//! that runs before any tokens are spent, and the detection post-processing
//! (bounding-box clamping, confidence dedup) for shelf scans.

#![deny(unsafe_code)]

mod contract;
mod csv_check;
mod gemini;
mod image;
mod scan;

pub use contract::{
    Detection, MockVision, ParsedRow, VisionError, VisionModel, CSV_PROMPT_VERSION,
};
pub use csv_check::{validate_csv, CsvStats, CSV_MAX_BYTES, CSV_MAX_ROWS};
pub use gemini::GeminiVision;
pub use image::{
    estimate_tokens, plan_resize, validate_image, ResizePlan, SCAN_MAX_BYTES,
    SCAN_MAX_BYTES_BATCH,
};
pub use scan::{dedupe_detections, parse_detections, APPROVAL_CONFIDENCE};
