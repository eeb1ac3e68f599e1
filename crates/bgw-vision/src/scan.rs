// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shelf-scan detection post-processing.

use crate::contract::{Detection, VisionError};
use bgw_normalize::{canonical_isbn13, normalize_author, normalize_title};
use std::collections::HashMap;

/// Detections at or above this confidence are auto-approved; the rest are
/// flagged for human review.
pub const APPROVAL_CONFIDENCE: f64 = 0.6;

/// Parse the model's JSON answer into detections, clamping confidence and
/// bounding boxes into the unit interval and dropping titleless entries.
pub fn parse_detections(model_output: &str) -> Result<Vec<Detection>, VisionError> {
    let raw: Vec<Detection> = serde_json::from_str(strip_code_fences(model_output))
        .map_err(|_| VisionError::BadModelOutput)?;
    Ok(raw
        .into_iter()
        .filter(|d| !d.title.trim().is_empty())
        .map(|mut d| {
            d.confidence = d.confidence.clamp(0.0, 1.0);
            d.bounding_box = d.bounding_box.map(|b| b.clamp_unit());
            d.isbn = d.isbn.as_deref().and_then(canonical_isbn13);
            d
        })
        .collect())
}

/// Models love to wrap JSON in markdown fences.
fn strip_code_fences(output: &str) -> &str {
    let trimmed = output.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

/// Deduplicate detections: by canonical ISBN when present, otherwise by
/// `title::author` under normalization; the highest-confidence duplicate
/// wins.
pub fn dedupe_detections(detections: Vec<Detection>) -> Vec<Detection> {
    let mut order: Vec<String> = Vec::new();
    let mut best: HashMap<String, Detection> = HashMap::new();
    for detection in detections {
        let key = match &detection.isbn {
            Some(isbn) => format!("isbn:{isbn}"),
            None => format!(
                "{}::{}",
                normalize_title(&detection.title),
                detection.author.as_deref().map(normalize_author).unwrap_or_default()
            ),
        };
        match best.get_mut(&key) {
            None => {
                order.push(key.clone());
                best.insert(key, detection);
            }
            Some(existing) => {
                if detection.confidence > existing.confidence {
                    *existing = detection;
                }
            }
        }
    }
    order.into_iter().filter_map(|k| best.remove(&k)).collect()
}
