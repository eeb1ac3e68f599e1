// SPDX-License-Identifier: MIT OR Apache-2.0
//! Image validation and token budgeting.

use bgw_config::VisionSettings;
use bgw_error::{ErrorCode, ErrorDto};

/// Single-scan upload ceiling.
pub const SCAN_MAX_BYTES: usize = 5 * 1024 * 1024;
/// Per-image ceiling inside a batch request.
pub const SCAN_MAX_BYTES_BATCH: usize = 10 * 1024 * 1024;

/// Fraction of the model window an image may occupy before a resize is
/// planned.
const WINDOW_BUDGET: f64 = 0.8;

/// Rough token cost of an image payload: `(sizeKB / 3) × 1000`.
pub fn estimate_tokens(size_bytes: usize) -> u64 {
    ((size_bytes as f64 / 1024.0) / 3.0 * 1000.0) as u64
}

/// Downscale parameters handed to the image pipeline when the payload would
/// blow the model's token budget. The gateway only plans the resize; the
/// blob-store image pipeline performs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizePlan {
    pub max_side_px: u32,
    pub jpeg_quality: u8,
}

/// Decide whether the image needs downscaling before the model sees it.
pub fn plan_resize(size_bytes: usize, settings: &VisionSettings) -> Option<ResizePlan> {
    let estimated = estimate_tokens(size_bytes);
    let budget = (settings.context_window_tokens as f64 * WINDOW_BUDGET) as u64;
    if estimated > budget {
        Some(ResizePlan {
            max_side_px: settings.max_side_px,
            jpeg_quality: settings.jpeg_quality,
        })
    } else {
        None
    }
}

/// Validate an uploaded image body: `image/*` content type and within the
/// byte ceiling.
pub fn validate_image(
    content_type: Option<&str>,
    size_bytes: usize,
    max_bytes: usize,
) -> Result<(), ErrorDto> {
    let Some(content_type) = content_type else {
        return Err(ErrorDto::new(ErrorCode::InvalidRequest, "missing content-type"));
    };
    if !content_type.starts_with("image/") {
        return Err(ErrorDto::new(
            ErrorCode::InvalidRequest,
            format!("expected image/*, got {content_type}"),
        ));
    }
    if size_bytes == 0 {
        return Err(ErrorDto::new(ErrorCode::InvalidRequest, "empty image body"));
    }
    if size_bytes > max_bytes {
        return Err(ErrorDto::new(
            ErrorCode::FileTooLarge,
            format!("image exceeds {max_bytes} bytes"),
        ));
    }
    Ok(())
}
