// SPDX-License-Identifier: MIT OR Apache-2.0
//! AI bookshelf scans.

use crate::context::PipelineContext;
use bgw_cache::{CacheNamespace, CacheRecord};
use bgw_core::{BookBundle, ReviewStatus};
use bgw_enrich::BookIdentifier;
use bgw_error::{ErrorCode, ErrorDto};
use bgw_jobs::JobHandle;
use bgw_protocol::{JobCompletePayload, JobProgressPayload};
use bgw_vision::{
    dedupe_detections, Detection, VisionError, APPROVAL_CONFIDENCE,
};
use futures::future;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// One detected book after enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannedBook {
    pub detection: Detection,
    /// Enrichment result, when a provider matched the spine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book: Option<BookBundle>,
    pub review: ReviewStatus,
    /// Which batch image this spine came from (0 for single scans).
    pub image_index: usize,
}

/// Counters the completion summary mirrors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub total_detected: u32,
    pub approved: u32,
    pub needs_review: u32,
    pub duration: u64,
}

/// Full scan result stored at `scan-results:<jobId>` for 24 hours.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub books: Vec<ScannedBook>,
    pub summary: ScanSummary,
}

/// An uploaded image inside a batch request.
#[derive(Debug, Clone)]
pub struct ScanImage {
    pub index: usize,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Single-image scan: detect, dedupe, enrich, classify, store, summarize.
pub async fn run_ai_scan(
    ctx: PipelineContext,
    job: JobHandle,
    image: Vec<u8>,
    content_type: String,
) -> Result<JobCompletePayload, ErrorDto> {
    let started = Instant::now();
    job.wait_for_ready().await;

    let detections = detect(&ctx, &image, &content_type).await?;
    let total = detections.len() as u32;
    job.initialize(total).await;

    let mut result = ScanResult::default();
    process_detections(&ctx, &job, detections, 0, &mut result, total, 0).await;
    finish_scan(&ctx, &job, result, started).await
}

/// Batch scan: up to five images, uploaded to blob storage in parallel,
/// then processed sequentially with per-image progress attribution.
pub async fn run_batch_scan(
    ctx: PipelineContext,
    job: JobHandle,
    images: Vec<ScanImage>,
) -> Result<JobCompletePayload, ErrorDto> {
    let started = Instant::now();
    job.wait_for_ready().await;

    // Park the originals so a failed pipeline can be re-run without a
    // re-upload.
    let uploads = images.iter().map(|image| {
        let path = format!("scans/{}/{}.img", job.job_id(), image.index);
        let ctx = &ctx;
        async move {
            ctx.images
                .put(&path, image.bytes.clone(), &image.content_type)
                .await
        }
    });
    for upload in future::join_all(uploads).await {
        if let Err(err) = upload {
            return Err(ErrorDto::new(
                ErrorCode::InternalError,
                format!("image upload failed: {err}"),
            ));
        }
    }

    // Detect everything first so `job_started` can carry the real total.
    let mut per_image: Vec<(usize, Vec<Detection>)> = Vec::new();
    for image in &images {
        if job.is_canceled() {
            break;
        }
        let detections = detect(&ctx, &image.bytes, &image.content_type).await?;
        per_image.push((image.index, detections));
    }
    let total: u32 = per_image.iter().map(|(_, d)| d.len() as u32).sum();
    job.initialize(total).await;

    let mut result = ScanResult::default();
    let mut processed_so_far = 0u32;
    for (image_index, detections) in per_image {
        // Safe point between images; partial results survive.
        if job.is_canceled() {
            debug!(image_index, "batch scan canceled between images");
            break;
        }
        processed_so_far = process_detections(
            &ctx,
            &job,
            detections,
            image_index,
            &mut result,
            total,
            processed_so_far,
        )
        .await;
    }
    finish_scan(&ctx, &job, result, started).await
}

async fn detect(
    ctx: &PipelineContext,
    image: &[u8],
    content_type: &str,
) -> Result<Vec<Detection>, ErrorDto> {
    let raw = ctx
        .vision
        .detect_books(image, content_type)
        .await
        .map_err(|error| match error {
            VisionError::Rejected(detail) => ErrorDto::new(ErrorCode::InvalidRequest, detail),
            VisionError::Unavailable(detail) => ErrorDto::new(ErrorCode::ProviderError, detail),
            VisionError::BadModelOutput => {
                ErrorDto::new(ErrorCode::ProviderError, "vision model output unusable")
            }
        })?;
    let deduped = dedupe_detections(
        raw.into_iter()
            .map(|mut d| {
                d.confidence = d.confidence.clamp(0.0, 1.0);
                d.bounding_box = d.bounding_box.map(|b| b.clamp_unit());
                d
            })
            .collect(),
    );
    info!(detected = deduped.len(), "shelf scan detections");
    Ok(deduped)
}

/// Enrich one image's detections; returns the updated processed count.
#[allow(clippy::too_many_arguments)]
async fn process_detections(
    ctx: &PipelineContext,
    job: &JobHandle,
    detections: Vec<Detection>,
    image_index: usize,
    result: &mut ScanResult,
    total: u32,
    mut processed: u32,
) -> u32 {
    for detection in detections {
        // Safe point per spine.
        if job.is_canceled() {
            break;
        }

        let identifier = BookIdentifier::from_row(
            Some(detection.title.as_str()),
            detection.author.as_deref(),
            detection.isbn.as_deref(),
        );
        let book = match &identifier {
            Some(identifier) => match ctx.enrich(identifier).await {
                Ok(outcome) if !outcome.bundle.is_empty() => Some(outcome.bundle),
                Ok(_) => None,
                Err(error) => {
                    debug!(title = %detection.title, code = %error.code, "spine enrichment failed");
                    None
                }
            },
            None => None,
        };

        let review = if detection.confidence >= APPROVAL_CONFIDENCE {
            ReviewStatus::Verified
        } else {
            ReviewStatus::NeedsReview
        };
        match review {
            ReviewStatus::Verified => result.summary.approved += 1,
            _ => result.summary.needs_review += 1,
        }
        result.summary.total_detected += 1;

        let title = detection.title.clone();
        result.books.push(ScannedBook {
            detection,
            book,
            review,
            image_index,
        });

        processed += 1;
        job.update_progress(JobProgressPayload {
            processed_count: processed,
            total_count: total,
            progress: f64::from(processed) / f64::from(total.max(1)),
            message: Some(format!("image {image_index}: {title}")),
        });
    }
    processed
}

async fn finish_scan(
    ctx: &PipelineContext,
    job: &JobHandle,
    mut result: ScanResult,
    started: Instant,
) -> Result<JobCompletePayload, ErrorDto> {
    result.summary.duration = started.elapsed().as_millis() as u64;
    let summary = result.summary;

    let resource_id = format!("scan-results:{}", job.job_id());
    if let Ok(data) = serde_json::to_value(&result) {
        let record = CacheRecord::new(data, summary.duration, None);
        ctx.search
            .cache()
            .put(&resource_id, record, CacheNamespace::ScanResults, 0.5)
            .await;
    }

    let enriched = result.books.iter().filter(|b| b.book.is_some()).count() as u32;
    let processed = result.books.len() as u32;
    debug_assert_eq!(summary.approved + summary.needs_review, summary.total_detected);

    Ok(JobCompletePayload {
        total_processed: processed,
        success_count: enriched,
        failure_count: processed - enriched,
        duration: summary.duration,
        resource_id: Some(resource_id),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
