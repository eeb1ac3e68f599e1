// SPDX-License-Identifier: MIT OR Apache-2.0
//! Batch enrichment.

use crate::context::PipelineContext;
use bgw_enrich::{BookIdentifier, DEFAULT_CONCURRENCY};
use bgw_error::ErrorDto;
use bgw_jobs::JobHandle;
use bgw_protocol::{JobCompletePayload, JobProgressPayload};
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;
use tracing::debug;

/// Enrich `items` through the cache-first search path with bounded
/// concurrency. Each enriched book lands in the per-book cache namespaces,
/// so there is no separate result blob; clients re-query the search
/// endpoints, which now hit.
pub async fn run_batch_enrichment(
    ctx: PipelineContext,
    job: JobHandle,
    items: Vec<BookIdentifier>,
) -> Result<JobCompletePayload, ErrorDto> {
    let started = Instant::now();
    // Progress ordering: nothing is sent before the client attaches or the
    // ready wait gives up.
    job.wait_for_ready().await;
    let total = items.len() as u32;
    job.initialize(total).await;

    let processed = AtomicU32::new(0);
    let succeeded = AtomicU32::new(0);
    let failed = AtomicU32::new(0);

    let job_ref = &job;
    let ctx_ref = &ctx;
    let processed_ref = &processed;
    let succeeded_ref = &succeeded;
    let failed_ref = &failed;

    stream::iter(items.into_iter())
        .map(|identifier| async move {
            // Safe point: items not yet dispatched stay unprocessed after a
            // cancel.
            if job_ref.is_canceled() {
                return;
            }
            let result = ctx_ref.enrich(&identifier).await;
            match result {
                Ok(outcome) if !outcome.bundle.is_empty() => {
                    succeeded_ref.fetch_add(1, Ordering::Relaxed);
                }
                Ok(_) | Err(_) => {
                    debug!(%identifier, "batch item produced no enrichment");
                    failed_ref.fetch_add(1, Ordering::Relaxed);
                }
            }
            let done = processed_ref.fetch_add(1, Ordering::Relaxed) + 1;
            job_ref.update_progress(JobProgressPayload {
                processed_count: done,
                total_count: total,
                progress: f64::from(done) / f64::from(total.max(1)),
                message: Some(identifier.to_string()),
            });
        })
        .buffer_unordered(DEFAULT_CONCURRENCY)
        .collect::<Vec<()>>()
        .await;

    Ok(JobCompletePayload {
        total_processed: processed.load(Ordering::Relaxed),
        success_count: succeeded.load(Ordering::Relaxed),
        failure_count: failed.load(Ordering::Relaxed),
        duration: started.elapsed().as_millis() as u64,
        resource_id: None,
    })
}
