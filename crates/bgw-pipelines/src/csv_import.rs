// SPDX-License-Identifier: MIT OR Apache-2.0
//! CSV import.

use crate::context::PipelineContext;
use bgw_cache::{CacheNamespace, CacheRecord};
use bgw_core::BookBundle;
use bgw_enrich::BookIdentifier;
use bgw_error::{ErrorCode, ErrorDto};
use bgw_jobs::JobHandle;
use bgw_protocol::{JobCompletePayload, JobProgressPayload};
use bgw_vision::{validate_csv, ParsedRow, VisionError, CSV_PROMPT_VERSION};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Instant;
use tracing::{debug, info};

/// A row that could not be imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    /// 1-based data-row number.
    pub row: usize,
    pub reason: String,
}

/// Full import result stored at `csv-results:<jobId>` for 24 hours.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvImportResult {
    pub books: Vec<BookBundle>,
    pub errors: Vec<RowError>,
    /// `"ok/total"`.
    pub success_rate: String,
}

/// Import a CSV: validate, parse through the vision model (cached by
/// content hash and prompt version), enrich every row, store the full
/// result, and return the summary.
pub async fn run_csv_import(
    ctx: PipelineContext,
    job: JobHandle,
    csv_text: String,
) -> Result<JobCompletePayload, ErrorDto> {
    let started = Instant::now();
    job.wait_for_ready().await;

    let stats = validate_csv(&csv_text)?;
    info!(rows = stats.row_count, columns = stats.column_count, "CSV validated");

    let rows = parse_rows(&ctx, &csv_text).await?;
    let total = rows.len() as u32;
    job.initialize(total).await;

    let mut result = CsvImportResult::default();
    let mut processed = 0u32;

    for (index, row) in rows.into_iter().enumerate() {
        // Safe point: each row checks the flag before any work.
        if job.is_canceled() {
            debug!(processed, "CSV import canceled mid-run");
            break;
        }

        let identifier = BookIdentifier::from_row(
            Some(row.title.as_str()),
            row.author.as_deref(),
            row.isbn.as_deref(),
        );
        match identifier {
            None => result.errors.push(RowError {
                row: index + 1,
                reason: "row has neither a usable title nor a valid ISBN".into(),
            }),
            Some(identifier) => match ctx.enrich(&identifier).await {
                Ok(outcome) if !outcome.bundle.is_empty() => result.books.push(outcome.bundle),
                Ok(_) => result.errors.push(RowError {
                    row: index + 1,
                    reason: format!("no provider had a match for {identifier}"),
                }),
                Err(error) => result.errors.push(RowError {
                    row: index + 1,
                    reason: error.message,
                }),
            },
        }

        processed += 1;
        job.update_progress(JobProgressPayload {
            processed_count: processed,
            total_count: total,
            progress: f64::from(processed) / f64::from(total.max(1)),
            message: Some(row.title),
        });
    }

    let success = result.books.len() as u32;
    let failure = result.errors.len() as u32;
    result.success_rate = format!("{success}/{total}");

    // Partial results are stored too; a canceled import still leaves what
    // it finished retrievable.
    let resource_id = format!("csv-results:{}", job.job_id());
    store_result(&ctx, &resource_id, &result, started).await;

    Ok(JobCompletePayload {
        total_processed: processed,
        success_count: success,
        failure_count: failure,
        duration: started.elapsed().as_millis() as u64,
        resource_id: Some(resource_id),
    })
}

/// Vision-parse the CSV, caching by content hash + prompt version so a
/// re-upload of the same file skips the model and a prompt change
/// invalidates old parses.
async fn parse_rows(ctx: &PipelineContext, csv_text: &str) -> Result<Vec<ParsedRow>, ErrorDto> {
    let digest = hex::encode(Sha256::digest(csv_text.as_bytes()));
    let parse_key = format!("csv-parse:{CSV_PROMPT_VERSION}:{digest}");

    let cached = ctx.search.cache().get(&parse_key).await;
    if let Some(record) = cached.record {
        if let Ok(rows) = serde_json::from_value::<Vec<ParsedRow>>(record.data) {
            debug!(%parse_key, "CSV parse served from cache");
            return Ok(rows);
        }
    }

    let rows = ctx.vision.parse_csv(csv_text).await.map_err(vision_error)?;
    if let Ok(data) = serde_json::to_value(&rows) {
        ctx.search
            .cache()
            .put(&parse_key, CacheRecord::new(data, 0, None), CacheNamespace::CsvResults, 1.0)
            .await;
    }
    Ok(rows)
}

fn vision_error(error: VisionError) -> ErrorDto {
    let code = match error {
        VisionError::Rejected(_) => ErrorCode::InvalidRequest,
        VisionError::Unavailable(_) => ErrorCode::ProviderError,
        VisionError::BadModelOutput => ErrorCode::ProviderError,
    };
    ErrorDto::new(code, error.to_string())
}

async fn store_result(
    ctx: &PipelineContext,
    resource_id: &str,
    result: &CsvImportResult,
    started: Instant,
) {
    let Ok(data) = serde_json::to_value(result) else {
        return;
    };
    let record = CacheRecord::new(data, started.elapsed().as_millis() as u64, None);
    // Job results skip quality adjustment: fixed 24h retention.
    ctx.search
        .cache()
        .put(resource_id, record, CacheNamespace::CsvResults, 0.5)
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::images::MemoryImageStore;
    use bgw_cache::TieredCache;
    use bgw_core::{Author, Edition, ProviderId, Work};
    use bgw_enrich::{Enricher, SearchService};
    use bgw_jobs::{JobActorConfig, JobRegistry, MemoryJobStore};
    use bgw_providers::StaticProvider;
    use bgw_vision::MockVision;
    use std::sync::Arc;

    fn bundle_for(title: &str, isbn: &str) -> BookBundle {
        let w = Work::new(title, ProviderId::Isbndb);
        let mut e = Edition::new(title, ProviderId::Isbndb);
        e.set_isbn(isbn);
        BookBundle {
            works: vec![w],
            editions: vec![e],
            authors: vec![Author::new("Some Author")],
        }
    }

    fn context(vision: MockVision) -> PipelineContext {
        let provider = StaticProvider::new(ProviderId::Isbndb);
        provider.stub_title("harry potter", bundle_for("Harry Potter", "9780747532743"));
        provider.stub_title("1984", bundle_for("1984", "9780451524935"));
        provider.stub_title("hobbit", bundle_for("The Hobbit", "9780547928227"));
        PipelineContext::new(
            Arc::new(SearchService::new(
                Arc::new(TieredCache::in_memory()),
                Arc::new(Enricher::new(vec![Arc::new(provider)])),
            )),
            Arc::new(vision),
            Arc::new(MemoryImageStore::new()),
        )
    }

    fn job() -> JobHandle {
        let registry = JobRegistry::with_config(
            Arc::new(MemoryJobStore::new()),
            JobActorConfig {
                ready_timeout: Duration::from_millis(50),
                close_delay: Duration::from_millis(10),
                cleanup_delay: Duration::from_secs(60),
            },
        );
        registry.create(bgw_core::Pipeline::CsvImport, None).0
    }

    fn three_rows() -> Vec<ParsedRow> {
        vec![
            ParsedRow {
                title: "Harry Potter".into(),
                author: Some("J.K. Rowling".into()),
                isbn: None,
            },
            ParsedRow {
                title: "1984".into(),
                author: Some("George Orwell".into()),
                isbn: None,
            },
            ParsedRow {
                title: "Hobbit".into(),
                author: Some("J.R.R. Tolkien".into()),
                isbn: None,
            },
        ]
    }

    #[tokio::test]
    async fn three_row_import_succeeds_and_stores_results() {
        let vision = MockVision::new();
        vision.script_rows(three_rows());
        let ctx = context(vision);
        let job = job();
        let job_id = job.job_id();

        let csv = "Title,Author,ISBN\nHarry Potter,J.K. Rowling,\n1984,George Orwell,\nHobbit,J.R.R. Tolkien,\n";
        let summary = run_csv_import(ctx.clone(), job, csv.to_string()).await.unwrap();

        assert_eq!(summary.total_processed, 3);
        assert_eq!(summary.success_count, 3);
        assert_eq!(summary.failure_count, 0);
        let resource_id = summary.resource_id.unwrap();
        assert_eq!(resource_id, format!("csv-results:{job_id}"));

        // Full result is retrievable out-of-band.
        let stored = ctx.search.cache().get(&resource_id).await;
        let result: CsvImportResult = serde_json::from_value(stored.record.unwrap().data).unwrap();
        assert_eq!(result.books.len(), 3);
        assert_eq!(result.success_rate, "3/3");
    }

    #[tokio::test]
    async fn invalid_csv_fails_before_the_model_runs() {
        let vision = MockVision::new();
        vision.script_failure(VisionError::BadModelOutput);
        let ctx = context(vision);

        let err = run_csv_import(ctx, job(), "Title,Author\nDune,Frank Herbert,EXTRA\n".into())
            .await
            .unwrap_err();
        // Validation rejected the ragged row; the scripted model failure
        // never had the chance to fire.
        assert_eq!(err.code, ErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn unmatched_rows_become_row_errors() {
        let vision = MockVision::new();
        vision.script_rows(vec![ParsedRow {
            title: "Completely Unknown Tome".into(),
            author: None,
            isbn: None,
        }]);
        let ctx = context(vision);
        let job = job();
        let resource_id = format!("csv-results:{}", job.job_id());

        let summary = run_csv_import(ctx.clone(), job, "Title\nCompletely Unknown Tome\n".into())
            .await
            .unwrap();
        assert_eq!(summary.success_count, 0);
        assert_eq!(summary.failure_count, 1);

        let stored = ctx.search.cache().get(&resource_id).await;
        let result: CsvImportResult = serde_json::from_value(stored.record.unwrap().data).unwrap();
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].row, 1);
        assert_eq!(result.success_rate, "0/1");
    }

    #[tokio::test]
    async fn second_import_of_same_file_skips_the_model() {
        let vision = MockVision::new();
        vision.script_rows(three_rows());
        let ctx = context(vision);

        let csv = "Title,Author,ISBN\nHarry Potter,,\n1984,,\nHobbit,,\n".to_string();
        run_csv_import(ctx.clone(), job(), csv.clone()).await.unwrap();

        // Re-script the vision model to fail; the cached parse must carry
        // the second run.
        let vision2 = MockVision::new();
        vision2.script_failure(VisionError::Unavailable("down".into()));
        let ctx2 = PipelineContext::new(
            Arc::clone(&ctx.search),
            Arc::new(vision2),
            Arc::clone(&ctx.images),
        );
        let summary = run_csv_import(ctx2, job(), csv).await.unwrap();
        assert_eq!(summary.total_processed, 3);
    }
}
