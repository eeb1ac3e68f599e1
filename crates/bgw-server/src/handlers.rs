// SPDX-License-Identifier: MIT OR Apache-2.0
//! Request handlers.

use crate::error::ApiError;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::Engine;
use bgw_core::{JobId, Pipeline, ResponseEnvelope, ResponseMetadata};
use bgw_enrich::{BookIdentifier, SearchOutcome};
use bgw_error::ErrorCode;
use bgw_jobs::RefreshError;
use bgw_pipelines::{
    run_ai_scan, run_batch_enrichment, run_batch_scan, run_csv_import, ScanImage,
};
use bgw_telemetry::{JsonExporter, MetricsExporter, Period, PrometheusExporter};
use bgw_vision::{plan_resize, validate_image, CSV_MAX_BYTES, SCAN_MAX_BYTES, SCAN_MAX_BYTES_BATCH};
use bgw_warming::WarmingMessage;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Batch enrichment request ceiling.
const BATCH_ENRICHMENT_MAX_BOOKS: usize = 500;
/// Batch scan request ceiling.
const BATCH_SCAN_MAX_IMAGES: usize = 5;

// ---------------------------------------------------------------------------
// Envelope plumbing
// ---------------------------------------------------------------------------

/// Wrap a search outcome in the standard envelope, exposing the cache tier
/// through `x-cache` for the metrics middleware.
fn search_response(outcome: &SearchOutcome) -> Response {
    let mut metadata = ResponseMetadata::cached_from(outcome.source, outcome.elapsed_ms);
    metadata.provider = outcome.provider.clone();
    let envelope = ResponseEnvelope::ok(&outcome.bundle, metadata);
    let mut response = Json(&envelope).into_response();
    if let Ok(value) = outcome.source.to_string().parse() {
        response.headers_mut().insert("x-cache", value);
    }
    response
}

/// Bookkeeping every search answer feeds: the archival journal and the
/// cover-harvest ISBN log.
async fn journal_outcome(state: &AppState, outcome: &SearchOutcome) {
    state.key_journal.record(&outcome.cache_key).await;
    for edition in &outcome.bundle.editions {
        if let Some(isbn) = &edition.isbn {
            state.isbn_log.record(isbn).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct TitleQuery {
    q: Option<String>,
    #[serde(rename = "maxResults")]
    max_results: Option<u32>,
}

pub async fn search_title(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TitleQuery>,
) -> Result<Response, ApiError> {
    let q = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::new(ErrorCode::MissingParam, "q is required"))?;
    let outcome = state.search.search_title(q, params.max_results).await?;
    journal_outcome(&state, &outcome).await;
    Ok(search_response(&outcome))
}

#[derive(Debug, Deserialize)]
pub struct IsbnQuery {
    isbn: Option<String>,
}

pub async fn search_isbn(
    State(state): State<Arc<AppState>>,
    Query(params): Query<IsbnQuery>,
) -> Result<Response, ApiError> {
    let isbn = params
        .isbn
        .as_deref()
        .map(str::trim)
        .filter(|i| !i.is_empty())
        .ok_or_else(|| ApiError::new(ErrorCode::MissingParam, "isbn is required"))?;
    let outcome = state.search.search_isbn(isbn).await?;
    journal_outcome(&state, &outcome).await;
    Ok(search_response(&outcome))
}

#[derive(Debug, Deserialize)]
pub struct AdvancedQuery {
    title: Option<String>,
    author: Option<String>,
}

pub async fn search_advanced(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AdvancedQuery>,
) -> Result<Response, ApiError> {
    let outcome = state
        .search
        .search_advanced(params.title.as_deref(), params.author.as_deref())
        .await?;
    journal_outcome(&state, &outcome).await;

    // Authors people actually search for are warming candidates.
    if let Some(author) = params.author.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
        state.warming.enqueue(WarmingMessage {
            author: author.to_string(),
            depth: 1,
        });
    }
    Ok(search_response(&outcome))
}

#[derive(Debug, Deserialize)]
pub struct EditionsQuery {
    #[serde(rename = "workTitle")]
    work_title: Option<String>,
    author: Option<String>,
    limit: Option<u32>,
}

pub async fn search_editions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EditionsQuery>,
) -> Result<Response, ApiError> {
    let (Some(work_title), Some(author)) = (
        params.work_title.as_deref().map(str::trim).filter(|t| !t.is_empty()),
        params.author.as_deref().map(str::trim).filter(|a| !a.is_empty()),
    ) else {
        return Err(ApiError::new(
            ErrorCode::MissingParam,
            "workTitle and author are both required",
        ));
    };

    let outcome = state
        .search
        .search_editions(work_title, author, params.limit)
        .await?;
    if outcome.bundle.editions.is_empty() {
        return Err(ApiError::not_found(format!(
            "no editions found for '{work_title}'"
        )));
    }
    journal_outcome(&state, &outcome).await;
    Ok(search_response(&outcome))
}

// ---------------------------------------------------------------------------
// Long-running jobs: shared 202 plumbing
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JobAccepted {
    job_id: JobId,
    token: Uuid,
    expires_in: u64,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    websocket_ready: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stages: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    estimated_range: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total_photos: Option<usize>,
}

impl JobAccepted {
    fn new(job_id: JobId, token: &bgw_jobs::AuthToken) -> Self {
        Self {
            job_id,
            token: token.token,
            expires_in: token.expires_in_secs(chrono::Utc::now()),
            status: "accepted",
            websocket_ready: None,
            stages: None,
            estimated_range: None,
            total_photos: None,
        }
    }
}

// ---------------------------------------------------------------------------
// AI scan
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ScanQuery {
    #[serde(rename = "jobId")]
    job_id: Option<JobId>,
}

pub async fn start_scan(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ScanQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    validate_image(content_type.as_deref(), body.len(), SCAN_MAX_BYTES)?;
    let content_type = content_type.unwrap_or_else(|| "image/jpeg".into());

    // Only the Gemini vision path is wired today; reject surprises rather
    // than silently ignoring the header.
    if let Some(requested) = headers.get("x-ai-provider").and_then(|v| v.to_str().ok()) {
        if !requested.eq_ignore_ascii_case("gemini") {
            return Err(ApiError::invalid(format!(
                "unsupported AI provider '{requested}'"
            )));
        }
    }

    if let Some(plan) = plan_resize(body.len(), &state.config.vision) {
        debug!(?plan, bytes = body.len(), "image will be downscaled for the model");
    }

    let (job, token) = state.registry.create(Pipeline::AiScan, params.job_id);
    let ctx = state.pipelines.clone();
    let bytes = body.to_vec();
    job.schedule_work(move |handle| run_ai_scan(ctx, handle, bytes, content_type));

    let mut accepted = JobAccepted::new(job.job_id(), &token);
    accepted.websocket_ready = Some(true);
    accepted.stages = Some(vec!["detecting", "enriching", "storing"]);
    accepted.estimated_range = Some("10-60s");
    Ok((StatusCode::ACCEPTED, Json(accepted)).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchScanRequest {
    job_id: Option<JobId>,
    images: Vec<BatchScanImage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchScanImage {
    index: usize,
    /// Base64-encoded image bytes.
    data: String,
    #[serde(default)]
    content_type: Option<String>,
}

pub async fn start_batch_scan(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BatchScanRequest>,
) -> Result<Response, ApiError> {
    if request.images.is_empty() {
        return Err(ApiError::invalid("images must not be empty"));
    }
    if request.images.len() > BATCH_SCAN_MAX_IMAGES {
        return Err(ApiError::new(
            ErrorCode::BatchTooLarge,
            format!("at most {BATCH_SCAN_MAX_IMAGES} images per batch"),
        ));
    }

    let mut images = Vec::with_capacity(request.images.len());
    for image in request.images {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(image.data.as_bytes())
            .map_err(|_| {
                ApiError::invalid(format!("image {} is not valid base64", image.index))
            })?;
        let content_type = image.content_type.unwrap_or_else(|| "image/jpeg".into());
        validate_image(Some(&content_type), bytes.len(), SCAN_MAX_BYTES_BATCH)?;
        images.push(ScanImage {
            index: image.index,
            bytes,
            content_type,
        });
    }
    let total_photos = images.len();

    let (job, token) = state.registry.create(Pipeline::AiScan, request.job_id);
    let ctx = state.pipelines.clone();
    job.schedule_work(move |handle| run_batch_scan(ctx, handle, images));

    let mut accepted = JobAccepted::new(job.job_id(), &token);
    accepted.total_photos = Some(total_photos);
    Ok((StatusCode::ACCEPTED, Json(accepted)).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    job_id: JobId,
}

pub async fn cancel_scan(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CancelRequest>,
) -> Result<Response, ApiError> {
    cancel_job(&state, request.job_id)
}

pub async fn cancel_enrichment(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CancelRequest>,
) -> Result<Response, ApiError> {
    cancel_job(&state, request.job_id)
}

fn cancel_job(state: &AppState, job_id: JobId) -> Result<Response, ApiError> {
    let Some(handle) = state.registry.get(job_id) else {
        return Err(ApiError::not_found(format!("no active job {job_id}")));
    };
    handle.cancel("api request");
    info!(%job_id, "cancellation requested");
    Ok(Json(json!({ "jobId": job_id, "status": "canceling" })).into_response())
}

// ---------------------------------------------------------------------------
// CSV import
// ---------------------------------------------------------------------------

pub async fn start_csv_import(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut csv_text: Option<String> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::invalid(format!("unreadable multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::invalid(format!("unreadable file field: {e}")))?;
            if bytes.len() > CSV_MAX_BYTES {
                return Err(ApiError::new(
                    ErrorCode::FileTooLarge,
                    format!("CSV exceeds {CSV_MAX_BYTES} bytes"),
                ));
            }
            csv_text = Some(
                String::from_utf8(bytes.to_vec())
                    .map_err(|_| ApiError::invalid("CSV is not valid UTF-8"))?,
            );
        }
    }
    let csv_text =
        csv_text.ok_or_else(|| ApiError::new(ErrorCode::MissingParam, "file field is required"))?;

    let (job, token) = state.registry.create(Pipeline::CsvImport, None);
    let ctx = state.pipelines.clone();
    job.schedule_work(move |handle| run_csv_import(ctx, handle, csv_text));

    Ok((
        StatusCode::ACCEPTED,
        Json(JobAccepted::new(job.job_id(), &token)),
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Batch enrichment
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEnrichmentRequest {
    job_id: Option<JobId>,
    books: Vec<BatchBook>,
}

#[derive(Debug, Deserialize)]
pub struct BatchBook {
    title: Option<String>,
    author: Option<String>,
    isbn: Option<String>,
}

pub async fn start_batch_enrichment(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BatchEnrichmentRequest>,
) -> Result<Response, ApiError> {
    if request.books.is_empty() {
        return Err(ApiError::invalid("books must not be empty"));
    }
    if request.books.len() > BATCH_ENRICHMENT_MAX_BOOKS {
        return Err(ApiError::new(
            ErrorCode::BatchTooLarge,
            format!("at most {BATCH_ENRICHMENT_MAX_BOOKS} books per batch"),
        ));
    }

    let identifiers: Vec<BookIdentifier> = request
        .books
        .iter()
        .filter_map(|b| {
            BookIdentifier::from_row(b.title.as_deref(), b.author.as_deref(), b.isbn.as_deref())
        })
        .collect();
    if identifiers.is_empty() {
        return Err(ApiError::invalid(
            "no book has a usable title or valid ISBN",
        ));
    }

    let (job, token) = state
        .registry
        .create(Pipeline::BatchEnrichment, request.job_id);
    let ctx = state.pipelines.clone();
    job.schedule_work(move |handle| run_batch_enrichment(ctx, handle, identifiers));

    Ok((
        StatusCode::ACCEPTED,
        Json(JobAccepted::new(job.job_id(), &token)),
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Tokens & job state
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    job_id: JobId,
    old_token: Uuid,
}

pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RefreshRequest>,
) -> Result<Response, ApiError> {
    let Some(handle) = state.registry.get(request.job_id) else {
        return Err(ApiError::not_found(format!("no active job {}", request.job_id)));
    };
    match handle.refresh_token(request.old_token).await {
        Ok(token) => Ok(Json(json!({
            "jobId": request.job_id,
            "token": token.token,
            "expiresIn": token.expires_in_secs(chrono::Utc::now()),
        }))
        .into_response()),
        Err(RefreshError::TooEarly) => Err(ApiError::invalid(
            "refresh window opens 30 minutes before expiry",
        )),
        Err(RefreshError::Unauthorized) => Err(ApiError::auth("token rejected")),
    }
}

pub async fn job_state(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<JobId>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .ok_or_else(|| ApiError::auth("bearer token required"))?;

    let Some(handle) = state.registry.get(job_id) else {
        return Err(ApiError::not_found(format!("no active job {job_id}")));
    };
    if !handle.authorize(presented).await {
        return Err(ApiError::auth("token rejected"));
    }
    let Some(job_state) = state.registry.job_state(job_id).await else {
        return Err(ApiError::not_found(format!("no state for job {job_id}")));
    };
    Ok(Json(ResponseEnvelope::ok(job_state, ResponseMetadata::fresh(0))).into_response())
}

// ---------------------------------------------------------------------------
// Stored job results
// ---------------------------------------------------------------------------

pub async fn scan_results(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<JobId>,
) -> Result<Response, ApiError> {
    stored_result(&state, format!("scan-results:{job_id}")).await
}

pub async fn csv_results(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<JobId>,
) -> Result<Response, ApiError> {
    stored_result(&state, format!("csv-results:{job_id}")).await
}

async fn stored_result(state: &AppState, key: String) -> Result<Response, ApiError> {
    let lookup = state.search.cache().get(&key).await;
    let Some(record) = lookup.record else {
        return Err(ApiError::not_found(format!("no stored result at {key}")));
    };
    let metadata = ResponseMetadata::cached_from(lookup.source, 0);
    let mut response = Json(ResponseEnvelope::ok(record.data, metadata)).into_response();
    if let Ok(value) = lookup.source.to_string().parse() {
        response.headers_mut().insert("x-cache", value);
    }
    Ok(response)
}

// ---------------------------------------------------------------------------
// Operational surface
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    period: Option<String>,
    format: Option<String>,
}

pub async fn metrics(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MetricsQuery>,
) -> Result<Response, ApiError> {
    let period: Period = params
        .period
        .as_deref()
        .unwrap_or("1h")
        .parse()
        .map_err(ApiError::invalid)?;
    let summary = state.metrics.summary(period);

    let response = match params.format.as_deref().unwrap_or("json") {
        "json" => {
            let body = JsonExporter.export(&summary);
            ([(header::CONTENT_TYPE, JsonExporter.content_type())], body).into_response()
        }
        "prometheus" => {
            let body = PrometheusExporter.export(&summary);
            (
                [(header::CONTENT_TYPE, PrometheusExporter.content_type())],
                body,
            )
                .into_response()
        }
        other => {
            return Err(ApiError::invalid(format!("unknown format '{other}'")));
        }
    };
    Ok(response)
}

pub async fn dead_letters(State(state): State<Arc<AppState>>) -> Response {
    let depth = state.warming.dead_letter_depth().await;
    Json(json!({ "depth": depth })).into_response()
}

pub async fn trigger_harvest(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let Some(expected) = &state.config.harvest_secret else {
        return Err(ApiError::auth("harvest trigger is not configured"));
    };
    let presented = headers
        .get("x-harvest-secret")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if presented != expected.expose() {
        return Err(ApiError::auth("harvest secret rejected"));
    }

    let harvester = Arc::clone(&state.harvester);
    tokio::spawn(async move {
        harvester.run().await;
    });
    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "started" }))).into_response())
}

#[derive(Debug, Deserialize)]
pub struct ImageProxyQuery {
    url: Option<String>,
}

pub async fn image_proxy(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ImageProxyQuery>,
) -> Result<Response, ApiError> {
    let url = params
        .url
        .as_deref()
        .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
        .ok_or_else(|| ApiError::new(ErrorCode::MissingParam, "url is required"))?;

    if let Some((bytes, content_type)) = state.proxied_images.get(url).await {
        let mut response = bytes.into_response();
        set_image_headers(&mut response, &content_type, true);
        return Ok(response);
    }

    let upstream = state
        .http
        .get(url)
        .send()
        .await
        .map_err(|e| ApiError::new(ErrorCode::ProviderError, format!("cover fetch failed: {e}")))?;
    if !upstream.status().is_success() {
        return Err(ApiError::not_found("cover not available upstream"));
    }
    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("image/jpeg")
        .to_string();
    let bytes = upstream
        .bytes()
        .await
        .map_err(|e| ApiError::new(ErrorCode::ProviderError, format!("cover read failed: {e}")))?
        .to_vec();

    state
        .proxied_images
        .insert(url.to_string(), (bytes.clone(), content_type.clone()))
        .await;

    let mut response = bytes.into_response();
    set_image_headers(&mut response, &content_type, false);
    Ok(response)
}

fn set_image_headers(response: &mut Response, content_type: &str, cached: bool) {
    if let Ok(value) = content_type.parse() {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = "public, max-age=86400".parse() {
        response.headers_mut().insert(header::CACHE_CONTROL, value);
    }
    if let Ok(value) = if cached { "EDGE" } else { "MISS" }.parse() {
        response.headers_mut().insert("x-cache", value);
    }
}

pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let uptime = (chrono::Utc::now() - state.started_at).num_seconds();
    Json(json!({
        "status": "ok",
        "uptimeSeconds": uptime,
        "endpoints": [
            "GET /v1/search/title",
            "GET /v1/search/isbn",
            "GET /v1/search/advanced",
            "GET /v1/editions/search",
            "GET /v1/scan/results/{jobId}",
            "GET /v1/csv/results/{jobId}",
            "POST /v1/enrichment/batch",
            "POST /api/scan-bookshelf",
            "POST /api/scan-bookshelf/batch",
            "POST /api/scan-bookshelf/cancel",
            "POST /api/import/csv-gemini",
            "POST /api/enrichment/cancel",
            "POST /api/token/refresh",
            "GET /api/job-state/{jobId}",
            "GET /ws/progress",
            "GET /metrics",
            "GET /images/proxy",
            "GET /health",
        ],
    }))
    .into_response()
}
