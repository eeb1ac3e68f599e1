// SPDX-License-Identifier: MIT OR Apache-2.0
//! The HTTP and WebSocket surface.
//!
//! Request handlers stay thin: validation, then a call into the search
//! service, the job registry, or the cache. All mutable state lives behind
//! actors or the tier API; the handlers themselves share nothing mutable.

#![deny(unsafe_code)]

mod error;
mod handlers;
mod middleware;
mod state;
mod ws;

pub use error::ApiError;
pub use state::{build_state, AppState};

use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Request-body ceiling: five 10 MB batch images arrive base64-encoded in
/// one JSON document, plus framing. Per-upload limits are enforced again,
/// precisely, in the handlers.
const MAX_BODY_BYTES: usize = 80 * 1024 * 1024;

/// Build the full router.
pub fn build_app(state: Arc<AppState>) -> Router {
    let rate_limited = Router::new()
        .route("/v1/search/title", get(handlers::search_title))
        .route("/v1/search/isbn", get(handlers::search_isbn))
        .route("/v1/search/advanced", get(handlers::search_advanced))
        .route("/v1/editions/search", get(handlers::search_editions))
        .route("/v1/scan/results/{job_id}", get(handlers::scan_results))
        .route("/v1/csv/results/{job_id}", get(handlers::csv_results))
        .route("/v1/enrichment/batch", post(handlers::start_batch_enrichment))
        .route("/api/scan-bookshelf", post(handlers::start_scan))
        .route("/api/scan-bookshelf/batch", post(handlers::start_batch_scan))
        .route("/api/scan-bookshelf/cancel", post(handlers::cancel_scan))
        .route("/api/import/csv-gemini", post(handlers::start_csv_import))
        .route("/api/enrichment/cancel", post(handlers::cancel_enrichment))
        .route("/api/token/refresh", post(handlers::refresh_token))
        .route("/api/job-state/{job_id}", get(handlers::job_state))
        .route("/images/proxy", get(handlers::image_proxy))
        .layer(from_fn_with_state(Arc::clone(&state), middleware::rate_limit));

    Router::new()
        .merge(rate_limited)
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/api/monitoring/dead-letters", get(handlers::dead_letters))
        .route("/api/harvest/trigger", post(handlers::trigger_harvest))
        .route("/ws/progress", get(ws::progress_upgrade))
        .layer(from_fn_with_state(Arc::clone(&state), middleware::record_metrics))
        .layer(from_fn(middleware::client_ip))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
