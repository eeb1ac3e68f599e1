// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared application state.

use bgw_cache::TieredCache;
use bgw_config::GatewayConfig;
use bgw_enrich::{Enricher, SearchService};
use bgw_jobs::{JobRegistry, MemoryJobStore};
use bgw_pipelines::{ImageStore, MemoryImageStore, PipelineContext};
use bgw_providers::{BookProvider, GoogleBooksProvider, IsbndbProvider, OpenLibraryProvider};
use bgw_ratelimit::RateLimiter;
use bgw_telemetry::MetricsCollector;
use bgw_vision::{GeminiVision, VisionModel};
use bgw_warming::{AlertMonitor, AlertThresholds, Archiver, CoverHarvester, KeyJournal, RecentIsbnLog, WarmingConsumer, WarmingQueue};
use moka::future::Cache as MokaCache;
use std::sync::Arc;
use std::time::Duration;

/// Everything the handlers share. Immutable after startup; all mutation
/// happens inside actors, the cache tiers, or the collectors.
pub struct AppState {
    pub config: GatewayConfig,
    pub search: Arc<SearchService>,
    pub registry: Arc<JobRegistry>,
    pub limiter: Arc<RateLimiter>,
    pub metrics: MetricsCollector,
    pub pipelines: PipelineContext,
    pub warming: WarmingQueue,
    pub alerts: Arc<AlertMonitor>,
    pub harvester: Arc<CoverHarvester>,
    pub archiver: Arc<Archiver>,
    pub isbn_log: Arc<RecentIsbnLog>,
    pub key_journal: Arc<KeyJournal>,
    /// Proxied cover images, edge-cached by URL.
    pub proxied_images: MokaCache<String, (Vec<u8>, String)>,
    pub http: reqwest::Client,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

/// Wire the full state from configuration. The vision model and image
/// store are injectable so tests can swap in scripted fakes.
pub fn build_state(
    config: GatewayConfig,
    vision: Option<Arc<dyn VisionModel>>,
    images: Option<Arc<dyn ImageStore>>,
) -> Arc<AppState> {
    let cache = Arc::new(TieredCache::in_memory());

    let mut providers: Vec<Arc<dyn BookProvider>> = Vec::new();
    if config.google_books.enabled {
        providers.push(Arc::new(match &config.google_books.base_url {
            Some(base) => {
                GoogleBooksProvider::with_base_url(config.google_books.api_key.clone(), base)
            }
            None => GoogleBooksProvider::new(config.google_books.api_key.clone()),
        }));
    }
    if config.openlibrary.enabled {
        providers.push(Arc::new(match &config.openlibrary.base_url {
            Some(base) => OpenLibraryProvider::with_base_url(base),
            None => OpenLibraryProvider::new(),
        }));
    }
    if config.isbndb.enabled {
        if let Some(key) = config.isbndb.api_key.clone() {
            providers.push(Arc::new(match &config.isbndb.base_url {
                Some(base) => IsbndbProvider::with_base_url(key, base),
                None => IsbndbProvider::new(key),
            }));
        }
    }

    let enricher = Arc::new(Enricher::new(providers));
    let search = Arc::new(SearchService::new(Arc::clone(&cache), enricher));

    let vision: Arc<dyn VisionModel> =
        vision.unwrap_or_else(|| Arc::new(GeminiVision::new(config.vision.clone())));
    let images: Arc<dyn ImageStore> = images.unwrap_or_else(|| Arc::new(MemoryImageStore::new()));

    let pipelines = PipelineContext::new(Arc::clone(&search), vision, Arc::clone(&images));

    let metrics = MetricsCollector::new();
    let (warming, warming_rx) = WarmingQueue::new();
    tokio::spawn(
        WarmingConsumer::new(Arc::clone(&search), &warming).run(warming_rx),
    );

    let isbn_log = Arc::new(RecentIsbnLog::new());
    let key_journal = Arc::new(KeyJournal::new());

    Arc::new(AppState {
        search: Arc::clone(&search),
        registry: JobRegistry::new(Arc::new(MemoryJobStore::new())),
        limiter: RateLimiter::new(),
        metrics: metrics.clone(),
        pipelines,
        warming,
        alerts: Arc::new(AlertMonitor::new(
            metrics,
            Arc::clone(&cache),
            AlertThresholds::default(),
        )),
        harvester: Arc::new(CoverHarvester::new(
            Arc::clone(&search),
            Arc::clone(&images),
            Arc::clone(&isbn_log),
        )),
        archiver: Arc::new(Archiver::new(Arc::clone(&cache), Arc::clone(&key_journal))),
        isbn_log,
        key_journal,
        proxied_images: MokaCache::builder()
            .max_capacity(2_000)
            .time_to_live(Duration::from_secs(6 * 60 * 60))
            .build(),
        http: reqwest::Client::new(),
        started_at: chrono::Utc::now(),
        config,
    })
}
