// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared pipeline dependencies.

use crate::images::ImageStore;
use bgw_enrich::{BookIdentifier, SearchOutcome, SearchService};
use bgw_error::ErrorDto;
use bgw_vision::VisionModel;
use std::sync::Arc;

/// Everything a pipeline needs. Enrichment goes through the cache-first
/// [`SearchService`], so every book a job touches also lands in the same
/// cache keys the search endpoints read.
#[derive(Clone)]
pub struct PipelineContext {
    pub search: Arc<SearchService>,
    pub vision: Arc<dyn VisionModel>,
    pub images: Arc<dyn ImageStore>,
}

impl PipelineContext {
    pub fn new(
        search: Arc<SearchService>,
        vision: Arc<dyn VisionModel>,
        images: Arc<dyn ImageStore>,
    ) -> Self {
        Self {
            search,
            vision,
            images,
        }
    }

    /// Enrich one identifier through the cache-first search path.
    pub async fn enrich(&self, identifier: &BookIdentifier) -> Result<SearchOutcome, ErrorDto> {
        match identifier {
            BookIdentifier::Isbn { isbn } => self.search.search_isbn(isbn).await,
            BookIdentifier::TitleAuthor { title, author } => {
                self.search.search_advanced(Some(title), author.as_deref()).await
            }
        }
    }
}
