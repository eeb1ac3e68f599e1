// SPDX-License-Identifier: MIT OR Apache-2.0
//! Blob storage for uploaded scan images and harvested covers.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

/// Blob write failure.
#[derive(Debug, Error)]
pub enum ImageStoreError {
    #[error("image store unavailable: {0}")]
    Unavailable(String),
}

/// Write-side contract of the image bucket. The gateway never serves these
/// bytes itself; the bucket fronts its own CDN.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ImageStoreError>;

    async fn exists(&self, path: &str) -> Result<bool, ImageStoreError>;
}

/// In-memory bucket for tests and single-node runs.
#[derive(Debug, Default)]
pub struct MemoryImageStore {
    objects: RwLock<HashMap<String, (Vec<u8>, String)>>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ImageStoreError> {
        self.objects
            .write()
            .await
            .insert(path.to_string(), (bytes, content_type.to_string()));
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, ImageStoreError> {
        Ok(self.objects.read().await.contains_key(path))
    }
}
