//! Mock indexer for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::indexer::{Indexer, IndexerError};
use crate::media::RequestedMedia;
use crate::release::RawRelease;

/// Mock implementation of the Indexer trait.
#[derive(Debug)]
pub struct MockIndexer {
    name: String,
    priority: u32,
    results: Arc<RwLock<Vec<RawRelease>>>,
    /// Media passed to `search`.
    searches: Arc<RwLock<Vec<RequestedMedia>>>,
    /// If set, the next search will fail with this error.
    next_error: Arc<RwLock<Option<IndexerError>>>,
    delay: Duration,
}

impl MockIndexer {
    pub fn new(name: impl Into<String>, priority: u32) -> Self {
        Self {
            name: name.into(),
            priority,
            results: Arc::new(RwLock::new(Vec::new())),
            searches: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            delay: Duration::ZERO,
        }
    }

    /// Sleep before answering each search.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub async fn set_results(&self, results: Vec<RawRelease>) {
        *self.results.write().await = results;
    }

    pub async fn set_next_error(&self, error: IndexerError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn searches(&self) -> Vec<RequestedMedia> {
        self.searches.read().await.clone()
    }
}

#[async_trait]
impl Indexer for MockIndexer {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn search(&self, media: &RequestedMedia) -> Result<Vec<RawRelease>, IndexerError> {
        self.searches.write().await.push(media.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(e) = self.next_error.write().await.take() {
            return Err(e);
        }
        Ok(self.results.read().await.clone())
    }
}
