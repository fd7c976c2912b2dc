//! Mock cached-content backend for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::availability::{AvailabilityReport, BackendKind};
use crate::backend::{
    BackendError, ContentIdentifier, DebridBackend, JobHandle, LinkTarget, Resolution,
};

/// Mock implementation of the DebridBackend trait.
///
/// Provides controllable behavior for testing:
/// - Canned availability reports and resolutions
/// - Recorded calls for assertions
/// - Simulated failures via `set_next_error`
///
/// # Example
///
/// ```rust,ignore
/// let backend = MockBackend::new(BackendKind::RealDebrid);
/// backend.set_availability(json!({"abc": {"rd": []}}).into()).await;
/// backend.set_resolution(Resolution::Ready("https://cdn/x".into())).await;
///
/// let report = backend.check_availability(&["abc".into()]).await?;
/// assert_eq!(backend.availability_checks().await.len(), 1);
/// ```
#[derive(Debug)]
pub struct MockBackend {
    kind: BackendKind,
    /// Report returned by `check_availability`.
    availability: Arc<RwLock<AvailabilityReport>>,
    /// Answer returned by `resolve_direct_link`.
    resolution: Arc<RwLock<Resolution>>,
    /// Whether `add_content` reports the content as already cached.
    cached_on_add: Arc<RwLock<bool>>,
    /// Hash lists passed to `check_availability`.
    checks: Arc<RwLock<Vec<Vec<String>>>>,
    /// Content passed to `add_content`.
    added: Arc<RwLock<Vec<ContentIdentifier>>>,
    /// Targets passed to `resolve_direct_link`.
    resolved: Arc<RwLock<Vec<LinkTarget>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<BackendError>>>,
}

impl MockBackend {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            availability: Arc::new(RwLock::new(AvailabilityReport::default())),
            resolution: Arc::new(RwLock::new(Resolution::NotReady)),
            cached_on_add: Arc::new(RwLock::new(false)),
            checks: Arc::new(RwLock::new(Vec::new())),
            added: Arc::new(RwLock::new(Vec::new())),
            resolved: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn set_availability(&self, report: AvailabilityReport) {
        *self.availability.write().await = report;
    }

    pub async fn set_resolution(&self, resolution: Resolution) {
        *self.resolution.write().await = resolution;
    }

    pub async fn set_cached_on_add(&self, cached: bool) {
        *self.cached_on_add.write().await = cached;
    }

    /// Make the next operation fail.
    pub async fn set_next_error(&self, error: BackendError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn availability_checks(&self) -> Vec<Vec<String>> {
        self.checks.read().await.clone()
    }

    pub async fn added_content(&self) -> Vec<ContentIdentifier> {
        self.added.read().await.clone()
    }

    pub async fn resolved_targets(&self) -> Vec<LinkTarget> {
        self.resolved.read().await.clone()
    }

    async fn check_error(&self) -> Result<(), BackendError> {
        match self.next_error.write().await.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DebridBackend for MockBackend {
    fn kind(&self) -> BackendKind {
        self.kind.clone()
    }

    async fn add_content(&self, content: &ContentIdentifier) -> Result<JobHandle, BackendError> {
        self.check_error().await?;
        let mut added = self.added.write().await;
        added.push(content.clone());
        Ok(JobHandle {
            id: format!("job-{}", added.len()),
            cached: *self.cached_on_add.read().await,
        })
    }

    async fn check_availability(
        &self,
        hashes: &[String],
    ) -> Result<AvailabilityReport, BackendError> {
        self.check_error().await?;
        self.checks.write().await.push(hashes.to_vec());
        Ok(self.availability.read().await.clone())
    }

    async fn resolve_direct_link(&self, target: &LinkTarget) -> Result<Resolution, BackendError> {
        self.check_error().await?;
        self.resolved.write().await.push(target.clone());
        Ok(self.resolution.read().await.clone())
    }
}
