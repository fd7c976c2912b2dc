//! Backend-backed link resolution.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{LinkResolver, PlaybackError, PlaybackQuery};
use crate::backend::{BackendRegistry, DebridBackend, LinkTarget, Resolution};
use crate::metrics;

/// Resolves playback queries through the configured backends.
///
/// `DL` queries first hand the content to the download backend and only ask
/// for a link when it reports the content as cached.
pub struct BackendResolver {
    registry: Arc<BackendRegistry>,
}

impl BackendResolver {
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        Self { registry }
    }

    fn backend_for(&self, query: &PlaybackQuery) -> Result<Arc<dyn DebridBackend>, PlaybackError> {
        self.registry
            .get(&query.service)
            .ok_or_else(|| PlaybackError::BackendNotConfigured(query.service.clone()))
    }

    async fn direct_link(
        &self,
        backend: &dyn DebridBackend,
        target: &LinkTarget,
    ) -> Result<Resolution, PlaybackError> {
        let label = backend.kind().code();
        debug!(backend = %label, hash = %target.info_hash, "Resolving direct link");
        let result = backend.resolve_direct_link(target).await;
        let outcome = match &result {
            Ok(Resolution::Ready(_)) => "ready",
            Ok(Resolution::Provisional(_)) => "provisional",
            Ok(Resolution::NotReady) => "not_ready",
            Err(_) => "error",
        };
        metrics::RESOLUTIONS.with_label_values(&[&label, outcome]).inc();
        result.map_err(PlaybackError::from)
    }
}

#[async_trait]
impl LinkResolver for BackendResolver {
    async fn resolve(&self, query: &PlaybackQuery) -> Result<Resolution, PlaybackError> {
        let backend = self.backend_for(query)?;
        let label = backend.kind().code();
        let target = query.target();

        if query.is_download() {
            let content = target.content().ok_or(PlaybackError::NoMatch)?;
            let job = backend.add_content(&content).await.map_err(|e| {
                metrics::RESOLUTIONS.with_label_values(&[&label, "error"]).inc();
                PlaybackError::from(e)
            })?;
            info!(backend = %label, job = %job.id, cached = job.cached, "Added content to download backend");
            if !job.cached {
                metrics::RESOLUTIONS.with_label_values(&[&label, "not_ready"]).inc();
                return Ok(Resolution::NotReady);
            }
        }

        self.direct_link(backend.as_ref(), &target).await
    }

    async fn refresh(&self, query: &PlaybackQuery) -> Result<Resolution, PlaybackError> {
        let backend = self.backend_for(query)?;
        self.direct_link(backend.as_ref(), &query.target()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::BackendKind;
    use crate::backend::{BackendError, ContentIdentifier};
    use crate::release::{MediaType, Privacy};
    use crate::testing::MockBackend;

    fn query(service: &str) -> PlaybackQuery {
        PlaybackQuery {
            info_hash: "abc".to_string(),
            magnet: Some("magnet:?xt=urn:btih:abc".to_string()),
            link: None,
            file_index: Some(1),
            season: None,
            episode: None,
            media_type: MediaType::Movie,
            service: service.to_string(),
            privacy: Privacy::Public,
        }
    }

    fn resolver_with(backend: Arc<MockBackend>) -> BackendResolver {
        let mut registry = BackendRegistry::new();
        registry.register(backend);
        BackendResolver::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn test_resolves_through_named_backend() {
        let backend = Arc::new(MockBackend::new(BackendKind::RealDebrid));
        backend
            .set_resolution(Resolution::Ready("https://cdn.example/f".into()))
            .await;
        let resolver = resolver_with(backend.clone());

        let resolution = resolver.resolve(&query("RD")).await.unwrap();
        assert_eq!(resolution, Resolution::Ready("https://cdn.example/f".into()));

        let targets = backend.resolved_targets().await;
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].file_index, Some(1));
        assert!(backend.added_content().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_service() {
        let resolver = resolver_with(Arc::new(MockBackend::new(BackendKind::RealDebrid)));
        let err = resolver.resolve(&query("AD")).await.unwrap_err();
        assert!(matches!(err, PlaybackError::BackendNotConfigured(s) if s == "AD"));
    }

    #[tokio::test]
    async fn test_download_not_cached_is_not_ready() {
        let backend = Arc::new(MockBackend::new(BackendKind::Torbox));
        let resolver = resolver_with(backend.clone());

        let resolution = resolver.resolve(&query("DL")).await.unwrap();
        assert_eq!(resolution, Resolution::NotReady);
        assert_eq!(
            backend.added_content().await,
            vec![ContentIdentifier::magnet("magnet:?xt=urn:btih:abc")]
        );
        assert!(backend.resolved_targets().await.is_empty());
    }

    #[tokio::test]
    async fn test_download_already_cached_resolves() {
        let backend = Arc::new(MockBackend::new(BackendKind::Torbox));
        backend.set_cached_on_add(true).await;
        backend
            .set_resolution(Resolution::Ready("https://cdn.example/g".into()))
            .await;
        let resolver = resolver_with(backend);

        assert_eq!(
            resolver.resolve(&query("DL")).await.unwrap(),
            Resolution::Ready("https://cdn.example/g".into())
        );
    }

    #[tokio::test]
    async fn test_refresh_never_adds_content() {
        let backend = Arc::new(MockBackend::new(BackendKind::Torbox));
        backend
            .set_resolution(Resolution::Provisional("https://cdn.example/p".into()))
            .await;
        let resolver = resolver_with(backend.clone());

        assert_eq!(
            resolver.refresh(&query("DL")).await.unwrap(),
            Resolution::Provisional("https://cdn.example/p".into())
        );
        assert!(backend.added_content().await.is_empty());
        assert_eq!(backend.resolved_targets().await.len(), 1);
    }

    #[tokio::test]
    async fn test_backend_error_maps() {
        let backend = Arc::new(MockBackend::new(BackendKind::RealDebrid));
        backend
            .set_next_error(BackendError::NotFound("abc".into()))
            .await;
        let resolver = resolver_with(backend);
        assert!(matches!(
            resolver.resolve(&query("RD")).await,
            Err(PlaybackError::NoMatch)
        ));
    }
}
