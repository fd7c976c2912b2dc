//! At most one in-flight resolution per (user, query).
//!
//! The first request takes a short-lived lock and resolves; concurrent
//! identical requests poll the result cache until the link shows up. A
//! request never proceeds without the coordination store.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{PlaybackError, PlaybackQuery, PlaybackRequestKey};
use crate::backend::Resolution;
use crate::coordination::CoordinationStore;
use crate::metrics;

/// Value stored under the download flag key.
pub const DOWNLOAD_IN_PROGRESS: &str = "DOWNLOAD_IN_PROGRESS";

/// Turns a playback query into a [`Resolution`].
#[async_trait]
pub trait LinkResolver: Send + Sync {
    async fn resolve(&self, query: &PlaybackQuery) -> Result<Resolution, PlaybackError>;

    /// Ask again for a link to content whose download was already started.
    /// Never starts another download.
    async fn refresh(&self, query: &PlaybackQuery) -> Result<Resolution, PlaybackError>;
}

/// Lock and cache timings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoalescerSettings {
    pub lock_ttl: Duration,
    pub poll_interval: Duration,
    pub poll_attempts: u32,
    pub link_ttl: Duration,
    pub provisional_ttl: Duration,
    pub download_flag_ttl: Duration,
}

impl Default for CoalescerSettings {
    fn default() -> Self {
        Self {
            lock_ttl: Duration::from_secs(60),
            poll_interval: Duration::from_millis(1000),
            poll_attempts: 30,
            link_ttl: Duration::from_secs(3600),
            provisional_ttl: Duration::from_secs(30),
            download_flag_ttl: Duration::from_secs(600),
        }
    }
}

/// Result of a coalesced resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Final URL, cached for everyone asking the same thing.
    Ready(String),
    /// Short-lived URL while the content is still being cached.
    Provisional(String),
    /// Caching was started or is in progress; nothing to play yet.
    Pending,
}

impl PlaybackOutcome {
    fn label(&self) -> &'static str {
        match self {
            PlaybackOutcome::Ready(_) => "ready",
            PlaybackOutcome::Provisional(_) => "provisional",
            PlaybackOutcome::Pending => "pending",
        }
    }
}

/// What a HEAD request can learn without resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Ready,
    InProgress,
    Unknown,
}

pub struct PlaybackCoalescer {
    store: Arc<dyn CoordinationStore>,
    settings: CoalescerSettings,
}

impl PlaybackCoalescer {
    pub fn new(store: Arc<dyn CoordinationStore>, settings: CoalescerSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &CoalescerSettings {
        &self.settings
    }

    /// Resolve `query`, sharing the work with identical in-flight requests.
    pub async fn resolve(
        &self,
        key: &PlaybackRequestKey,
        query: &PlaybackQuery,
        resolver: &dyn LinkResolver,
    ) -> Result<PlaybackOutcome, PlaybackError> {
        let lock_key = key.lock_key();
        let token = match self.store.try_lock(&lock_key, self.settings.lock_ttl).await {
            Ok(token) => token,
            Err(e) => {
                metrics::LOCK_ATTEMPTS.with_label_values(&["error"]).inc();
                metrics::PLAYBACK_OUTCOMES
                    .with_label_values(&["coordination_unavailable"])
                    .inc();
                warn!(error = %e, "Coordination store unavailable, refusing to resolve");
                return Err(PlaybackError::CoordinationUnavailable(e));
            }
        };

        let result = match token {
            Some(token) => {
                metrics::LOCK_ATTEMPTS.with_label_values(&["acquired"]).inc();
                debug!(key = %key.digest(), "Lock acquired, resolving");
                let result = self.resolve_locked(key, query, resolver).await;
                match self.store.release(&lock_key, &token).await {
                    Ok(true) => debug!(key = %key.digest(), "Lock released"),
                    Ok(false) => warn!(key = %key.digest(), "Lock expired before release"),
                    Err(e) => warn!(key = %key.digest(), error = %e, "Failed to release lock"),
                }
                result
            }
            None => {
                metrics::LOCK_ATTEMPTS.with_label_values(&["contended"]).inc();
                debug!(key = %key.digest(), "Lock held elsewhere, waiting for link");
                self.wait_for_link(key).await
            }
        };

        let label = match &result {
            Ok(outcome) => outcome.label(),
            Err(PlaybackError::Timeout) => "timeout",
            Err(PlaybackError::CoordinationUnavailable(_)) => "coordination_unavailable",
            Err(_) => "failed",
        };
        metrics::PLAYBACK_OUTCOMES.with_label_values(&[label]).inc();
        result
    }

    async fn resolve_locked(
        &self,
        key: &PlaybackRequestKey,
        query: &PlaybackQuery,
        resolver: &dyn LinkResolver,
    ) -> Result<PlaybackOutcome, PlaybackError> {
        if let Some(url) = self.store.get(&key.link_key()).await? {
            debug!(key = %key.digest(), "Link cache hit");
            return Ok(PlaybackOutcome::Ready(url));
        }
        if self.store.get(&key.download_flag_key()).await?.is_some() {
            info!(key = %key.digest(), "Download already in progress");
            return self.refresh_download(key, query, resolver).await;
        }

        match resolver.resolve(query).await? {
            Resolution::Ready(url) => {
                self.store
                    .set(&key.link_key(), &url, self.settings.link_ttl)
                    .await?;
                info!(key = %key.digest(), service = %query.service, "Resolved and cached link");
                Ok(PlaybackOutcome::Ready(url))
            }
            Resolution::NotReady => {
                self.mark_download(key).await?;
                info!(key = %key.digest(), service = %query.service, "Content not cached yet, download started");
                Ok(PlaybackOutcome::Pending)
            }
            Resolution::Provisional(url) => {
                self.store
                    .set(&key.provisional_key(), &url, self.settings.provisional_ttl)
                    .await?;
                self.mark_download(key).await?;
                info!(key = %key.digest(), service = %query.service, "Serving provisional link");
                Ok(PlaybackOutcome::Provisional(url))
            }
        }
    }

    /// Provisional link for a download in progress, fetched again once the
    /// cached one has expired.
    async fn refresh_download(
        &self,
        key: &PlaybackRequestKey,
        query: &PlaybackQuery,
        resolver: &dyn LinkResolver,
    ) -> Result<PlaybackOutcome, PlaybackError> {
        if let Some(url) = self.store.get(&key.provisional_key()).await? {
            debug!(key = %key.digest(), "Reusing provisional link");
            return Ok(PlaybackOutcome::Provisional(url));
        }

        match resolver.refresh(query).await {
            Ok(Resolution::Ready(url)) => {
                self.store
                    .set(&key.link_key(), &url, self.settings.link_ttl)
                    .await?;
                self.store.delete(&key.download_flag_key()).await?;
                info!(key = %key.digest(), service = %query.service, "Download finished, cached link");
                Ok(PlaybackOutcome::Ready(url))
            }
            Ok(Resolution::Provisional(url)) => {
                self.store
                    .set(&key.provisional_key(), &url, self.settings.provisional_ttl)
                    .await?;
                info!(key = %key.digest(), service = %query.service, "Refreshed provisional link");
                Ok(PlaybackOutcome::Provisional(url))
            }
            Ok(Resolution::NotReady) => {
                debug!(key = %key.digest(), "Download still running, no link yet");
                Ok(PlaybackOutcome::Pending)
            }
            Err(e) => {
                warn!(key = %key.digest(), error = %e, "Link refresh failed, reporting pending");
                Ok(PlaybackOutcome::Pending)
            }
        }
    }

    async fn mark_download(&self, key: &PlaybackRequestKey) -> Result<(), PlaybackError> {
        self.store
            .set(
                &key.download_flag_key(),
                DOWNLOAD_IN_PROGRESS,
                self.settings.download_flag_ttl,
            )
            .await?;
        Ok(())
    }

    /// `Some` when a download is in progress: the provisional link if one is
    /// cached, otherwise pending.
    async fn download_state(
        &self,
        key: &PlaybackRequestKey,
    ) -> Result<Option<PlaybackOutcome>, PlaybackError> {
        if self.store.get(&key.download_flag_key()).await?.is_none() {
            return Ok(None);
        }
        Ok(Some(match self.store.get(&key.provisional_key()).await? {
            Some(url) => PlaybackOutcome::Provisional(url),
            None => PlaybackOutcome::Pending,
        }))
    }

    async fn wait_for_link(&self, key: &PlaybackRequestKey) -> Result<PlaybackOutcome, PlaybackError> {
        let started = Instant::now();
        for attempt in 1..=self.settings.poll_attempts {
            tokio::time::sleep(self.settings.poll_interval).await;

            if let Some(url) = self.store.get(&key.link_key()).await? {
                debug!(key = %key.digest(), attempt, "Link appeared while waiting");
                metrics::POLL_WAIT_SECONDS.observe(started.elapsed().as_secs_f64());
                return Ok(PlaybackOutcome::Ready(url));
            }
            if let Some(outcome) = self.download_state(key).await? {
                debug!(key = %key.digest(), attempt, "Download in progress while waiting");
                metrics::POLL_WAIT_SECONDS.observe(started.elapsed().as_secs_f64());
                return Ok(outcome);
            }
        }

        metrics::POLL_WAIT_SECONDS.observe(started.elapsed().as_secs_f64());
        warn!(
            key = %key.digest(),
            attempts = self.settings.poll_attempts,
            "Timed out waiting for cached link"
        );
        Err(PlaybackError::Timeout)
    }

    /// Cached link for `key`, if any. Used by HEAD to ask the origin for its length.
    pub async fn cached_link(&self, key: &PlaybackRequestKey) -> Result<Option<String>, PlaybackError> {
        Ok(self.store.get(&key.link_key()).await?)
    }

    /// Status without resolving.
    pub async fn status(&self, key: &PlaybackRequestKey) -> Result<PlaybackStatus, PlaybackError> {
        if self.store.get(&key.link_key()).await?.is_some() {
            return Ok(PlaybackStatus::Ready);
        }
        if self.store.get(&key.download_flag_key()).await?.is_some()
            || self.store.get(&key.lock_key()).await?.is_some()
        {
            return Ok(PlaybackStatus::InProgress);
        }
        Ok(PlaybackStatus::Unknown)
    }
}
