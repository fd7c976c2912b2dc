//! Per-caller playback rate limiting.
//!
//! Fixed windows counted in the coordination store, so every instance sees
//! the same budget for a caller.

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::coordination::{CoordinationError, CoordinationStore};
use crate::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    /// Requests allowed per window. Zero disables limiting.
    pub limit: u32,
    pub window: Duration,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            limit: 20,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

pub struct RateLimiter {
    store: Arc<dyn CoordinationStore>,
    settings: RateLimitSettings,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CoordinationStore>, settings: RateLimitSettings) -> Self {
        Self { store, settings }
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.limit > 0
    }

    pub fn settings(&self) -> RateLimitSettings {
        self.settings
    }

    /// Counts one request for `identity` and decides whether it may proceed.
    pub async fn check(&self, identity: &str) -> Result<RateDecision, CoordinationError> {
        if !self.is_enabled() {
            return Ok(RateDecision::Allowed {
                remaining: u32::MAX,
            });
        }

        let key = counter_key(identity);
        let window = match self.store.incr(&key, self.settings.window).await {
            Ok(window) => window,
            Err(e) => {
                metrics::RATE_LIMIT_DECISIONS
                    .with_label_values(&["error"])
                    .inc();
                return Err(e);
            }
        };

        let limit = u64::from(self.settings.limit);
        if window.count > limit {
            let retry_after = window.resets_in.max(Duration::from_secs(1));
            warn!(
                count = window.count,
                limit,
                retry_after_secs = retry_after.as_secs(),
                "Playback rate limit exceeded"
            );
            metrics::RATE_LIMIT_DECISIONS
                .with_label_values(&["limited"])
                .inc();
            return Ok(RateDecision::Limited { retry_after });
        }

        debug!(count = window.count, limit, "Playback request counted");
        metrics::RATE_LIMIT_DECISIONS
            .with_label_values(&["allowed"])
            .inc();
        Ok(RateDecision::Allowed {
            remaining: (limit - window.count) as u32,
        })
    }
}

/// Counter key. Identities may carry API keys, so only a digest is stored.
fn counter_key(identity: &str) -> String {
    let digest = Sha256::digest(identity.as_bytes());
    format!("cachelink:ratelimit:playback:{:x}", digest)
}
