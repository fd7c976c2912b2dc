//! Shared key-value coordination between server instances.
//!
//! The surface is narrow: a non-blocking lock with a lifetime, string values
//! with a TTL, and fixed-window counters for rate limiting.

mod redis_store;

pub use redis_store::{redact_url, RedisStore};

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from the coordination store.
#[derive(Debug, Error)]
pub enum CoordinationError {
    #[error("Coordination store unavailable: {0}")]
    Unavailable(String),

    #[error("Coordination command failed: {0}")]
    Command(String),
}

/// Proof of lock ownership. Only the holder's token can release the lock.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockToken(String);

impl LockToken {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// State of a fixed-window counter after an increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// Hits in the current window, this one included.
    pub count: u64,
    /// Time until the window closes and the count starts over.
    pub resets_in: Duration,
}

/// Trait for coordination stores.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Store name for logging.
    fn name(&self) -> &str;

    /// Try to take `key` without waiting. `None` when someone else holds it.
    async fn try_lock(&self, key: &str, ttl: Duration)
        -> Result<Option<LockToken>, CoordinationError>;

    /// Release `key` if `token` still owns it. Returns whether it was released.
    async fn release(&self, key: &str, token: &LockToken) -> Result<bool, CoordinationError>;

    async fn get(&self, key: &str) -> Result<Option<String>, CoordinationError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CoordinationError>;

    async fn delete(&self, key: &str) -> Result<(), CoordinationError>;

    /// Increment the counter at `key`. The first hit opens a window of
    /// length `window`; the counter disappears when it closes.
    async fn incr(&self, key: &str, window: Duration) -> Result<WindowCount, CoordinationError>;

    /// Round-trip check for health reporting.
    async fn ping(&self) -> Result<(), CoordinationError>;
}
