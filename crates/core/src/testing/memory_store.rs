//! In-process coordination store for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::coordination::{CoordinationError, CoordinationStore, LockToken, WindowCount};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    ttl: Duration,
    expires_at: Instant,
}

impl Entry {
    fn live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Mock implementation of the CoordinationStore trait.
///
/// Keys expire like they would in Redis. `set_unavailable(true)` makes every
/// call fail as if the store were down.
#[derive(Debug, Default)]
pub struct MemoryCoordinationStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    unavailable: Arc<RwLock<bool>>,
}

impl MemoryCoordinationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().await = unavailable;
    }

    /// Current value of `key`, ignoring availability.
    pub async fn value(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .await
            .get(key)
            .filter(|e| e.live())
            .map(|e| e.value.clone())
    }

    /// TTL `key` was last written with.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        self.entries
            .read()
            .await
            .get(key)
            .filter(|e| e.live())
            .map(|e| e.ttl)
    }

    async fn check(&self) -> Result<(), CoordinationError> {
        if *self.unavailable.read().await {
            return Err(CoordinationError::Unavailable(
                "memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl CoordinationStore for MemoryCoordinationStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn try_lock(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<Option<LockToken>, CoordinationError> {
        self.check().await?;
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| e.live()) {
            return Ok(None);
        }
        let token = LockToken::generate();
        entries.insert(
            key.to_string(),
            Entry {
                value: token.as_str().to_string(),
                ttl,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(Some(token))
    }

    async fn release(&self, key: &str, token: &LockToken) -> Result<bool, CoordinationError> {
        self.check().await?;
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(e) if e.live() && e.value == token.as_str() => {
                entries.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CoordinationError> {
        self.check().await?;
        Ok(self.value(key).await)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CoordinationError> {
        self.check().await?;
        self.entries.write().await.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                ttl,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CoordinationError> {
        self.check().await?;
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn incr(&self, key: &str, window: Duration) -> Result<WindowCount, CoordinationError> {
        self.check().await?;
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        if let Some(e) = entries.get_mut(key).filter(|e| e.live()) {
            let count = e.value.parse::<u64>().unwrap_or(0) + 1;
            e.value = count.to_string();
            return Ok(WindowCount {
                count,
                resets_in: e.expires_at.saturating_duration_since(now),
            });
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: "1".to_string(),
                ttl: window,
                expires_at: now + window,
            },
        );
        Ok(WindowCount {
            count: 1,
            resets_in: window,
        })
    }

    async fn ping(&self) -> Result<(), CoordinationError> {
        self.check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lock_is_exclusive_until_released() {
        let store = MemoryCoordinationStore::new();
        let token = store
            .try_lock("k", Duration::from_secs(60))
            .await
            .unwrap()
            .unwrap();
        assert!(store.try_lock("k", Duration::from_secs(60)).await.unwrap().is_none());

        assert!(!store.release("k", &LockToken::generate()).await.unwrap());
        assert!(store.release("k", &token).await.unwrap());
        assert!(store.try_lock("k", Duration::from_secs(60)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_counter_window_restarts() {
        let store = MemoryCoordinationStore::new();
        let window = Duration::from_millis(40);
        assert_eq!(store.incr("c", window).await.unwrap().count, 1);
        let second = store.incr("c", window).await.unwrap();
        assert_eq!(second.count, 2);
        assert!(second.resets_in <= window);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(store.incr("c", window).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let store = MemoryCoordinationStore::new();
        store.set("k", "v", Duration::from_millis(10)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(store.get("k").await.unwrap().is_none());
    }
}
