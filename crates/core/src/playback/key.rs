//! Coordination keys for one (user, query) pair.

use sha2::{Digest, Sha256};

use super::{PlaybackQuery, QueryError};

const NAMESPACE: &str = "cachelink";

/// Identifies identical playback requests.
///
/// Keys are derived from a digest of user and query, so API keys never
/// appear in the coordination store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlaybackRequestKey {
    user: String,
    query: String,
    digest: String,
}

impl PlaybackRequestKey {
    pub fn new(user: impl Into<String>, normalized_query: impl Into<String>) -> Self {
        let user = user.into();
        let query = normalized_query.into();
        let mut hasher = Sha256::new();
        hasher.update(user.as_bytes());
        hasher.update([0u8]);
        hasher.update(query.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        Self {
            user,
            query,
            digest,
        }
    }

    pub fn for_query(user: impl Into<String>, query: &PlaybackQuery) -> Result<Self, QueryError> {
        Ok(Self::new(user, query.normalized()?))
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn lock_key(&self) -> String {
        format!("{}:lock:stream:{}", NAMESPACE, self.digest)
    }

    pub fn link_key(&self) -> String {
        format!("{}:stream_link:{}", NAMESPACE, self.digest)
    }

    pub fn provisional_key(&self) -> String {
        format!("{}:provisional_link:{}", NAMESPACE, self.digest)
    }

    pub fn download_flag_key(&self) -> String {
        format!("{}:download:{}", NAMESPACE, self.digest)
    }
}
