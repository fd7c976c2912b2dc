use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::net::IpAddr;

/// Request information for authentication
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// Lowercased header names.
    pub headers: HashMap<String, String>,
    pub source_ip: IpAddr,
    /// Key carried inside a playback URL's user config.
    pub url_key: Option<String>,
}

impl AuthRequest {
    pub fn new(source_ip: IpAddr) -> Self {
        Self {
            headers: HashMap::new(),
            source_ip,
            url_key: None,
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_url_key(mut self, key: Option<String>) -> Self {
        self.url_key = key;
        self
    }
}

/// Authenticated identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub method: String,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            user_id: "anonymous".to_string(),
            method: "none".to_string(),
        }
    }

    /// Identity for a caller holding `key`. The key itself is never exposed.
    pub fn for_api_key(key: &str) -> Self {
        Self {
            user_id: format!("key-{}", key_fingerprint(key)),
            method: "api_key".to_string(),
        }
    }
}

/// First 12 hex chars of the key's SHA-256.
pub fn key_fingerprint(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..12].to_string()
}
