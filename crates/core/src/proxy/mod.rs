//! Relaying resolved media to clients.

mod range;
mod relay;

pub use range::ByteRange;
pub use relay::{OriginHead, ProxiedStream, ProxyBody, ProxySettings, StreamProxy};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Upstream request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Upstream returned status {0}")]
    UpstreamStatus(u16),

    #[error("Upstream stream aborted: {0}")]
    Stream(String),
}

/// How a ready link is handed to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyMode {
    /// Bytes flow through this service.
    Relay,
    /// The client is redirected to the link.
    Redirect,
}

/// Chooses a [`ProxyMode`] per request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyPolicy {
    /// Used when the user config does not say.
    pub proxied_by_default: bool,
    /// Services whose links are always redirected, even for proxied users.
    pub redirect_services: Vec<String>,
}

impl ProxyPolicy {
    pub fn mode(&self, user_proxied: Option<bool>, service: &str) -> ProxyMode {
        if !user_proxied.unwrap_or(self.proxied_by_default) {
            return ProxyMode::Redirect;
        }
        if self
            .redirect_services
            .iter()
            .any(|s| s.eq_ignore_ascii_case(service))
        {
            return ProxyMode::Redirect;
        }
        ProxyMode::Relay
    }
}
