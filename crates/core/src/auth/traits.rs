use async_trait::async_trait;
use thiserror::Error;

use super::types::{AuthRequest, Identity};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("API key required")]
    NotAuthenticated,

    #[error("Invalid API key: {0}")]
    InvalidCredentials(String),

    #[error("Auth misconfigured: {0}")]
    ConfigurationError(String),
}

/// Checks API callers and playback URL owners.
///
/// Playback requests carry their key inside the URL's user config, so
/// implementations look at `AuthRequest::url_key` as well as headers.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError>;

    /// Reported in logs and the sanitized config.
    fn method_name(&self) -> &'static str;

    /// False when every caller is let through and keys are never checked.
    fn requires_credentials(&self) -> bool {
        true
    }
}
