use async_trait::async_trait;

use super::{AuthError, AuthRequest, Authenticator, Identity};

/// Open access: every caller is anonymous and playback keys fall back to
/// the client address.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoneAuthenticator;

#[async_trait]
impl Authenticator for NoneAuthenticator {
    async fn authenticate(&self, _request: &AuthRequest) -> Result<Identity, AuthError> {
        Ok(Identity::anonymous())
    }

    fn method_name(&self) -> &'static str {
        "none"
    }

    fn requires_credentials(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_url_key_is_ignored() {
        let request = AuthRequest::new("127.0.0.1".parse().unwrap())
            .with_url_key(Some("ignored".to_string()));

        let identity = NoneAuthenticator.authenticate(&request).await.unwrap();

        assert_eq!(identity, Identity::anonymous());
    }

    #[test]
    fn test_credentials_not_required() {
        assert!(!NoneAuthenticator.requires_credentials());
        assert_eq!(NoneAuthenticator.method_name(), "none");
    }
}
