//! Identity provider back-channel.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::oidc::{self, OidcConfig, PkceChallenge, TokenSet};

/// Operations the session manager needs from the identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync + std::fmt::Debug {
    /// Authorization endpoint URL for a new flow.
    fn authorization_url(&self, pkce: &PkceChallenge, state: &str) -> String;

    /// Exchange an authorization code for tokens.
    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<TokenSet>;

    /// Exchange a refresh token for a new token set.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet>;

    /// RP-initiated logout URL.
    fn end_session_url(&self, id_token_hint: Option<&str>) -> String;
}

/// Shared identity provider for use across async contexts.
pub type SharedIdentityProvider = Arc<dyn IdentityProvider>;

/// reqwest-backed OIDC client.
#[derive(Debug, Clone)]
pub struct OidcClient {
    http: reqwest::Client,
    config: OidcConfig,
}

impl OidcClient {
    pub fn new(config: OidcConfig) -> Self {
        Self::with_http_client(config, reqwest::Client::new())
    }

    /// Create with a preconfigured HTTP client (timeouts, proxies, TLS roots).
    pub fn with_http_client(config: OidcConfig, http: reqwest::Client) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &OidcConfig {
        &self.config
    }
}

#[async_trait]
impl IdentityProvider for OidcClient {
    fn authorization_url(&self, pkce: &PkceChallenge, state: &str) -> String {
        oidc::build_authorization_url(&self.config, &pkce.challenge, state)
    }

    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<TokenSet> {
        oidc::exchange_code(&self.http, &self.config, code, verifier).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet> {
        oidc::refresh_token(&self.http, &self.config, refresh_token).await
    }

    fn end_session_url(&self, id_token_hint: Option<&str>) -> String {
        oidc::end_session_url(&self.config, id_token_hint)
    }
}
