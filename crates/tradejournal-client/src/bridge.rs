//! Bearer attachment and refresh-then-retry-once on authorization failures.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use tradejournal_auth::{FORCE_REFRESH, SessionError, SessionManager};

use crate::error::{Error, Result};
use crate::transport::{ApiRequest, ApiResponse, SharedTransport};

/// Statuses that trigger the refresh path unless configured otherwise.
pub const DEFAULT_RETRY_STATUSES: &[u16] = &[401];

/// What the bridge needs from the session.
#[async_trait]
pub trait SessionAuthority: Send + Sync {
    /// Current access token, if any. Must not block.
    fn access_token(&self) -> Option<String>;

    /// Renew the access token; see [`SessionManager::refresh`].
    async fn refresh(&self, min_validity_secs: u64) -> std::result::Result<bool, SessionError>;

    /// Start a fresh sign-in.
    async fn login(&self);
}

#[async_trait]
impl SessionAuthority for SessionManager {
    fn access_token(&self) -> Option<String> {
        SessionManager::access_token(self)
    }

    async fn refresh(&self, min_validity_secs: u64) -> std::result::Result<bool, SessionError> {
        SessionManager::refresh(self, min_validity_secs).await
    }

    async fn login(&self) {
        SessionManager::login(self, None).await
    }
}

/// Shared session authority for use across async contexts.
pub type SharedAuthority = Arc<dyn SessionAuthority>;

/// Bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Response statuses treated as an expired or rejected token.
    pub retry_on_status: Vec<u16>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            retry_on_status: DEFAULT_RETRY_STATUSES.to_vec(),
        }
    }
}

/// Sends requests with the session's bearer token.
///
/// A response with a trigger status causes one forced refresh and one resend.
/// If the refresh fails or the resend is rejected too, the bridge asks the
/// session for a new sign-in and returns [`Error::RequestAuth`]. A refresh
/// cancelled by logout returns the same error without a new sign-in.
#[derive(Clone)]
pub struct RequestAuthBridge {
    transport: SharedTransport,
    authority: Option<SharedAuthority>,
    config: BridgeConfig,
}

impl RequestAuthBridge {
    pub fn new(
        transport: SharedTransport,
        authority: Option<SharedAuthority>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            transport,
            authority,
            config,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Send `request`, refreshing and retrying at most once.
    pub async fn execute(&self, mut request: ApiRequest) -> Result<ApiResponse> {
        let Some(authority) = &self.authority else {
            return self.transport.send(&request).await;
        };

        loop {
            attach_bearer(&mut request, authority.access_token())?;
            let response = self.transport.send(&request).await?;
            if !self.config.retry_on_status.contains(&response.status) {
                return Ok(response);
            }

            if request.retry_flag().is_set() {
                tracing::warn!(
                    status = response.status,
                    path = %request.path,
                    "Request rejected after token refresh, signing in again"
                );
                authority.login().await;
                return Err(request_auth(response));
            }

            request.mark_retry();
            match authority.refresh(FORCE_REFRESH).await {
                Ok(_) => {
                    tracing::debug!(path = %request.path, "Token refreshed, resending request");
                }
                Err(SessionError::Cancelled) => {
                    tracing::debug!(path = %request.path, "Session ended during token refresh");
                    return Err(request_auth(response));
                }
                Err(e) => {
                    tracing::warn!(error = %e, path = %request.path, "Token refresh failed, signing in again");
                    authority.login().await;
                    return Err(request_auth(response));
                }
            }
        }
    }
}

impl std::fmt::Debug for RequestAuthBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestAuthBridge")
            .field("authenticated", &self.authority.is_some())
            .field("config", &self.config)
            .finish()
    }
}

fn attach_bearer(request: &mut ApiRequest, token: Option<String>) -> Result<()> {
    request.headers.remove(AUTHORIZATION);
    if let Some(token) = token {
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| Error::Config("Access token is not a valid header value".to_string()))?;
        request.headers.insert(AUTHORIZATION, value);
    }
    Ok(())
}

fn request_auth(response: ApiResponse) -> Error {
    Error::RequestAuth {
        status: response.status,
        body: response.body,
    }
}
