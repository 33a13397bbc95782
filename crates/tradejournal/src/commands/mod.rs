//! CLI command handlers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tradejournal_auth::{
    LoopbackUserAgent, OidcClient, OidcConfig, PastedUserAgent, RefreshPolicy, SessionManager,
    SharedUserAgent,
};
use tradejournal_client::TradeJournalClient;
use tradejournal_config::TradeJournalConfig;

pub mod api;
pub mod auth;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Merged configuration.
    pub config: TradeJournalConfig,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// Read the redirect URL from stdin.
    pub paste: bool,
    /// Launch the system browser for the loopback flow.
    pub open_browser: bool,
}

impl Context {
    /// Build a session manager from the identity and session sections.
    pub fn session(&self) -> Result<SessionManager> {
        let identity = self.config.identity();
        let session = self.config.session();

        let user_agent: SharedUserAgent = if self.paste {
            Arc::new(PastedUserAgent)
        } else {
            let agent = LoopbackUserAgent::from_redirect_uri(&identity.redirect_uri)?;
            if self.open_browser {
                Arc::new(agent)
            } else {
                Arc::new(agent.without_browser())
            }
        };

        let oidc = OidcConfig {
            url: identity.url,
            realm: identity.realm,
            client_id: identity.client_id,
            redirect_uri: identity.redirect_uri,
            post_logout_redirect_uri: identity.post_logout_redirect_uri,
            scope: identity.scope,
        };

        let manager = SessionManager::builder()
            .provider(Arc::new(OidcClient::new(oidc)))
            .user_agent(user_agent)
            .refresh_policy(RefreshPolicy {
                interval: Duration::from_secs(session.refresh_interval_secs),
                min_validity_secs: session.min_validity_secs,
            })
            .build()?;
        Ok(manager)
    }

    /// Sign in and fail unless the session ends up authenticated.
    pub async fn signed_in(&self) -> Result<SessionManager> {
        let manager = self.session()?;
        let state = manager.initialize().await;
        if !state.is_authenticated() {
            let reason = state
                .last_error
                .map(|e| e.message)
                .unwrap_or_else(|| "sign-in did not complete".to_string());
            manager.shutdown();
            anyhow::bail!("Not signed in: {}", reason);
        }
        Ok(manager)
    }

    /// Build a backend client bound to `session`.
    pub fn client(&self, session: &SessionManager) -> Result<TradeJournalClient> {
        let api = self.config.api();
        let client = TradeJournalClient::builder()
            .base_url(api.base_url)
            .timeout(Duration::from_secs(api.timeout_secs))
            .retry_on_status(api.retry_on_status)
            .session(Arc::new(session.clone()))
            .build()?;
        Ok(client)
    }
}
