//! Configuration types.

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Overrides `[identity] url`.
pub const KEYCLOAK_URL_ENV: &str = "TRADEJOURNAL_KEYCLOAK_URL";

/// Overrides `[api] base_url`.
pub const API_URL_ENV: &str = "TRADEJOURNAL_API_URL";

/// Root configuration.
///
/// Each section replaces the same section from a lower layer wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeJournalConfig {
    /// Identity provider connection.
    pub identity: Option<IdentityConfig>,

    /// Token refresh cadence.
    pub session: Option<SessionConfig>,

    /// Backend API.
    pub api: Option<ApiConfig>,
}

impl TradeJournalConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: TradeJournalConfig) {
        if other.identity.is_some() {
            self.identity = other.identity;
        }

        if other.session.is_some() {
            self.session = other.session;
        }

        if other.api.is_some() {
            self.api = other.api;
        }
    }

    /// Apply `TRADEJOURNAL_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub(crate) fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(KEYCLOAK_URL_ENV).filter(|v| !v.is_empty()) {
            self.identity.get_or_insert_with(IdentityConfig::default).url = url;
        }
        if let Some(url) = lookup(API_URL_ENV).filter(|v| !v.is_empty()) {
            self.api.get_or_insert_with(ApiConfig::default).base_url = url;
        }
    }

    /// Effective identity settings.
    pub fn identity(&self) -> IdentityConfig {
        self.identity.clone().unwrap_or_default()
    }

    /// Effective session settings.
    pub fn session(&self) -> SessionConfig {
        self.session.clone().unwrap_or_default()
    }

    /// Effective API settings.
    pub fn api(&self) -> ApiConfig {
        self.api.clone().unwrap_or_default()
    }

    /// Check values that cannot be caught by parsing.
    pub fn validate(&self) -> Result<()> {
        self.identity().validate()?;
        self.session().validate()?;
        self.api().validate()
    }

    /// Remove sections that fail validation so their defaults apply.
    ///
    /// Returns one error per dropped section.
    pub fn drop_invalid_sections(&mut self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if let Some(Err(e)) = self.identity.as_ref().map(IdentityConfig::validate) {
            errors.push(e);
            self.identity = None;
        }
        if let Some(Err(e)) = self.session.as_ref().map(SessionConfig::validate) {
            errors.push(e);
            self.session = None;
        }
        if let Some(Err(e)) = self.api.as_ref().map(ApiConfig::validate) {
            errors.push(e);
            self.api = None;
        }
        errors
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Identity Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Identity provider section.
///
/// ```toml
/// [identity]
/// url = "https://keycloak.uat.lan"
/// realm = "trading"
/// client_id = "trading-frontend"
/// redirect_uri = "http://127.0.0.1:8765/callback"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Provider base URL.
    pub url: String,
    pub realm: String,
    pub client_id: String,
    /// Where the provider sends the browser after sign-in.
    pub redirect_uri: String,
    /// Where the provider sends the browser after sign-out.
    pub post_logout_redirect_uri: Option<String>,
    pub scope: String,
}

impl IdentityConfig {
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("identity.url", &self.url),
            ("identity.realm", &self.realm),
            ("identity.client_id", &self.client_id),
            ("identity.redirect_uri", &self.redirect_uri),
        ] {
            if value.trim().is_empty() {
                return Err(invalid(field, "must not be empty"));
            }
        }
        Ok(())
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            url: "https://keycloak.uat.lan".to_string(),
            realm: "trading".to_string(),
            client_id: "trading-frontend".to_string(),
            redirect_uri: "http://127.0.0.1:8765/callback".to_string(),
            post_logout_redirect_uri: None,
            scope: "openid profile email".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Token refresh section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds between periodic refresh checks.
    pub refresh_interval_secs: u64,
    /// Refresh when fewer than this many seconds of validity remain.
    pub min_validity_secs: u64,
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval_secs == 0 {
            return Err(invalid(
                "session.refresh_interval_secs",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 60,
            min_validity_secs: 70,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// API Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Backend API section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Response statuses that trigger a token refresh and one resend.
    pub retry_on_status: Vec<u16>,
}

impl ApiConfig {
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(invalid("api.base_url", "must not be empty"));
        }
        if self.timeout_secs == 0 {
            return Err(invalid("api.timeout_secs", "must be greater than zero"));
        }
        if let Some(status) = self
            .retry_on_status
            .iter()
            .find(|s| !(400..500).contains(*s))
        {
            return Err(invalid(
                "api.retry_on_status",
                &format!("{} is not a client error status", status),
            ));
        }
        Ok(())
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            timeout_secs: 30,
            retry_on_status: vec![401],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = TradeJournalConfig::from_toml("").unwrap();
        assert_eq!(config, TradeJournalConfig::new());
        assert_eq!(config.identity().realm, "trading");
        assert_eq!(config.session().refresh_interval_secs, 60);
        assert_eq!(config.session().min_validity_secs, 70);
        assert_eq!(config.api().retry_on_status, vec![401]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let config = TradeJournalConfig::from_toml(
            r#"
[identity]
url = "https://sso.example.com"
realm = "desk"
client_id = "journal-cli"
redirect_uri = "http://localhost:9000/cb"
post_logout_redirect_uri = "http://localhost:9000/"

[session]
refresh_interval_secs = 30
min_validity_secs = 45

[api]
base_url = "https://journal.example.com/api"
timeout_secs = 10
retry_on_status = [401, 419]
"#,
        )
        .unwrap();

        let identity = config.identity();
        assert_eq!(identity.url, "https://sso.example.com");
        assert_eq!(identity.client_id, "journal-cli");
        assert_eq!(
            identity.post_logout_redirect_uri.as_deref(),
            Some("http://localhost:9000/")
        );
        assert_eq!(identity.scope, "openid profile email");
        assert_eq!(config.session().min_validity_secs, 45);
        assert_eq!(config.api().retry_on_status, vec![401, 419]);
    }

    #[test]
    fn test_merge_replaces_present_sections() {
        let mut base = TradeJournalConfig::from_toml(
            r#"
[identity]
realm = "base"

[api]
timeout_secs = 5
"#,
        )
        .unwrap();
        let overlay = TradeJournalConfig::from_toml(
            r#"
[identity]
realm = "overlay"
"#,
        )
        .unwrap();

        base.merge(overlay);
        assert_eq!(base.identity().realm, "overlay");
        assert_eq!(base.api().timeout_secs, 5);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (KEYCLOAK_URL_ENV, "https://sso.test"),
            (API_URL_ENV, "http://api.test/api"),
        ]
        .into_iter()
        .collect();

        let mut config = TradeJournalConfig::from_toml(
            r#"
[identity]
realm = "desk"
"#,
        )
        .unwrap();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.identity().url, "https://sso.test");
        assert_eq!(config.identity().realm, "desk");
        assert_eq!(config.api().base_url, "http://api.test/api");
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = TradeJournalConfig::new();
        config.apply_overrides(|_| Some(String::new()));
        assert_eq!(config, TradeJournalConfig::new());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_interval = TradeJournalConfig::from_toml(
            r#"
[session]
refresh_interval_secs = 0
"#,
        )
        .unwrap();
        assert!(matches!(
            zero_interval.validate(),
            Err(ConfigError::Invalid { ref field, .. }) if field == "session.refresh_interval_secs"
        ));

        let bad_status = TradeJournalConfig::from_toml(
            r#"
[api]
retry_on_status = [200]
"#,
        )
        .unwrap();
        assert!(bad_status.validate().is_err());

        let empty_client = TradeJournalConfig::from_toml(
            r#"
[identity]
client_id = ""
"#,
        )
        .unwrap();
        assert!(empty_client.validate().is_err());
    }

    #[test]
    fn test_unknown_types_fail_to_parse() {
        let err = TradeJournalConfig::from_toml(
            r#"
[session]
refresh_interval_secs = "soon"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
