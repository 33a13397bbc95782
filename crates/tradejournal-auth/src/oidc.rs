//! OpenID Connect authorization-code flow with PKCE (S256).
//!
//! Endpoints follow the Keycloak layout:
//! `{url}/realms/{realm}/protocol/openid-connect/{auth,token,logout}`.

use std::collections::HashMap;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::{OidcError, Result};

/// Identity provider connection settings.
#[derive(Debug, Clone)]
pub struct OidcConfig {
    pub url: String,
    pub realm: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub post_logout_redirect_uri: Option<String>,
    pub scope: String,
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self::trading()
    }
}

impl OidcConfig {
    /// Settings for the `trading` realm of the reference deployment.
    pub fn trading() -> Self {
        Self {
            url: "https://keycloak.uat.lan".to_string(),
            realm: "trading".to_string(),
            client_id: "trading-frontend".to_string(),
            redirect_uri: "http://127.0.0.1:8765/callback".to_string(),
            post_logout_redirect_uri: None,
            scope: "openid profile email".to_string(),
        }
    }

    /// Base URL of the realm.
    pub fn realm_url(&self) -> String {
        format!("{}/realms/{}", self.url.trim_end_matches('/'), self.realm)
    }

    pub fn authorize_endpoint(&self) -> String {
        format!("{}/protocol/openid-connect/auth", self.realm_url())
    }

    pub fn token_endpoint(&self) -> String {
        format!("{}/protocol/openid-connect/token", self.realm_url())
    }

    pub fn logout_endpoint(&self) -> String {
        format!("{}/protocol/openid-connect/logout", self.realm_url())
    }
}

/// PKCE code verifier and challenge pair.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub verifier: String,
    pub challenge: String,
}

impl PkceChallenge {
    /// Generate a new PKCE challenge pair.
    pub fn generate() -> Self {
        let mut verifier_bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut verifier_bytes);
        let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);
        let challenge = Self::challenge_for(&verifier);

        Self {
            verifier,
            challenge,
        }
    }

    /// S256 challenge for a verifier.
    pub fn challenge_for(verifier: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}

/// Generate a random state string for CSRF protection.
pub fn generate_state() -> String {
    let mut state_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut state_bytes);
    URL_SAFE_NO_PAD.encode(state_bytes)
}

fn encode_query(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the authorization URL for the OAuth flow.
///
/// Uses `response_mode=query` so the callback never lands in a URL fragment.
pub fn build_authorization_url(config: &OidcConfig, challenge: &str, state: &str) -> String {
    let params = [
        ("client_id", config.client_id.as_str()),
        ("redirect_uri", config.redirect_uri.as_str()),
        ("response_type", "code"),
        ("response_mode", "query"),
        ("scope", config.scope.as_str()),
        ("code_challenge", challenge),
        ("code_challenge_method", "S256"),
        ("state", state),
    ];

    format!("{}?{}", config.authorize_endpoint(), encode_query(&params))
}

/// Build the RP-initiated logout URL.
pub fn end_session_url(config: &OidcConfig, id_token_hint: Option<&str>) -> String {
    let mut params = vec![("client_id", config.client_id.as_str())];
    if let Some(uri) = config.post_logout_redirect_uri.as_deref() {
        params.push(("post_logout_redirect_uri", uri));
    }
    if let Some(hint) = id_token_hint {
        params.push(("id_token_hint", hint));
    }

    format!("{}?{}", config.logout_endpoint(), encode_query(&params))
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Tokens returned from the token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_expires_in: Option<u64>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub session_state: Option<String>,
}

/// Error body returned by an OAuth token endpoint.
#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Exchange an authorization code for tokens.
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &OidcConfig,
    code: &str,
    verifier: &str,
) -> Result<TokenSet> {
    let form = [
        ("grant_type", "authorization_code"),
        ("client_id", config.client_id.as_str()),
        ("code", code),
        ("redirect_uri", config.redirect_uri.as_str()),
        ("code_verifier", verifier),
    ];

    post_token_request(client, config, &form, "Token exchange").await
}

/// Exchange a refresh token for a new token set.
pub async fn refresh_token(
    client: &reqwest::Client,
    config: &OidcConfig,
    refresh_token: &str,
) -> Result<TokenSet> {
    let form = [
        ("grant_type", "refresh_token"),
        ("client_id", config.client_id.as_str()),
        ("refresh_token", refresh_token),
    ];

    post_token_request(client, config, &form, "Token refresh").await
}

async fn post_token_request(
    client: &reqwest::Client,
    config: &OidcConfig,
    form: &[(&str, &str)],
    operation: &str,
) -> Result<TokenSet> {
    let response = client
        .post(config.token_endpoint())
        .form(form)
        .send()
        .await
        .map_err(|e| OidcError::Network(format!("{} request failed: {}", operation, e)))?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let detail = match serde_json::from_str::<TokenErrorBody>(&error_text) {
            Ok(body) => match body.error_description {
                Some(description) => format!("{} ({})", body.error, description),
                None => body.error,
            },
            Err(_) => error_text,
        };
        return Err(OidcError::Backend(format!(
            "{} failed ({}): {}",
            operation, status, detail
        )));
    }

    response
        .json()
        .await
        .map_err(|e| OidcError::Serialization(format!("Failed to parse token response: {}", e)))
}

/// Query parameters delivered to the redirect URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationCallback {
    /// The provider issued an authorization code.
    Code { code: String, state: String },
    /// The provider refused (e.g. `access_denied`, `login_required`).
    Error {
        error: String,
        description: Option<String>,
        state: Option<String>,
    },
}

/// Parse the redirect the provider sent back.
///
/// Accepts a full redirect URL or a bare query string (with or without `?`).
pub fn parse_callback(input: &str) -> Result<AuthorizationCallback> {
    let trimmed = input.trim();
    let query = match Url::parse(trimmed) {
        Ok(url) => url.query().unwrap_or_default().to_string(),
        Err(_) => trimmed.trim_start_matches('?').to_string(),
    };

    let params: HashMap<String, String> = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();

    if let Some(error) = params.get("error") {
        return Ok(AuthorizationCallback::Error {
            error: error.clone(),
            description: params.get("error_description").cloned(),
            state: params.get("state").cloned(),
        });
    }

    match (params.get("code"), params.get("state")) {
        (Some(code), Some(state)) if !code.is_empty() && !state.is_empty() => {
            Ok(AuthorizationCallback::Code {
                code: code.clone(),
                state: state.clone(),
            })
        }
        _ => Err(OidcError::InvalidRequest(
            "Missing code or state".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> OidcConfig {
        OidcConfig {
            url: server.uri(),
            ..OidcConfig::trading()
        }
    }

    #[test]
    fn test_pkce_generation() {
        let pkce = PkceChallenge::generate();
        assert!(!pkce.verifier.is_empty());
        assert_eq!(pkce.challenge, PkceChallenge::challenge_for(&pkce.verifier));
        assert_ne!(pkce.verifier, pkce.challenge);
    }

    #[test]
    fn test_pkce_rfc7636_vector() {
        let challenge =
            PkceChallenge::challenge_for("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
        assert_eq!(challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn test_state_generation() {
        let state1 = generate_state();
        let state2 = generate_state();
        assert!(!state1.is_empty());
        assert_ne!(state1, state2);
    }

    #[test]
    fn test_endpoints_follow_realm_layout() {
        let config = OidcConfig {
            url: "https://id.example.com/".to_string(),
            ..OidcConfig::trading()
        };
        assert_eq!(
            config.token_endpoint(),
            "https://id.example.com/realms/trading/protocol/openid-connect/token"
        );
    }

    #[test]
    fn test_authorization_url() {
        let config = OidcConfig::trading();
        let url = build_authorization_url(&config, "test_challenge", "test_state");

        assert!(url.starts_with(
            "https://keycloak.uat.lan/realms/trading/protocol/openid-connect/auth?"
        ));
        assert!(url.contains("client_id=trading-frontend"));
        assert!(url.contains("response_mode=query"));
        assert!(url.contains("code_challenge=test_challenge"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("state=test_state"));
        assert!(url.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A8765%2Fcallback"));
    }

    #[test]
    fn test_end_session_url() {
        let config = OidcConfig {
            post_logout_redirect_uri: Some("http://127.0.0.1:8765/".to_string()),
            ..OidcConfig::trading()
        };
        let url = end_session_url(&config, Some("id.token.value"));
        assert!(url.contains("/protocol/openid-connect/logout?"));
        assert!(url.contains("id_token_hint=id.token.value"));
        assert!(url.contains("post_logout_redirect_uri="));

        let bare = end_session_url(&OidcConfig::trading(), None);
        assert!(!bare.contains("id_token_hint"));
    }

    #[test]
    fn test_parse_callback_full_url() {
        let callback =
            parse_callback("http://127.0.0.1:8765/callback?state=xyz&session_state=s&code=abc")
                .unwrap();
        assert_eq!(
            callback,
            AuthorizationCallback::Code {
                code: "abc".to_string(),
                state: "xyz".to_string()
            }
        );
    }

    #[test]
    fn test_parse_callback_bare_query() {
        let callback = parse_callback("  ?code=abc&state=xyz  ").unwrap();
        assert!(matches!(callback, AuthorizationCallback::Code { .. }));
    }

    #[test]
    fn test_parse_callback_provider_error() {
        let callback = parse_callback(
            "http://127.0.0.1:8765/callback?error=access_denied&error_description=User%20cancelled&state=xyz",
        )
        .unwrap();
        assert_eq!(
            callback,
            AuthorizationCallback::Error {
                error: "access_denied".to_string(),
                description: Some("User cancelled".to_string()),
                state: Some("xyz".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_callback_invalid() {
        assert!(parse_callback("http://127.0.0.1:8765/callback").is_err());
        assert!(parse_callback("code=abc").is_err());
        assert!(parse_callback("code=&state=xyz").is_err());
    }

    #[tokio::test]
    async fn test_exchange_code_posts_verifier() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/realms/trading/protocol/openid-connect/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code_verifier=the-verifier"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at",
                "refresh_token": "rt",
                "id_token": "it",
                "expires_in": 300,
                "refresh_expires_in": 1800,
                "token_type": "Bearer",
                "scope": "openid profile"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = exchange_code(
            &reqwest::Client::new(),
            &config_for(&server),
            "the-code",
            "the-verifier",
        )
        .await
        .unwrap();

        assert_eq!(tokens.access_token, "at");
        assert_eq!(tokens.refresh_token.as_deref(), Some("rt"));
        assert_eq!(tokens.expires_in, 300);
    }

    #[tokio::test]
    async fn test_refresh_token_surfaces_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/realms/trading/protocol/openid-connect/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Token is not active"
            })))
            .mount(&server)
            .await;

        let err = refresh_token(&reqwest::Client::new(), &config_for(&server), "stale")
            .await
            .unwrap_err();

        match err {
            OidcError::Backend(msg) => {
                assert!(msg.contains("invalid_grant"));
                assert!(msg.contains("Token is not active"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
