//! Bridge + session manager against a fake Keycloak and a fake backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use tradejournal_auth::{
    AuthorizationCallback, OidcClient, OidcConfig, PendingCallback, SessionManager,
    SessionStatus, UserAgent,
};
use tradejournal_client::{Error, TradeJournalClient};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_PATH: &str = "/realms/trading/protocol/openid-connect/token";

fn jwt(sub: &str, username: &str, nonce: &str) -> String {
    let payload = serde_json::json!({
        "sub": sub,
        "preferred_username": username,
        "jti": nonce,
    });
    format!(
        "eyJhbGciOiJSUzI1NiJ9.{}.c2ln",
        URL_SAFE_NO_PAD.encode(payload.to_string())
    )
}

fn token_response(access_token: &str, refresh_token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "access_token": access_token,
        "refresh_token": refresh_token,
        "id_token": "id.token.value",
        "expires_in": 300,
        "token_type": "Bearer",
    }))
}

/// Approves every authorization immediately.
#[derive(Debug, Default)]
struct ApprovingAgent {
    authorizations: AtomicUsize,
}

#[async_trait]
impl UserAgent for ApprovingAgent {
    async fn open_authorization(&self, url: &str) -> tradejournal_auth::Result<PendingCallback> {
        self.authorizations.fetch_add(1, Ordering::SeqCst);
        let state = url
            .split(['?', '&'])
            .find_map(|pair| pair.strip_prefix("state="))
            .unwrap()
            .to_string();
        Ok(PendingCallback::ready(AuthorizationCallback::Code {
            code: "auth-code".to_string(),
            state,
        }))
    }

    async fn open(&self, _url: &str) -> tradejournal_auth::Result<()> {
        Ok(())
    }
}

struct Harness {
    idp: MockServer,
    backend: MockServer,
    session: SessionManager,
    agent: Arc<ApprovingAgent>,
    client: TradeJournalClient,
}

async fn harness() -> Harness {
    let idp = MockServer::start().await;
    let backend = MockServer::start().await;

    let config = OidcConfig {
        url: idp.uri(),
        ..OidcConfig::trading()
    };
    let agent = Arc::new(ApprovingAgent::default());
    let session = SessionManager::builder()
        .provider(Arc::new(OidcClient::new(config)))
        .user_agent(agent.clone())
        .build()
        .unwrap();
    let client = TradeJournalClient::builder()
        .base_url(format!("{}/api", backend.uri()))
        .session(Arc::new(session.clone()))
        .build()
        .unwrap();

    Harness {
        idp,
        backend,
        session,
        agent,
        client,
    }
}

#[tokio::test]
async fn test_expired_token_is_refreshed_and_request_resent() {
    let h = harness().await;
    let first = jwt("user-1", "alice", "1");
    let second = jwt("user-1", "alice", "2");

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(token_response(&first, "refresh-1"))
        .expect(1)
        .mount(&h.idp)
        .await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(token_response(&second, "refresh-2"))
        .expect(1)
        .mount(&h.idp)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/stats"))
        .and(header("authorization", format!("Bearer {}", second).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"total_trades": 12})))
        .expect(1)
        .mount(&h.backend)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/stats"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({"detail": "Token expired"})))
        .expect(1)
        .mount(&h.backend)
        .await;

    let state = h.session.initialize().await;
    assert_eq!(state.status, SessionStatus::Authenticated);
    assert_eq!(state.username.as_deref(), Some("alice"));

    let stats = h.client.account().stats().await.unwrap();
    assert_eq!(stats["total_trades"], 12);
    assert_eq!(h.session.access_token(), Some(second));
}

#[tokio::test]
async fn test_failed_refresh_ends_session_and_requests_sign_in() {
    let h = harness().await;
    let first = jwt("user-1", "alice", "1");

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(token_response(&first, "refresh-1"))
        .mount(&h.idp)
        .await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Session not active",
        })))
        .expect(1)
        .mount(&h.idp)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/trades/7"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.backend)
        .await;

    h.session.initialize().await;
    let mut rx = h.session.subscribe();

    let err = h.client.trades().get("7").await.unwrap_err();
    assert!(matches!(err, Error::RequestAuth { status: 401, .. }));

    // The bridge asked for a fresh sign-in, which the agent approves.
    assert_eq!(h.agent.authorizations.load(Ordering::SeqCst), 2);
    let state = rx
        .wait_for(|s| s.status == SessionStatus::Authenticated)
        .await
        .unwrap()
        .clone();
    assert_eq!(state.username.as_deref(), Some("alice"));
}

#[tokio::test]
async fn test_logout_during_refresh_does_not_sign_in_again() {
    let h = harness().await;
    let first = jwt("user-1", "alice", "1");
    let second = jwt("user-1", "alice", "2");

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(token_response(&first, "refresh-1"))
        .expect(1)
        .mount(&h.idp)
        .await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(token_response(&second, "refresh-2").set_delay(Duration::from_secs(10)))
        .mount(&h.idp)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/stats"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.backend)
        .await;

    h.session.initialize().await;

    let client = h.client.clone();
    let call = tokio::spawn(async move { client.account().stats().await });

    // Wait until the refresh exchange has reached the provider.
    let mut refreshing = false;
    for _ in 0..250 {
        let requests = h.idp.received_requests().await.unwrap_or_default();
        refreshing = requests
            .iter()
            .any(|r| String::from_utf8_lossy(&r.body).contains("grant_type=refresh_token"));
        if refreshing {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(refreshing);

    h.session.logout().await;

    let err = call.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::RequestAuth { status: 401, .. }));
    assert_eq!(h.agent.authorizations.load(Ordering::SeqCst), 1);
    assert_eq!(h.session.state().status, SessionStatus::Unauthenticated);
    assert_eq!(h.session.access_token(), None);
}

#[tokio::test]
async fn test_not_found_and_api_errors() {
    let h = harness().await;

    Mock::given(method("GET"))
        .and(path("/api/signals/99"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({"detail": "Signal not found"})))
        .mount(&h.backend)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/trades/3"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.backend)
        .await;

    let err = h.client.signals().get("99").await.unwrap_err();
    assert!(err.is_not_found());

    let err = h.client.trades().delete("3").await.unwrap_err();
    assert!(err.is_server_error());
}

#[tokio::test]
async fn test_list_queries_are_sent() {
    let h = harness().await;

    Mock::given(method("GET"))
        .and(path("/api/trades"))
        .and(wiremock::matchers::query_param("ticker", "AAPL"))
        .and(wiremock::matchers::query_param("status", "open"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(1)
        .mount(&h.backend)
        .await;

    let trades = h
        .client
        .trades()
        .list(&tradejournal_client::ListTradesQuery {
            ticker: Some("AAPL".to_string()),
            status: Some("open".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(trades.as_array().unwrap().is_empty());
}
