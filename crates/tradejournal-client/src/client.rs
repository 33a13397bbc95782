//! Main client implementation.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::api::{AccountApi, BotsApi, SignalsApi, TradesApi};
use crate::bridge::{BridgeConfig, RequestAuthBridge, SharedAuthority};
use crate::error::{Error, ErrorResponse, Result};
use crate::transport::{ApiRequest, ApiResponse, ReqwestTransport, SharedTransport};

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default backend location.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Trading Journal backend client.
///
/// Every call goes through a [`RequestAuthBridge`].
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tradejournal_client::TradeJournalClient;
///
/// # async fn example(session: tradejournal_auth::SessionManager) -> tradejournal_client::Result<()> {
/// let client = TradeJournalClient::builder()
///     .base_url("http://localhost:8000/api")
///     .session(Arc::new(session))
///     .build()?;
///
/// let stats = client.account().stats().await?;
/// println!("{}", stats);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct TradeJournalClient {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    bridge: RequestAuthBridge,
    base_url: String,
}

impl TradeJournalClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn bridge(&self) -> &RequestAuthBridge {
        &self.inner.bridge
    }

    // ─────────────────────────────────────────────────────────────────────────
    // API accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Access the signals API.
    pub fn signals(&self) -> SignalsApi {
        SignalsApi::new(self.clone())
    }

    /// Access the trades API.
    pub fn trades(&self) -> TradesApi {
        TradesApi::new(self.clone())
    }

    /// Access the bot configuration API.
    pub fn bots(&self) -> BotsApi {
        BotsApi::new(self.clone())
    }

    /// Access stats and the current user.
    pub fn account(&self) -> AccountApi {
        AccountApi::new(self.clone())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal HTTP methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Send a request and decode a JSON response.
    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let response = self.inner.bridge.execute(request).await?;
        handle_response(response)
    }

    /// Make a GET request.
    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(ApiRequest::get(path)).await
    }

    /// Make a GET request with query parameters.
    pub(crate) async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.send(ApiRequest::get(path).with_query(query_pairs(query)?))
            .await
    }

    /// Make a POST request.
    pub(crate) async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(ApiRequest::post(path, serde_json::to_value(body)?))
            .await
    }

    /// Make a PUT request.
    pub(crate) async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(ApiRequest::put(path, serde_json::to_value(body)?))
            .await
    }

    /// Make a DELETE request.
    pub(crate) async fn delete(&self, path: &str) -> Result<()> {
        let response = self.inner.bridge.execute(ApiRequest::delete(path)).await?;
        if !response.is_success() {
            return Err(extract_error(response));
        }
        Ok(())
    }
}

/// Handle a response, extracting the body or error.
fn handle_response<T: DeserializeOwned>(response: ApiResponse) -> Result<T> {
    if !response.is_success() {
        return Err(extract_error(response));
    }
    if response.body.trim().is_empty() {
        return Ok(serde_json::from_value(serde_json::Value::Null)?);
    }
    Ok(serde_json::from_str(&response.body)?)
}

/// Extract an error from a failed response.
fn extract_error(response: ApiResponse) -> Error {
    let status = response.status;
    let message = serde_json::from_str::<ErrorResponse>(&response.body)
        .ok()
        .and_then(ErrorResponse::into_message)
        .unwrap_or_else(|| format!("HTTP {}", status));

    if status == 404 {
        Error::NotFound(message)
    } else {
        Error::Api { status, message }
    }
}

/// Flatten a serializable query struct into string pairs, skipping nulls.
fn query_pairs<Q: Serialize + ?Sized>(query: &Q) -> Result<Vec<(String, String)>> {
    let value = serde_json::to_value(query)?;
    let serde_json::Value::Object(map) = value else {
        return Err(Error::Config("Query parameters must be a map".to_string()));
    };

    Ok(map
        .into_iter()
        .filter_map(|(key, value)| match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some((key, s)),
            other => Some((key, other.to_string())),
        })
        .collect())
}

/// Builder for creating a [`TradeJournalClient`].
pub struct ClientBuilder {
    base_url: Option<String>,
    timeout: Duration,
    user_agent: Option<String>,
    session: Option<SharedAuthority>,
    transport: Option<SharedTransport>,
    bridge: BridgeConfig,
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
            session: None,
            transport: None,
            bridge: BridgeConfig::default(),
        }
    }

    /// Set the base URL of the backend API.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Session that supplies bearer tokens. Without one, requests go out
    /// unauthenticated.
    pub fn session(mut self, session: SharedAuthority) -> Self {
        self.session = Some(session);
        self
    }

    /// Replace the reqwest transport.
    pub fn transport(mut self, transport: SharedTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Statuses that trigger refresh-and-retry.
    pub fn retry_on_status(mut self, statuses: Vec<u16>) -> Self {
        self.bridge.retry_on_status = statuses;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<TradeJournalClient> {
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let transport: SharedTransport = match self.transport {
            Some(transport) => transport,
            None => {
                let mut headers = HeaderMap::new();
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

                let user_agent = self
                    .user_agent
                    .unwrap_or_else(|| format!("tradejournal-client/{}", env!("CARGO_PKG_VERSION")));

                let http = reqwest::Client::builder()
                    .default_headers(headers)
                    .user_agent(user_agent)
                    .build()?;

                Arc::new(ReqwestTransport::new(http, &base_url, self.timeout)?)
            }
        };

        Ok(TradeJournalClient {
            inner: Arc::new(ClientInner {
                bridge: RequestAuthBridge::new(transport, self.session, self.bridge),
                base_url,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_base_url() {
        let client = ClientBuilder::new().build().unwrap();
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
        assert_eq!(client.bridge().config().retry_on_status, vec![401]);
    }

    #[test]
    fn test_builder_rejects_invalid_url() {
        let result = ClientBuilder::new().base_url("not a url").build();
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_query_pairs_skip_unset_fields() {
        #[derive(Serialize)]
        struct Query {
            ticker: Option<String>,
            limit: Option<usize>,
            status: Option<String>,
        }

        let pairs = query_pairs(&Query {
            ticker: Some("AAPL".to_string()),
            limit: Some(50),
            status: None,
        })
        .unwrap();

        assert!(pairs.contains(&("ticker".to_string(), "AAPL".to_string())));
        assert!(pairs.contains(&("limit".to_string(), "50".to_string())));
        assert_eq!(pairs.len(), 2);
    }

    #[test]
    fn test_extract_error_mapping() {
        let not_found = extract_error(ApiResponse {
            status: 404,
            headers: HeaderMap::new(),
            body: r#"{"detail":"Trade not found"}"#.to_string(),
        });
        assert!(matches!(not_found, Error::NotFound(ref m) if m == "Trade not found"));

        let server = extract_error(ApiResponse {
            status: 500,
            headers: HeaderMap::new(),
            body: "<html>oops</html>".to_string(),
        });
        assert!(matches!(server, Error::Api { status: 500, ref message } if message == "HTTP 500"));
    }

    #[test]
    fn test_empty_success_body_decodes_as_null() {
        let value: serde_json::Value = handle_response(ApiResponse {
            status: 204,
            headers: HeaderMap::new(),
            body: String::new(),
        })
        .unwrap();
        assert!(value.is_null());
    }
}
