//! Front channel: sending the user to the provider and receiving the redirect.
//!
//! - [`LoopbackUserAgent`] opens the system browser and catches the redirect on
//!   a local listener bound to the redirect URI.
//! - [`PastedUserAgent`] prints the URL and reads the redirect URL from stdin,
//!   for hosts without a browser.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    extract::{RawQuery, State},
    response::Html,
    routing::get,
};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::io::AsyncBufReadExt;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use url::{Host, Url};

use crate::error::{OidcError, Result};
use crate::oidc::{AuthorizationCallback, parse_callback};

/// A redirect the provider has not delivered yet.
pub struct PendingCallback(BoxFuture<'static, Result<AuthorizationCallback>>);

impl PendingCallback {
    pub fn new(
        future: impl std::future::Future<Output = Result<AuthorizationCallback>> + Send + 'static,
    ) -> Self {
        Self(Box::pin(future))
    }

    /// A callback that is already known.
    pub fn ready(callback: AuthorizationCallback) -> Self {
        Self::new(async move { Ok(callback) })
    }

    /// Wait for the provider to redirect back.
    pub async fn wait(self) -> Result<AuthorizationCallback> {
        self.0.await
    }
}

impl std::fmt::Debug for PendingCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PendingCallback")
    }
}

/// The browser, as far as the session manager is concerned.
#[async_trait]
pub trait UserAgent: Send + Sync + std::fmt::Debug {
    /// Send the user to an authorization URL and start listening for the redirect.
    ///
    /// Returns once the user has been sent; the returned callback resolves when
    /// the provider redirects back.
    async fn open_authorization(&self, url: &str) -> Result<PendingCallback>;

    /// Send the user somewhere with no redirect expected (logout).
    async fn open(&self, url: &str) -> Result<()>;
}

/// Shared user agent for use across async contexts.
pub type SharedUserAgent = Arc<dyn UserAgent>;

// ============================================================================
// LoopbackUserAgent
// ============================================================================

/// Browser + local redirect listener.
#[derive(Debug, Clone)]
pub struct LoopbackUserAgent {
    bind_addr: SocketAddr,
    callback_path: String,
    open_browser: bool,
}

impl LoopbackUserAgent {
    /// Derive the listener address from a loopback redirect URI.
    pub fn from_redirect_uri(redirect_uri: &str) -> Result<Self> {
        let url = Url::parse(redirect_uri)
            .map_err(|e| OidcError::Config(format!("Invalid redirect URI: {}", e)))?;

        let ip: IpAddr = match url.host() {
            Some(Host::Ipv4(ip)) if ip.is_loopback() => ip.into(),
            Some(Host::Ipv6(ip)) if ip.is_loopback() => ip.into(),
            Some(Host::Domain("localhost")) => Ipv4Addr::LOCALHOST.into(),
            _ => {
                return Err(OidcError::Config(format!(
                    "Redirect URI {} does not point at a loopback address",
                    redirect_uri
                )));
            }
        };
        let port = url.port_or_known_default().ok_or_else(|| {
            OidcError::Config(format!("Redirect URI {} has no port", redirect_uri))
        })?;

        Ok(Self {
            bind_addr: SocketAddr::new(ip, port),
            callback_path: url.path().to_string(),
            open_browser: true,
        })
    }

    /// Skip launching the system browser; the URL is only printed.
    pub fn without_browser(mut self) -> Self {
        self.open_browser = false;
        self
    }

    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    pub fn callback_path(&self) -> &str {
        &self.callback_path
    }

    fn announce(&self, url: &str) {
        if self.open_browser && open_url(url).is_ok() {
            tracing::info!("Opened system browser for sign-in");
            return;
        }
        eprintln!("Open this URL in your browser:");
        eprintln!();
        eprintln!("  {}", url);
        eprintln!();
    }
}

/// Shared state for the redirect listener.
struct CallbackState {
    sender: Mutex<Option<oneshot::Sender<Result<AuthorizationCallback>>>>,
}

/// Build the router that receives the provider redirect.
fn callback_router(
    path: &str,
    sender: oneshot::Sender<Result<AuthorizationCallback>>,
) -> Router {
    let state = Arc::new(CallbackState {
        sender: Mutex::new(Some(sender)),
    });

    Router::new()
        .route(path, get(handle_callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle GET on the redirect path.
async fn handle_callback(
    State(state): State<Arc<CallbackState>>,
    RawQuery(query): RawQuery,
) -> Html<&'static str> {
    let parsed = parse_callback(query.as_deref().unwrap_or_default());
    let page = match &parsed {
        Ok(AuthorizationCallback::Code { .. }) => {
            "<h2>Signed in</h2><p>You can close this window.</p>"
        }
        Ok(AuthorizationCallback::Error { .. }) => {
            "<h2>Sign-in was not completed</h2><p>Return to the terminal for details.</p>"
        }
        Err(_) => "<h2>Invalid sign-in callback</h2>",
    };

    match state.sender.lock().take() {
        Some(sender) => {
            let _ = sender.send(parsed);
        }
        None => tracing::debug!("Ignoring repeated sign-in callback"),
    }

    Html(page)
}

#[async_trait]
impl UserAgent for LoopbackUserAgent {
    async fn open_authorization(&self, url: &str) -> Result<PendingCallback> {
        let listener = TcpListener::bind(self.bind_addr).await.map_err(|e| {
            OidcError::Config(format!(
                "Failed to bind redirect listener on {}: {}",
                self.bind_addr, e
            ))
        })?;
        tracing::debug!(addr = %self.bind_addr, path = %self.callback_path, "Waiting for sign-in redirect");

        let (callback_tx, callback_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let router = callback_router(&self.callback_path, callback_tx);

        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        self.announce(url);

        Ok(PendingCallback::new(async move {
            let received = callback_rx.await.map_err(|_| {
                OidcError::InvalidRequest("Redirect listener closed before callback".to_string())
            });
            let _ = shutdown_tx.send(());
            received?
        }))
    }

    async fn open(&self, url: &str) -> Result<()> {
        self.announce(url);
        Ok(())
    }
}

// ============================================================================
// PastedUserAgent
// ============================================================================

/// Prints the URL and reads the redirect URL pasted on stdin.
#[derive(Debug, Clone, Default)]
pub struct PastedUserAgent;

#[async_trait]
impl UserAgent for PastedUserAgent {
    async fn open_authorization(&self, url: &str) -> Result<PendingCallback> {
        eprintln!("Trading Journal sign-in");
        eprintln!("=======================");
        eprintln!();
        eprintln!("Open this URL in your browser:");
        eprintln!();
        eprintln!("  {}", url);
        eprintln!();
        eprintln!("After signing in, copy the full address of the page you land on");
        eprintln!("and paste it here:");
        eprintln!();

        if open_url(url).is_err() {
            eprintln!("(Could not open browser automatically)");
            eprintln!();
        }

        Ok(PendingCallback::new(async {
            eprint!("redirect> ");
            let mut line = String::new();
            tokio::io::BufReader::new(tokio::io::stdin())
                .read_line(&mut line)
                .await
                .map_err(|e| OidcError::InvalidRequest(format!("Failed to read input: {}", e)))?;
            if line.trim().is_empty() {
                return Err(OidcError::InvalidRequest("No input provided".to_string()));
            }
            parse_callback(&line)
        }))
    }

    async fn open(&self, url: &str) -> Result<()> {
        eprintln!("Sign out at: {}", url);
        Ok(())
    }
}

/// Try to open a URL in the default browser.
pub fn open_url(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", url])
            .spawn()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[test]
    fn test_from_redirect_uri() {
        let agent = LoopbackUserAgent::from_redirect_uri("http://127.0.0.1:8765/callback").unwrap();
        assert_eq!(
            agent.bind_addr(),
            "127.0.0.1:8765".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(agent.callback_path(), "/callback");

        let localhost = LoopbackUserAgent::from_redirect_uri("http://localhost:9000/cb").unwrap();
        assert_eq!(localhost.bind_addr().port(), 9000);
    }

    #[test]
    fn test_from_redirect_uri_rejects_remote_hosts() {
        assert!(LoopbackUserAgent::from_redirect_uri("https://trading.example.com/").is_err());
        assert!(LoopbackUserAgent::from_redirect_uri("not a url").is_err());
    }

    #[tokio::test]
    async fn test_callback_router_delivers_code_once() {
        let (tx, mut rx) = oneshot::channel();
        let router = callback_router("/callback", tx);

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/callback?code=abc&state=xyz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let callback = rx.try_recv().unwrap().unwrap();
        assert_eq!(
            callback,
            AuthorizationCallback::Code {
                code: "abc".to_string(),
                state: "xyz".to_string()
            }
        );

        let repeat = router
            .oneshot(
                Request::builder()
                    .uri("/callback?code=def&state=xyz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(repeat.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_callback_router_ignores_other_paths() {
        let (tx, _rx) = oneshot::channel();
        let router = callback_router("/callback", tx);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/favicon.ico")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_loopback_round_trip() {
        let free_port = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = free_port.local_addr().unwrap().port();
        drop(free_port);
        let agent =
            LoopbackUserAgent::from_redirect_uri(&format!("http://127.0.0.1:{}/callback", port))
                .unwrap()
                .without_browser();

        let pending = agent
            .open_authorization("http://provider.invalid/auth")
            .await
            .unwrap();

        let redirect = format!("http://127.0.0.1:{}/callback?code=abc&state=xyz", port);
        let body = reqwest::get(&redirect).await.unwrap().text().await.unwrap();
        assert!(body.contains("Signed in"));

        let callback = pending.wait().await.unwrap();
        assert!(matches!(callback, AuthorizationCallback::Code { .. }));
    }
}
