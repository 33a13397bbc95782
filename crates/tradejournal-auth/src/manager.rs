//! Session lifecycle: authorization, refresh, logout.
//!
//! One [`SessionManager`] owns one `SessionHandle`. Every operation that
//! talks to the provider is single-flight: the first caller starts a shared
//! future and later callers await the same one. Logout and re-login bump a
//! generation counter so results from abandoned flows are dropped.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::{AbortHandle, Abortable, BoxFuture, Shared};
use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};

use crate::claims::AccessClaims;
use crate::clock::{SharedClock, SystemClock};
use crate::error::{OidcError, SessionError, SessionErrorInfo};
use crate::oidc::{AuthorizationCallback, PkceChallenge, TokenSet, generate_state};
use crate::provider::SharedIdentityProvider;
use crate::state::{Credentials, SessionState, SessionStatus};
use crate::timer::RefreshTimer;
use crate::user_agent::SharedUserAgent;

/// How often the periodic refresh runs while authenticated.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Remaining validity below which the periodic refresh renews the token.
pub const DEFAULT_MIN_VALIDITY_SECS: u64 = 70;

/// Threshold that makes [`SessionManager::refresh`] renew unconditionally.
pub const FORCE_REFRESH: u64 = 0;

/// Periodic refresh cadence and threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub interval: Duration,
    pub min_validity_secs: u64,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_REFRESH_INTERVAL,
            min_validity_secs: DEFAULT_MIN_VALIDITY_SECS,
        }
    }
}

type AuthFlow = Shared<BoxFuture<'static, SessionState>>;
type RefreshFlow = Shared<BoxFuture<'static, Result<bool, SessionError>>>;

/// A shared flow plus the switch that cancels it.
struct InFlight<F> {
    flow: F,
    abort: AbortHandle,
}

impl<F> InFlight<F> {
    fn cancel(self) {
        self.abort.abort();
    }
}

/// Everything guarded by the handle lock. Never held across an await.
#[derive(Default)]
struct HandleState {
    state: SessionState,
    credentials: Option<Credentials>,
    authorizing: Option<InFlight<AuthFlow>>,
    refreshing: Option<InFlight<RefreshFlow>>,
    timer: Option<RefreshTimer>,
    generation: u64,
    shut_down: bool,
}

impl HandleState {
    /// Drop tokens and in-flight work and move to `status`.
    fn reset(&mut self, status: SessionStatus) {
        self.generation += 1;
        if let Some(flow) = self.authorizing.take() {
            flow.cancel();
        }
        if let Some(flow) = self.refreshing.take() {
            flow.cancel();
        }
        self.timer = None;
        self.credentials = None;
        self.state = SessionState {
            status,
            ..Default::default()
        };
    }
}

/// The provider client, the user agent, and the session they produce.
pub(crate) struct SessionHandle {
    provider: SharedIdentityProvider,
    user_agent: SharedUserAgent,
    clock: SharedClock,
    policy: RefreshPolicy,
    core: Mutex<HandleState>,
    state_tx: watch::Sender<SessionState>,
}

impl SessionHandle {
    fn publish(&self, state: &SessionState) {
        self.state_tx.send_replace(state.clone());
    }

    fn snapshot(&self) -> SessionState {
        self.core.lock().state.clone()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Authorization
    // ─────────────────────────────────────────────────────────────────────────

    /// Start a new authorization flow. Caller holds the lock.
    fn begin_authorization(
        self: &Arc<Self>,
        core: &mut HandleState,
        redirect_target: Option<String>,
    ) -> (AuthFlow, oneshot::Receiver<()>) {
        core.reset(SessionStatus::Initializing);
        let generation = core.generation;
        self.publish(&core.state);
        tracing::debug!(generation, "Starting authorization flow");

        let (navigated_tx, navigated_rx) = oneshot::channel();
        let (abort, registration) = AbortHandle::new_pair();
        let work = Abortable::new(self.clone().run_authorization(navigated_tx), registration);

        let handle = self.clone();
        let flow = async move {
            match work.await {
                Ok(outcome) => handle.finish_authorization(generation, outcome, redirect_target),
                Err(_aborted) => handle.snapshot(),
            }
        }
        .boxed()
        .shared();

        core.authorizing = Some(InFlight {
            flow: flow.clone(),
            abort,
        });
        // Drives the flow even when no caller awaits it (login).
        tokio::spawn(flow.clone());

        (flow, navigated_rx)
    }

    async fn run_authorization(
        self: Arc<Self>,
        navigated: oneshot::Sender<()>,
    ) -> Result<TokenSet, SessionError> {
        let pkce = PkceChallenge::generate();
        let csrf_state = generate_state();
        let url = self.provider.authorization_url(&pkce, &csrf_state);

        let pending = self.user_agent.open_authorization(&url).await;
        let _ = navigated.send(());
        let callback = pending
            .map_err(initialization)?
            .wait()
            .await
            .map_err(initialization)?;

        match callback {
            AuthorizationCallback::Code { code, state } => {
                if state != csrf_state {
                    return Err(SessionError::Initialization(
                        "state mismatch in authorization callback".to_string(),
                    ));
                }
                self.provider
                    .exchange_code(&code, &pkce.verifier)
                    .await
                    .map_err(initialization)
            }
            AuthorizationCallback::Error {
                error, description, ..
            } => Err(SessionError::Initialization(match description {
                Some(description) => format!("{}: {}", error, description),
                None => error,
            })),
        }
    }

    fn finish_authorization(
        self: &Arc<Self>,
        generation: u64,
        outcome: Result<TokenSet, SessionError>,
        redirect_target: Option<String>,
    ) -> SessionState {
        let mut core = self.core.lock();
        if core.generation != generation || core.shut_down {
            tracing::debug!(generation, "Discarding stale authorization result");
            return core.state.clone();
        }
        core.authorizing = None;

        let session = outcome.and_then(|tokens| {
            self.session_from_tokens(tokens, None)
                .map_err(SessionError::Initialization)
        });
        match session {
            Ok((credentials, mut state)) => {
                state.redirect_target = redirect_target;
                tracing::info!(
                    subject = state.subject.as_deref().unwrap_or_default(),
                    username = state.username.as_deref().unwrap_or_default(),
                    expires_at = credentials.expires_at,
                    "Session established"
                );
                core.credentials = Some(credentials);
                core.state = state;
                core.timer = Some(self.start_timer());
            }
            Err(err) => {
                tracing::warn!(error = %err, "Authorization failed");
                core.state = SessionState {
                    status: SessionStatus::Unauthenticated,
                    last_error: Some(SessionErrorInfo::from(&err)),
                    ..Default::default()
                };
            }
        }

        self.publish(&core.state);
        core.state.clone()
    }

    /// Turn a token response into stored credentials and a public snapshot.
    fn session_from_tokens(
        &self,
        tokens: TokenSet,
        previous_refresh_token: Option<String>,
    ) -> Result<(Credentials, SessionState), String> {
        let now = self.clock.now();

        let claims = [Some(tokens.access_token.as_str()), tokens.id_token.as_deref()]
            .into_iter()
            .flatten()
            .filter_map(|token| AccessClaims::decode(token).ok())
            .find(|claims| claims.sub.is_some())
            .ok_or_else(|| "token carries no subject claim".to_string())?;

        let expires_at = if tokens.expires_in > 0 {
            now.saturating_add(i64::try_from(tokens.expires_in).unwrap_or(i64::MAX))
        } else {
            claims.exp.unwrap_or(now)
        };
        if expires_at <= now {
            return Err("token is already expired".to_string());
        }

        let refresh_token = tokens.refresh_token.or(previous_refresh_token);
        let state = SessionState {
            status: SessionStatus::Authenticated,
            access_token: Some(tokens.access_token),
            expires_at: Some(expires_at),
            subject: claims.sub.clone(),
            username: claims.display_name().map(str::to_string),
            session_id: claims.sid.clone().or(tokens.session_state),
            has_refresh_token: refresh_token.is_some(),
            has_id_token: tokens.id_token.is_some(),
            claims: Some(claims),
            redirect_target: None,
            last_error: None,
        };
        let credentials = Credentials {
            refresh_token,
            id_token: tokens.id_token,
            expires_at,
        };

        Ok((credentials, state))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Refresh
    // ─────────────────────────────────────────────────────────────────────────

    async fn refresh(self: &Arc<Self>, min_validity_secs: u64) -> Result<bool, SessionError> {
        let flow = {
            let mut core = self.core.lock();
            if let Some(in_flight) = &core.refreshing {
                in_flight.flow.clone()
            } else {
                if core.state.status != SessionStatus::Authenticated {
                    return Err(SessionError::NotAuthenticated);
                }
                let Some(credentials) = &core.credentials else {
                    return Err(SessionError::NotAuthenticated);
                };

                if min_validity_secs != FORCE_REFRESH {
                    let remaining = credentials.expires_at - self.clock.now();
                    if remaining >= i64::try_from(min_validity_secs).unwrap_or(i64::MAX) {
                        tracing::trace!(remaining, "Access token still valid");
                        return Ok(false);
                    }
                }

                match credentials.refresh_token.clone() {
                    Some(refresh_token) => self.begin_refresh(&mut core, refresh_token),
                    None => {
                        let err = SessionError::Refresh("no refresh token available".to_string());
                        self.fail_refresh(&mut core, &err);
                        return Err(err);
                    }
                }
            }
        };

        flow.await
    }

    /// Start the shared refresh exchange. Caller holds the lock.
    fn begin_refresh(self: &Arc<Self>, core: &mut HandleState, refresh_token: String) -> RefreshFlow {
        let generation = core.generation;
        let provider = self.provider.clone();
        let (abort, registration) = AbortHandle::new_pair();
        let work = Abortable::new(
            async move { provider.refresh(&refresh_token).await },
            registration,
        );

        let handle = self.clone();
        let flow = async move {
            match work.await {
                Ok(outcome) => handle.finish_refresh(generation, outcome),
                Err(_aborted) => Err(SessionError::Cancelled),
            }
        }
        .boxed()
        .shared();

        core.refreshing = Some(InFlight {
            flow: flow.clone(),
            abort,
        });
        flow
    }

    fn finish_refresh(
        &self,
        generation: u64,
        outcome: Result<TokenSet, OidcError>,
    ) -> Result<bool, SessionError> {
        let mut core = self.core.lock();
        if core.generation != generation || core.shut_down {
            tracing::debug!(generation, "Discarding stale refresh result");
            return Err(SessionError::Cancelled);
        }
        core.refreshing = None;

        let previous = core
            .credentials
            .as_ref()
            .and_then(|credentials| credentials.refresh_token.clone());
        let session = outcome
            .map_err(|e| SessionError::Refresh(e.to_string()))
            .and_then(|tokens| {
                self.session_from_tokens(tokens, previous)
                    .map_err(SessionError::Refresh)
            });

        match session {
            Ok((credentials, mut state)) => {
                state.redirect_target = core.state.redirect_target.take();
                tracing::debug!(expires_at = credentials.expires_at, "Access token refreshed");
                core.credentials = Some(credentials);
                core.state = state;
                self.publish(&core.state);
                Ok(true)
            }
            Err(err) => {
                self.fail_refresh(&mut core, &err);
                Err(err)
            }
        }
    }

    fn fail_refresh(&self, core: &mut HandleState, err: &SessionError) {
        tracing::warn!(error = %err, "Token refresh failed, session ended");
        core.reset(SessionStatus::Unauthenticated);
        core.state.last_error = Some(SessionErrorInfo::from(err));
        self.publish(&core.state);
    }

    fn start_timer(self: &Arc<Self>) -> RefreshTimer {
        let weak = Arc::downgrade(self);
        RefreshTimer::spawn(self.policy.interval, move || {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(handle) => handle.refresh_tick().await,
                    None => false,
                }
            }
        })
    }

    /// One periodic refresh. Returns whether the timer should keep running.
    async fn refresh_tick(self: &Arc<Self>) -> bool {
        match self.refresh(self.policy.min_validity_secs).await {
            Ok(refreshed) => {
                if refreshed {
                    tracing::debug!("Periodic refresh renewed access token");
                }
                true
            }
            Err(SessionError::NotAuthenticated | SessionError::Cancelled) => false,
            Err(err) => {
                tracing::debug!(error = %err, "Periodic refresh stopped");
                false
            }
        }
    }
}

fn initialization(err: OidcError) -> SessionError {
    SessionError::Initialization(err.to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// SessionManager
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the single session lifecycle of the process.
///
/// Cloning is cheap and every clone shares the same handle.
#[derive(Clone)]
pub struct SessionManager {
    handle: Arc<SessionHandle>,
}

impl SessionManager {
    pub fn builder() -> SessionManagerBuilder {
        SessionManagerBuilder::default()
    }

    /// Resolve the session, running the authorization flow if nothing has
    /// been attempted yet.
    ///
    /// Concurrent callers share one flow. Failures are reported through
    /// `last_error` on the returned state.
    pub async fn initialize(&self) -> SessionState {
        let flow = {
            let mut core = self.handle.core.lock();
            if core.shut_down || core.state.status.is_resolved() {
                return core.state.clone();
            }
            if let Some(in_flight) = &core.authorizing {
                in_flight.flow.clone()
            } else {
                let (flow, _navigated) = self.handle.begin_authorization(&mut core, None);
                flow
            }
        };
        flow.await
    }

    /// Send the user to the provider for a fresh sign-in.
    ///
    /// Returns once the user agent has been sent; the outcome arrives as a
    /// state transition. Does nothing if a flow is already in flight.
    pub async fn login(&self, redirect_target: Option<&str>) {
        let navigated = {
            let mut core = self.handle.core.lock();
            if core.shut_down {
                tracing::warn!("Ignoring login after shutdown");
                return;
            }
            if core.authorizing.is_some() {
                tracing::debug!("Authorization already in progress");
                return;
            }
            let (_flow, navigated) = self
                .handle
                .begin_authorization(&mut core, redirect_target.map(str::to_string));
            navigated
        };
        let _ = navigated.await;
    }

    /// Drop local tokens and end the provider session.
    pub async fn logout(&self) {
        let id_token = {
            let mut core = self.handle.core.lock();
            let id_token = core
                .credentials
                .as_ref()
                .and_then(|credentials| credentials.id_token.clone());
            core.reset(SessionStatus::Unauthenticated);
            self.handle.publish(&core.state);
            if core.shut_down {
                return;
            }
            id_token
        };
        tracing::info!("Signed out");

        let url = self.handle.provider.end_session_url(id_token.as_deref());
        if let Err(e) = self.handle.user_agent.open(&url).await {
            tracing::warn!(error = %e, "Failed to open end-session endpoint");
        }
    }

    /// Current access token, if authenticated.
    pub fn access_token(&self) -> Option<String> {
        let core = self.handle.core.lock();
        match core.state.status {
            SessionStatus::Authenticated => core.state.access_token.clone(),
            _ => None,
        }
    }

    /// Renew the access token if it expires within `min_validity_secs`.
    ///
    /// [`FORCE_REFRESH`] renews regardless. Returns whether an exchange
    /// happened.
    pub async fn refresh(&self, min_validity_secs: u64) -> Result<bool, SessionError> {
        self.handle.refresh(min_validity_secs).await
    }

    /// Receiver for state transitions. `borrow()` gives the current state.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.handle.state_tx.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.handle.snapshot()
    }

    /// Seconds left on the access token, if any.
    pub fn remaining_validity(&self) -> Option<i64> {
        let now = self.handle.clock.now();
        self.handle.core.lock().state.remaining_validity(now)
    }

    pub fn refresh_policy(&self) -> RefreshPolicy {
        self.handle.policy
    }

    /// Tear the session down for good.
    pub fn shutdown(&self) {
        let mut core = self.handle.core.lock();
        if core.shut_down {
            return;
        }
        core.shut_down = true;
        core.reset(SessionStatus::Unauthenticated);
        self.handle.publish(&core.state);
        tracing::debug!("Session manager shut down");
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.handle.core.lock();
        f.debug_struct("SessionManager")
            .field("status", &core.state.status)
            .field("provider", &self.handle.provider)
            .field("policy", &self.handle.policy)
            .finish()
    }
}

/// Builder for [`SessionManager`].
#[derive(Default)]
pub struct SessionManagerBuilder {
    provider: Option<SharedIdentityProvider>,
    user_agent: Option<SharedUserAgent>,
    clock: Option<SharedClock>,
    policy: RefreshPolicy,
}

impl SessionManagerBuilder {
    pub fn provider(mut self, provider: SharedIdentityProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn user_agent(mut self, user_agent: SharedUserAgent) -> Self {
        self.user_agent = Some(user_agent);
        self
    }

    /// Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> crate::Result<SessionManager> {
        let provider = self
            .provider
            .ok_or_else(|| OidcError::Config("identity provider is required".to_string()))?;
        let user_agent = self
            .user_agent
            .ok_or_else(|| OidcError::Config("user agent is required".to_string()))?;
        if self.policy.interval.is_zero() {
            return Err(OidcError::Config(
                "refresh interval must be greater than zero".to_string(),
            ));
        }

        let (state_tx, _) = watch::channel(SessionState::default());
        Ok(SessionManager {
            handle: Arc::new(SessionHandle {
                provider,
                user_agent,
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
                policy: self.policy,
                core: Mutex::new(HandleState::default()),
                state_tx,
            }),
        })
    }
}
