//! Authenticated session management for the Trading Journal client.
//!
//! The client signs in against an OpenID Connect provider (Keycloak) with the
//! authorization-code flow and PKCE, keeps the access token fresh in the
//! background, and hands it to the HTTP layer.
//!
//! ```text
//! ┌──────────────┐  initialize/login  ┌────────────────┐  code/refresh  ┌──────────┐
//! │SessionContext│ ─────────────────▶ │ SessionManager │ ─────────────▶ │ Keycloak │
//! └──────────────┘ ◀──── watch ────── └────────────────┘                └──────────┘
//!                                         │ navigate ▲ callback
//!                                         ▼          │
//!                                      ┌─────────────────┐
//!                                      │    UserAgent    │
//!                                      └─────────────────┘
//! ```
//!
//! - [`SessionManager`]: single-flight authorization and refresh, logout,
//!   periodic renewal.
//! - [`SessionContext`]: mount/unmount lifecycle and the [`SessionView`].
//! - [`oidc`]: PKCE, URLs and token-endpoint calls.

pub mod claims;
pub mod clock;
pub mod context;
pub mod error;
pub mod manager;
pub mod oidc;
pub mod provider;
pub mod state;
mod timer;
pub mod user_agent;

pub use claims::AccessClaims;
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use context::{SessionContext, SessionView};
pub use error::{OidcError, Result, SessionError, SessionErrorInfo, SessionErrorKind};
pub use manager::{
    DEFAULT_MIN_VALIDITY_SECS, DEFAULT_REFRESH_INTERVAL, FORCE_REFRESH, RefreshPolicy,
    SessionManager, SessionManagerBuilder,
};
pub use oidc::{AuthorizationCallback, OidcConfig, PkceChallenge, TokenSet};
pub use provider::{IdentityProvider, OidcClient, SharedIdentityProvider};
pub use state::{SessionState, SessionStatus};
pub use user_agent::{
    LoopbackUserAgent, PastedUserAgent, PendingCallback, SharedUserAgent, UserAgent,
};
