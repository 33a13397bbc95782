//! Session snapshot types.

use serde::Serialize;

use crate::claims::AccessClaims;
use crate::error::SessionErrorInfo;

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Nothing has been attempted yet.
    #[default]
    Uninitialized,
    /// An authorization flow is in progress.
    Initializing,
    Authenticated,
    Unauthenticated,
}

impl SessionStatus {
    /// Whether initialization has reached a final outcome.
    pub fn is_resolved(&self) -> bool {
        matches!(
            self,
            SessionStatus::Authenticated | SessionStatus::Unauthenticated
        )
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SessionStatus::Uninitialized => "uninitialized",
            SessionStatus::Initializing => "initializing",
            SessionStatus::Authenticated => "authenticated",
            SessionStatus::Unauthenticated => "unauthenticated",
        };
        f.write_str(label)
    }
}

/// Point-in-time view of the session, shared with every subscriber.
///
/// Never carries the refresh token or id token themselves.
#[derive(Clone, Default, PartialEq, Serialize)]
pub struct SessionState {
    pub status: SessionStatus,
    #[serde(skip)]
    pub access_token: Option<String>,
    /// Access token expiry, seconds since the Unix epoch.
    pub expires_at: Option<i64>,
    pub subject: Option<String>,
    pub username: Option<String>,
    pub session_id: Option<String>,
    pub claims: Option<AccessClaims>,
    pub has_refresh_token: bool,
    pub has_id_token: bool,
    /// Location the caller asked to land on after sign-in.
    pub redirect_target: Option<String>,
    pub last_error: Option<SessionErrorInfo>,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    pub fn is_initialized(&self) -> bool {
        self.status.is_resolved()
    }

    /// Seconds of validity left on the access token at `now`.
    pub fn remaining_validity(&self, now: i64) -> Option<i64> {
        self.expires_at.map(|exp| exp - now)
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("status", &self.status)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .field("subject", &self.subject)
            .field("username", &self.username)
            .field("session_id", &self.session_id)
            .field("has_refresh_token", &self.has_refresh_token)
            .field("has_id_token", &self.has_id_token)
            .field("redirect_target", &self.redirect_target)
            .field("last_error", &self.last_error)
            .finish()
    }
}

/// Tokens held privately by the manager. The access token lives only in
/// [`SessionState`].
#[derive(Clone)]
pub(crate) struct Credentials {
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub expires_at: i64,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
