//! Error types for the session subsystem.

use serde::{Deserialize, Serialize};

/// Result type alias for protocol-level operations.
pub type Result<T> = std::result::Result<T, OidcError>;

/// Errors raised while talking to the identity provider.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OidcError {
    /// Network/HTTP error.
    #[error("Network error: {0}")]
    Network(String),

    /// Identity provider returned an error.
    #[error("Provider error: {0}")]
    Backend(String),

    /// Invalid request or callback.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<reqwest::Error> for OidcError {
    fn from(e: reqwest::Error) -> Self {
        OidcError::Network(e.to_string())
    }
}

/// Failures surfaced by [`SessionManager`](crate::SessionManager) operations.
///
/// `Clone` because a single in-flight exchange hands the same outcome to
/// every caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The authorization flow could not establish a session.
    #[error("initialization failed: {0}")]
    Initialization(String),

    /// The refresh-token exchange failed; the session is gone.
    #[error("token refresh failed: {0}")]
    Refresh(String),

    /// An operation required an authenticated session.
    #[error("no authenticated session")]
    NotAuthenticated,

    /// Logout or shutdown ended the session while the operation was in
    /// flight. The caller must not start a new sign-in in response.
    #[error("session ended while the operation was in flight")]
    Cancelled,
}

impl SessionError {
    /// The taxonomy bucket this error belongs to.
    pub fn kind(&self) -> SessionErrorKind {
        match self {
            SessionError::Initialization(_) => SessionErrorKind::Initialization,
            SessionError::Refresh(_) => SessionErrorKind::Refresh,
            SessionError::NotAuthenticated | SessionError::Cancelled => {
                SessionErrorKind::NotAuthenticated
            }
        }
    }
}

/// Error category recorded in [`SessionState::last_error`](crate::SessionState).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionErrorKind {
    Initialization,
    Refresh,
    NotAuthenticated,
}

/// Error descriptor carried by the session snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionErrorInfo {
    pub kind: SessionErrorKind,
    pub message: String,
}

impl From<&SessionError> for SessionErrorInfo {
    fn from(err: &SessionError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
