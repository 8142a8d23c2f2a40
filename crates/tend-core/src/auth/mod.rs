//! Auth provider contract and persisted session state.

mod fixed;
mod vault;

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

pub use fixed::FixedAuthProvider;
pub use vault::SessionVault;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Result of an interactive sign-in.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthGrant {
    pub user: AuthUser,
    /// Access token for the calendar bridge, when the provider granted one
    pub access_token: Option<String>,
}

impl fmt::Debug for AuthGrant {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthGrant")
            .field("user", &self.user)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// The signed-in identity plus its optional calendar token.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub user: AuthUser,
    pub calendar_token: Option<String>,
}

impl From<AuthGrant> for Session {
    fn from(grant: AuthGrant) -> Self {
        Self {
            user: grant.user,
            calendar_token: grant.access_token,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Session")
            .field("user", &self.user)
            .field(
                "calendar_token",
                &self.calendar_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Auth provider error: {0}")]
    Provider(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Third-party identity provider.
pub trait AuthProvider: Send + Sync + 'static {
    /// Interactive sign-in; failures must reach the user.
    fn sign_in(&self) -> impl Future<Output = AuthResult<AuthGrant>> + Send;

    fn sign_out(&self) -> impl Future<Output = AuthResult<()>> + Send;

    /// Current identity, updated whenever the provider's auth state changes.
    fn auth_state(&self) -> watch::Receiver<Option<AuthUser>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_debug_redacts_token() {
        let grant = AuthGrant {
            user: AuthUser {
                id: "user".to_string(),
                email: None,
            },
            access_token: Some("secret-calendar-token".to_string()),
        };
        let rendered = format!("{grant:?}");
        assert!(!rendered.contains("secret-calendar-token"));
        assert!(rendered.contains("[REDACTED]"));

        let session = Session::from(grant);
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("secret-calendar-token"));
    }
}
