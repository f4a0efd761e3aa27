//! Hosted identity provider client
//!
//! The provider owns credential issuance, token signing, and session
//! storage. This module defines the fixed surface the rest of the
//! application talks to (the `Provider` trait), the opaque data the
//! provider hands back, and the auth events its client emits.
//!
//! Handlers depend on `Arc<dyn Provider>` so tests can inject a mock.

mod cookies;
mod http;

pub use cookies::{SESSION_COOKIE, clear_session_cookie, read_session, session_cookie};
pub use http::HttpProvider;

use axum::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Identity record attached to a session.
///
/// Read-only from the application's perspective; the provider is the
/// source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

/// Provider-issued credential bundle.
///
/// Opaque to the application: it is stored in a cookie and forwarded
/// back to the provider, never inspected beyond `expires_at` bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime in seconds, as reported by the provider
    #[serde(default)]
    pub expires_in: i64,
    /// Unix timestamp; filled in from `expires_in` when absent
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    /// Whether the access token's reported lifetime has elapsed.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => at <= chrono::Utc::now().timestamp(),
            None => false,
        }
    }
}

/// Discrete notification emitted when session/user state changes.
///
/// The auth-state context mirrors these into UI-visible state and does
/// nothing else with them.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut,
    TokenRefreshed(Session),
    UserUpdated(User),
    InitialSession(Option<Session>),
}

/// Fixed client surface of the hosted identity provider.
///
/// Every operation is attempted exactly once; retry semantics, token
/// validation, and cookie encryption all live on the provider side.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Provider: Send + Sync {
    /// Exchange a magic-link authorization code for a session.
    async fn exchange_code(&self, code: &str) -> Result<Session, AppError>;

    /// Fetch the user behind an access token.
    ///
    /// Returns `Ok(None)` when the token is missing, expired, or
    /// rejected; errors are reserved for transport and provider faults.
    async fn get_user(&self, access_token: &str) -> Result<Option<User>, AppError>;

    /// Trade a refresh token for a fresh session bundle.
    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AppError>;

    /// Revoke the session behind an access token.
    async fn sign_out(&self, access_token: &str) -> Result<(), AppError>;

    /// Ask the provider to email a one-time sign-in link.
    ///
    /// `redirect_to` is the callback URL embedded in the email.
    async fn send_magic_link(&self, email: &str, redirect_to: &str) -> Result<(), AppError>;
}
