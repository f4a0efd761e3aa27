//! Sign-in UI and session plumbing
//!
//! Handles:
//! - Magic-link callback (code-for-session exchange)
//! - Session refresh middleware
//! - Client-side auth-state context
//! - Sign-in page and magic-link requests

pub mod callback;
pub mod context;
pub mod events;
pub mod middleware;
pub mod signin;

pub use context::{AuthContext, AuthSnapshot, AuthState};
pub use events::{EventHub, EventSubscription};
pub use middleware::refresh_session;

use axum::Router;
use axum::routing::{get, post};

use crate::AppState;

/// Create authentication router
///
/// Routes:
/// - GET  /auth - Redirect to sign-in page (compat)
/// - GET  /auth/signin - Sign-in page
/// - POST /auth/signin - Request a magic link
/// - GET  /auth/callback - Magic-link callback
/// - GET  /auth/me - Current user as JSON
/// - POST /logout - Sign out
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/auth", get(signin::auth_redirect))
        .route(
            "/auth/signin",
            get(signin::signin_page).post(signin::request_magic_link),
        )
        .route("/auth/callback", get(callback::callback))
        .route("/auth/me", get(signin::me))
        .route("/logout", post(signin::logout))
}
