//! Sign-in page and magic-link requests
//!
//! The provider does the actual authentication; these handlers only
//! render the page, forward magic-link requests, and expose the current
//! cookie session as JSON.

use axum::extract::{Query, RawQuery, State};
use axum::response::{Html, IntoResponse, Response};
use axum::{Form, Json};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::callback::found;
use crate::AppState;
use crate::metrics::MAGIC_LINKS_SENT_TOTAL;
use crate::provider::{AuthEvent, clear_session_cookie, read_session};

/// GET /auth
///
/// Kept for backward compatibility; forwards to the sign-in page with
/// the query string (error indicators included) intact.
pub async fn auth_redirect(RawQuery(query): RawQuery) -> Response {
    match query {
        Some(query) if !query.is_empty() => found(&format!("/auth/signin?{query}")),
        _ => found("/auth/signin"),
    }
}

/// Query parameters rendered on the sign-in page.
#[derive(Debug, Deserialize)]
pub struct SignInPageQuery {
    /// Error message from a failed callback or magic-link request
    pub error: Option<String>,
    /// Set after a magic link was sent
    pub sent: Option<String>,
}

/// GET /auth/signin
///
/// Renders a minimal sign-in page with an email form. Error and
/// confirmation banners come from the query string.
pub async fn signin_page(Query(query): Query<SignInPageQuery>) -> impl IntoResponse {
    let banner = if query.sent.is_some() {
        "<p class=\"notice\">Magic link sent! Check your email.</p>".to_string()
    } else if let Some(error) = query.error.as_deref() {
        format!(
            "<p class=\"error\">{}</p>",
            html_escape::encode_text(error)
        )
    } else {
        String::new()
    };

    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Sign in - Maglink</title></head>
<body>
    <h1>Maglink</h1>
    <p>Enter your email and we will send you a one-time sign-in link.</p>
    {banner}
    <form method="post" action="/auth/signin">
        <input type="email" name="email" placeholder="you@example.com" autofocus>
        <button type="submit">Send magic link</button>
    </form>
</body>
</html>
"#
    ))
}

/// Form body for a magic-link request.
#[derive(Debug, Deserialize)]
pub struct SignInForm {
    pub email: String,
}

/// POST /auth/signin
///
/// Asks the provider to email a magic link pointing back at our
/// callback URL. One attempt; failures land back on the sign-in page.
pub async fn request_magic_link(
    State(state): State<AppState>,
    Form(form): Form<SignInForm>,
) -> Response {
    let email = form.email.trim();
    if !valid_email(email) {
        return found("/auth/signin?error=invalid_email");
    }

    let redirect_to = state.config.callback_url();
    match state.provider.send_magic_link(email, &redirect_to).await {
        Ok(()) => {
            MAGIC_LINKS_SENT_TOTAL.inc();
            info!("Magic link requested");
            found("/auth/signin?sent=1")
        }
        Err(error) => {
            warn!(%error, "Magic link request failed");
            found(&format!(
                "/auth/signin?error={}",
                urlencoding::encode(&error.to_string())
            ))
        }
    }
}

/// POST /logout
///
/// Best-effort revocation at the provider, then clear the session
/// cookie and land on the sign-in page. A provider failure is logged
/// but never blocks the local sign-out.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(session) = read_session(&jar) {
        if let Err(error) = state.provider.sign_out(&session.access_token).await {
            warn!(%error, "Provider sign out failed");
        }
    }

    crate::metrics::SIGN_OUTS_TOTAL.inc();
    state.events.emit(AuthEvent::SignedOut);

    let jar = jar.add(clear_session_cookie());
    (jar, found("/auth")).into_response()
}

/// GET /auth/me
///
/// The current cookie session's user, or `null` when anonymous. Used
/// by UI chrome (avatar, menus) to probe auth state.
pub async fn me(State(state): State<AppState>, jar: CookieJar) -> Response {
    let user = match read_session(&jar) {
        Some(session) => state
            .provider
            .get_user(&session.access_token)
            .await
            .unwrap_or_else(|error| {
                warn!(%error, "User lookup failed");
                None
            }),
        None => None,
    };

    Json(json!({ "user": user })).into_response()
}

/// Minimal shape check; the provider does real address validation.
fn valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}
