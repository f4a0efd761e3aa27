//! Session refresh middleware
//!
//! Runs once per inbound request, before page handlers. Binds a view of
//! the request's cookie jar, asks the provider who the session belongs
//! to, and refreshes the session so downstream rendering never sees a
//! stale one. The rotated bundle is written both onto the response and
//! into the request's `Cookie` header; the provider rotates refresh
//! tokens and dropping its cookie writes would wedge the rotation.

use axum::extract::{Request, State};
use axum::http::{HeaderValue, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;
use tracing::{debug, warn};

use crate::AppState;
use crate::metrics::SESSION_REFRESHES_TOTAL;
use crate::provider::{
    AuthEvent, SESSION_COOKIE, clear_session_cookie, read_session, session_cookie,
};

/// Refresh the cookie session on every request.
///
/// - no session cookie, or the provider rejects a still-live access
///   token: the request passes through unchanged.
/// - recognized or expired session: the refresh token is traded for a
///   fresh bundle, written onto the response and into the request so
///   downstream handlers see the rotated tokens.
/// - failed refresh: the cookie is cleared rather than letting a stale
///   session linger.
pub async fn refresh_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    // Routes that rewrite the session cookie themselves are exempt;
    // refreshing here would race their own cookie writes.
    let path = request.uri().path();
    if path == "/auth/callback" || path == "/logout" {
        return next.run(request).await;
    }

    let Some(session) = read_session(&jar) else {
        return (jar, next.run(request).await).into_response();
    };

    // An expired access token cannot identify anyone; skip the lookup
    // and go straight to the refresh grant.
    if !session.is_expired() {
        let user = match state.provider.get_user(&session.access_token).await {
            Ok(user) => user,
            Err(error) => {
                warn!(%error, "User lookup failed during session refresh");
                None
            }
        };

        if user.is_none() {
            debug!("No authenticated user behind session cookie");
            return (jar, next.run(request).await).into_response();
        }
    }

    let jar = match state.provider.refresh_session(&session.refresh_token).await {
        Ok(refreshed) => {
            SESSION_REFRESHES_TOTAL.with_label_values(&["success"]).inc();
            let cookie = session_cookie(&refreshed, state.config.should_use_secure_cookies());
            rewrite_request_cookie(&mut request, Some(cookie.value()));
            let jar = jar.add(cookie);
            state.events.emit(AuthEvent::TokenRefreshed(refreshed));
            jar
        }
        Err(error) => {
            SESSION_REFRESHES_TOTAL.with_label_values(&["failure"]).inc();
            warn!(%error, "Session refresh failed; clearing cookie");
            rewrite_request_cookie(&mut request, None);
            jar.add(clear_session_cookie())
        }
    };

    (jar, next.run(request).await).into_response()
}

/// Replace the session entry in the request's `Cookie` header.
///
/// `None` drops the entry. Other cookies on the header are preserved.
fn rewrite_request_cookie(request: &mut Request, session_value: Option<&str>) {
    let prefix = format!("{SESSION_COOKIE}=");
    let mut parts: Vec<String> = request
        .headers()
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty() && !part.starts_with(&prefix))
        .map(str::to_string)
        .collect();

    if let Some(value) = session_value {
        parts.push(format!("{prefix}{value}"));
    }

    if parts.is_empty() {
        request.headers_mut().remove(header::COOKIE);
    } else if let Ok(value) = HeaderValue::from_str(&parts.join("; ")) {
        request.headers_mut().insert(header::COOKIE, value);
    }
}
