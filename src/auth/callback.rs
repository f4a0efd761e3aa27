//! Magic-link callback handler
//!
//! `GET /auth/callback?code=<str>&next=<path>`
//!
//! Exchanges the authorization code from the magic-link email for a
//! session, writes the session cookie onto the redirect response, and
//! sends the browser to `next`. Every failure is converted into a
//! redirect back to the sign-in page with the message in the query
//! string; nothing here surfaces as a generic error page.

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use tracing::{error, info};

use crate::AppState;
use crate::error::AppError;
use crate::metrics::CALLBACKS_TOTAL;
use crate::provider::{AuthEvent, session_cookie};

/// Query parameters on the callback URL.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code from the magic-link email
    pub code: Option<String>,
    /// Post-sign-in redirect target
    pub next: Option<String>,
}

/// GET /auth/callback
pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Response {
    let next = sanitize_next(query.next.as_deref());

    let Some(code) = query.code.filter(|code| !code.is_empty()) else {
        CALLBACKS_TOTAL.with_label_values(&["missing_code"]).inc();
        return error_redirect(&AppError::MissingCode);
    };

    match state.provider.exchange_code(&code).await {
        Ok(session) => {
            CALLBACKS_TOTAL.with_label_values(&["success"]).inc();
            info!(user = %session.user.id, "Code exchange succeeded");

            let jar = jar.add(session_cookie(
                &session,
                state.config.should_use_secure_cookies(),
            ));
            state.events.emit(AuthEvent::SignedIn(session));

            (jar, found(&next)).into_response()
        }
        Err(err) => {
            CALLBACKS_TOTAL.with_label_values(&[err.kind()]).inc();
            error!(error = %err, "Code exchange failed");
            error_redirect(&err)
        }
    }
}

/// 302 redirect; every callback outcome leaves through here.
pub(crate) fn found(location: &str) -> Response {
    Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, location)
        .body(Body::empty())
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Redirect to the sign-in page carrying a human-readable message.
///
/// Known input/configuration failures use stable indicator codes; the
/// provider's own error text is forwarded verbatim, percent-encoded.
pub(crate) fn error_redirect(error: &AppError) -> Response {
    let message = match error {
        AppError::MissingCode => "missing_code".to_string(),
        AppError::Config(_) => "configuration_error".to_string(),
        other => other.to_string(),
    };
    found(&format!("/auth?error={}", urlencoding::encode(&message)))
}

/// Clamp `next` to a same-site absolute path.
///
/// Absolute URLs, protocol-relative values, anything not starting with
/// `/`, and anything outside visible ASCII fall back to the home page;
/// whitespace or control bytes would poison the `Location` header.
fn sanitize_next(next: Option<&str>) -> String {
    match next {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && path.bytes().all(|b| (0x21..=0x7e).contains(&b)) =>
        {
            path.to_string()
        }
        _ => "/".to_string(),
    }
}
