//! Session cookie plumbing
//!
//! The session bundle travels in a single provider-defined cookie. The
//! application treats the payload as opaque: it writes exactly what the
//! provider returned (base64-wrapped JSON) and copies it between
//! request and response. Expiry rides inside the payload, so the cookie
//! itself is session-scoped.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{Engine as _, engine::general_purpose};

use super::Session;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "ml-session";

/// Build the session cookie for a provider-issued bundle.
pub fn session_cookie(session: &Session, secure: bool) -> Cookie<'static> {
    let payload = serde_json::to_string(session).unwrap_or_default();
    let value = general_purpose::URL_SAFE_NO_PAD.encode(payload.as_bytes());

    let mut cookie = Cookie::new(SESSION_COOKIE, value);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_secure(secure);
    cookie
}

/// A removal cookie that clears the session on the client.
pub fn clear_session_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, "");
    cookie.set_path("/");
    cookie.make_removal();
    cookie
}

/// Decode the session bundle from a request's cookie jar.
///
/// Any malformed payload reads as "no session"; the provider is the
/// only party that can mint a valid one.
pub fn read_session(jar: &CookieJar) -> Option<Session> {
    let cookie = jar.get(SESSION_COOKIE)?;
    let bytes = general_purpose::URL_SAFE_NO_PAD.decode(cookie.value()).ok()?;
    serde_json::from_slice(&bytes).ok()
}
