//! E2E tests for the sign-in page, magic-link requests, and logout

mod common;

use common::{TestServer, no_redirect_client, session_cookie_header};

fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .expect("location header")
        .to_string()
}

#[tokio::test]
async fn test_auth_redirects_to_signin_preserving_query() {
    let server = TestServer::new().await;
    let client = no_redirect_client();

    let response = client
        .get(server.url("/auth?error=boom"))
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 302);
    assert_eq!(location(&response), "/auth/signin?error=boom");
}

#[tokio::test]
async fn test_signin_page_renders() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/auth/signin"))
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 200);
    let body = response.text().await.expect("response body");
    assert!(body.contains("Send magic link"));
}

#[tokio::test]
async fn test_signin_page_escapes_error_markup() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/auth/signin?error=%3Cb%3Enope%3C%2Fb%3E"))
        .send()
        .await
        .expect("request succeeds");

    let body = response.text().await.expect("response body");
    assert!(body.contains("&lt;b&gt;nope&lt;/b&gt;"));
    assert!(!body.contains("<b>nope</b>"));
}

#[tokio::test]
async fn test_magic_link_request_uses_configured_callback_url() {
    let server = TestServer::new().await;
    let client = no_redirect_client();

    let response = client
        .post(server.url("/auth/signin"))
        .form(&[("email", "user@example.com")])
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 302);
    assert_eq!(location(&response), "/auth/signin?sent=1");

    let behavior = server.provider.behavior.lock().unwrap();
    let request = behavior
        .last_magic_link
        .as_ref()
        .expect("magic link recorded");
    assert_eq!(request.email, "user@example.com");
    assert_eq!(
        request.redirect_to,
        "https://app.test.example.com/auth/callback"
    );
}

#[tokio::test]
async fn test_malformed_email_is_rejected_before_the_provider() {
    let server = TestServer::new().await;
    let client = no_redirect_client();

    let response = client
        .post(server.url("/auth/signin"))
        .form(&[("email", "not-an-email")])
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 302);
    assert_eq!(location(&response), "/auth/signin?error=invalid_email");
    assert!(
        server
            .provider
            .behavior
            .lock()
            .unwrap()
            .last_magic_link
            .is_none()
    );
}

#[tokio::test]
async fn test_provider_rejection_surfaces_on_signin_redirect() {
    let server = TestServer::new().await;
    server.provider.set_otp_error("rate limit exceeded");
    let client = no_redirect_client();

    let response = client
        .post(server.url("/auth/signin"))
        .form(&[("email", "user@example.com")])
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 302);
    assert_eq!(
        location(&response),
        "/auth/signin?error=rate%20limit%20exceeded"
    );
}

#[tokio::test]
async fn test_logout_revokes_session_and_clears_cookie() {
    let server = TestServer::new().await;
    let client = no_redirect_client();

    let response = client
        .post(server.url("/logout"))
        .header("Cookie", session_cookie_header("stub-access"))
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 302);
    assert_eq!(location(&response), "/auth");

    let set_cookie = response
        .headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .expect("set-cookie header");
    assert!(set_cookie.starts_with("ml-session="));
    assert!(set_cookie.contains("Max-Age=0"));

    assert_eq!(server.provider.behavior.lock().unwrap().sign_outs, 1);
}

#[tokio::test]
async fn test_logout_without_session_still_lands_on_signin() {
    let server = TestServer::new().await;
    let client = no_redirect_client();

    let response = client
        .post(server.url("/logout"))
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 302);
    assert_eq!(location(&response), "/auth");
    assert_eq!(server.provider.behavior.lock().unwrap().sign_outs, 0);
}
