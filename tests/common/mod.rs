//! Common test utilities for E2E tests

use std::sync::{Arc, Mutex};

use axum::Json;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use base64::{Engine as _, engine::general_purpose};
use maglink::provider::{SESSION_COOKIE, Session, User};
use maglink::{AppState, config};
use serde_json::json;
use std::collections::HashMap;
use tokio::net::TcpListener;

/// Recorded magic-link request
#[derive(Debug, Clone)]
pub struct MagicLinkRequest {
    pub email: String,
    pub redirect_to: String,
}

/// Scripted behavior and call log for the stub provider
#[derive(Debug, Default)]
pub struct StubBehavior {
    /// Error text returned from code exchange (None = accept)
    pub exchange_error: Option<String>,
    /// Error text returned from magic-link requests (None = accept)
    pub otp_error: Option<String>,
    /// Error text returned from session refresh (None = accept)
    pub refresh_error: Option<String>,
    /// Last magic-link request seen
    pub last_magic_link: Option<MagicLinkRequest>,
    /// Access tokens presented to the user endpoint, in order
    pub user_lookups: Vec<String>,
    /// Number of refresh grants served
    pub refreshes: usize,
    /// Number of logout calls served
    pub sign_outs: usize,
}

/// In-process HTTP stand-in for the hosted identity provider
pub struct StubProvider {
    pub url: String,
    pub behavior: Arc<Mutex<StubBehavior>>,
}

type StubState = Arc<Mutex<StubBehavior>>;

impl StubProvider {
    pub async fn spawn() -> Self {
        let behavior: StubState = Arc::new(Mutex::new(StubBehavior::default()));

        let app = axum::Router::new()
            .route("/auth/v1/token", post(stub_token))
            .route("/auth/v1/user", get(stub_user))
            .route("/auth/v1/logout", post(stub_logout))
            .route("/auth/v1/otp", post(stub_otp))
            .with_state(behavior.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}"),
            behavior,
        }
    }

    pub fn set_exchange_error(&self, message: &str) {
        self.behavior.lock().unwrap().exchange_error = Some(message.to_string());
    }

    pub fn set_otp_error(&self, message: &str) {
        self.behavior.lock().unwrap().otp_error = Some(message.to_string());
    }

    pub fn set_refresh_error(&self, message: &str) {
        self.behavior.lock().unwrap().refresh_error = Some(message.to_string());
    }
}

fn stub_session(access_token: &str) -> serde_json::Value {
    json!({
        "access_token": access_token,
        "refresh_token": "stub-refresh",
        "token_type": "bearer",
        "expires_in": 3600,
        "user": {
            "id": "user-1",
            "email": "user@example.com",
        },
    })
}

async fn stub_token(
    State(behavior): State<StubState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let grant_type = params.get("grant_type").cloned().unwrap_or_default();
    let mut behavior = behavior.lock().unwrap();

    match grant_type.as_str() {
        "authorization_code" => {
            if let Some(message) = &behavior.exchange_error {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error_description": message })),
                )
                    .into_response();
            }
            Json(stub_session("stub-access")).into_response()
        }
        "refresh_token" => {
            if let Some(message) = &behavior.refresh_error {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error_description": message })),
                )
                    .into_response();
            }
            behavior.refreshes += 1;
            Json(stub_session("stub-access-rotated")).into_response()
        }
        other => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error_description": format!("unsupported grant type {other}") })),
        )
            .into_response(),
    }
}

async fn stub_user(State(behavior): State<StubState>, headers: HeaderMap) -> Response {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default();
    behavior.lock().unwrap().user_lookups.push(token.to_string());

    if token.starts_with("stub-access") {
        Json(json!({
            "id": "user-1",
            "email": "user@example.com",
        }))
        .into_response()
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({ "msg": "invalid token" }))).into_response()
    }
}

async fn stub_logout(State(behavior): State<StubState>) -> StatusCode {
    behavior.lock().unwrap().sign_outs += 1;
    StatusCode::NO_CONTENT
}

async fn stub_otp(
    State(behavior): State<StubState>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let mut behavior = behavior.lock().unwrap();
    if let Some(message) = &behavior.otp_error {
        return (StatusCode::BAD_REQUEST, Json(json!({ "msg": message }))).into_response();
    }

    behavior.last_magic_link = Some(MagicLinkRequest {
        email: body["email"].as_str().unwrap_or_default().to_string(),
        redirect_to: body["redirect_to"].as_str().unwrap_or_default().to_string(),
    });
    Json(json!({})).into_response()
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub provider: StubProvider,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server backed by a stub provider
    pub async fn new() -> Self {
        let provider = StubProvider::spawn().await;

        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                domain: "localhost".to_string(),
                protocol: "http".to_string(),
            },
            provider: config::ProviderConfig {
                url: provider.url.clone(),
                publishable_key: "test-publishable-key".to_string(),
                timeout_seconds: 5,
            },
            app: config::AppUrlConfig {
                base_url: Some("https://app.test.example.com".to_string()),
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };
        config.validate().unwrap();

        let state = AppState::new(config).unwrap();

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = maglink::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            provider,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }
}

/// Client that surfaces redirects instead of following them
pub fn no_redirect_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .expect("failed to build no-redirect client")
}

/// Cookie header value carrying a session minted for tests
pub fn session_cookie_header(access_token: &str) -> String {
    cookie_header_with_expiry(access_token, chrono::Utc::now().timestamp() + 3600)
}

/// Cookie header value for a session whose access token has aged out
pub fn expired_session_cookie_header(access_token: &str) -> String {
    cookie_header_with_expiry(access_token, chrono::Utc::now().timestamp() - 60)
}

fn cookie_header_with_expiry(access_token: &str, expires_at: i64) -> String {
    let session = Session {
        access_token: access_token.to_string(),
        refresh_token: "stub-refresh".to_string(),
        token_type: "bearer".to_string(),
        expires_in: 3600,
        expires_at: Some(expires_at),
        user: User {
            id: "user-1".to_string(),
            email: Some("user@example.com".to_string()),
            user_metadata: serde_json::Value::Null,
        },
    };
    let payload = serde_json::to_string(&session).unwrap();
    format!(
        "{SESSION_COOKIE}={}",
        general_purpose::URL_SAFE_NO_PAD.encode(payload.as_bytes())
    )
}

/// Decode a session bundle out of a Set-Cookie header value
pub fn decode_set_cookie(set_cookie: &str) -> Option<Session> {
    let value = set_cookie
        .strip_prefix(&format!("{SESSION_COOKIE}="))?
        .split(';')
        .next()?;
    let bytes = general_purpose::URL_SAFE_NO_PAD.decode(value).ok()?;
    serde_json::from_slice(&bytes).ok()
}
