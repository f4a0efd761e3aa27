//! HTTP implementation of the provider surface
//!
//! Talks to a GoTrue-style REST API under `{base}/auth/v1/`. The
//! publishable key rides along as the `apikey` header on every call.

use axum::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::json;
use tracing::{debug, instrument};

use super::{Provider, Session, User};
use crate::config::ProviderConfig;
use crate::error::AppError;

/// Reqwest-backed provider client.
pub struct HttpProvider {
    client: Client,
    base_url: String,
    publishable_key: String,
}

impl HttpProvider {
    /// Build a client from validated provider configuration.
    ///
    /// # Errors
    /// Returns `AppError::Config` if the underlying HTTP client cannot
    /// be constructed.
    pub fn new(config: &ProviderConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(concat!("Maglink/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Config(format!("failed to build provider client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            publishable_key: config.publishable_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1{path}", self.base_url)
    }

    /// Pull the provider's own error text out of a failed response.
    ///
    /// GoTrue bodies carry one of `error_description`, `msg`, or
    /// `error`; fall back to the HTTP status when none parse.
    async fn rejection(response: Response) -> AppError {
        let status = response.status();
        let message = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|body| {
                ["error_description", "msg", "error"]
                    .iter()
                    .find_map(|key| body.get(*key).and_then(|v| v.as_str()).map(str::to_string))
            })
            .unwrap_or_else(|| format!("provider returned {status}"));

        AppError::Provider(message)
    }

    /// Stamp a session with an absolute expiry when the provider only
    /// reported a relative lifetime.
    fn with_expiry(mut session: Session) -> Session {
        if session.expires_at.is_none() && session.expires_in > 0 {
            session.expires_at = Some(chrono::Utc::now().timestamp() + session.expires_in);
        }
        session
    }
}

#[async_trait]
impl Provider for HttpProvider {
    #[instrument(skip(self, code))]
    async fn exchange_code(&self, code: &str) -> Result<Session, AppError> {
        let response = self
            .client
            .post(self.endpoint("/token"))
            .query(&[("grant_type", "authorization_code")])
            .header("apikey", &self.publishable_key)
            .json(&json!({ "code": code }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let session: Session = response.json().await?;
        debug!(user = %session.user.id, "Exchanged authorization code for session");
        Ok(Self::with_expiry(session))
    }

    #[instrument(skip_all)]
    async fn get_user(&self, access_token: &str) -> Result<Option<User>, AppError> {
        let response = self
            .client
            .get(self.endpoint("/user"))
            .header("apikey", &self.publishable_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(Some(response.json().await?)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Ok(None),
            _ => Err(Self::rejection(response).await),
        }
    }

    #[instrument(skip_all)]
    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AppError> {
        let response = self
            .client
            .post(self.endpoint("/token"))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.publishable_key)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        Ok(Self::with_expiry(response.json().await?))
    }

    #[instrument(skip_all)]
    async fn sign_out(&self, access_token: &str) -> Result<(), AppError> {
        let response = self
            .client
            .post(self.endpoint("/logout"))
            .header("apikey", &self.publishable_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        // A token the provider no longer recognizes is already signed out.
        if response.status().is_success() || response.status() == StatusCode::UNAUTHORIZED {
            return Ok(());
        }

        Err(Self::rejection(response).await)
    }

    #[instrument(skip(self, email))]
    async fn send_magic_link(&self, email: &str, redirect_to: &str) -> Result<(), AppError> {
        let response = self
            .client
            .post(self.endpoint("/otp"))
            .header("apikey", &self.publishable_key)
            .json(&json!({
                "email": email,
                "create_user": true,
                "redirect_to": redirect_to,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        debug!("Magic link requested");
        Ok(())
    }
}
