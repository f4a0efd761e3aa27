//! Maglink - magic-link sign-in and session plumbing
//!
//! Glue between a web application and a hosted identity provider. The
//! provider owns credential issuance, token signing, and session
//! storage; this crate wires its client surface into a web server:
//!
//! - `auth::callback`: exchanges the magic-link authorization code for
//!   a session and sets the session cookie
//! - `auth::middleware`: refreshes the cookie session once per request
//! - `auth::context`: mirrors the auth-event stream into UI-visible
//!   `{user, session, loading}` state
//!
//! # Modules
//!
//! - `auth`: callback, sign-in page, middleware, events, context
//! - `provider`: provider client trait, HTTP implementation, cookies
//! - `config`: configuration management
//! - `error`: error types
//! - `metrics`: Prometheus instruments

pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod provider;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// Cloned per request; requests hold no other shared mutable state.
/// The provider's own session store is the only stateful collaborator.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Hosted identity provider client
    pub provider: Arc<dyn provider::Provider>,

    /// Auth event fan-out (sign-in, refresh, sign-out)
    pub events: auth::EventHub,
}

impl AppState {
    /// Initialize application state with the HTTP provider client.
    ///
    /// # Errors
    /// Returns error if the provider client cannot be built from the
    /// configuration.
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        let provider = provider::HttpProvider::new(&config.provider)?;
        tracing::info!(provider_url = %config.provider.url, "Provider client initialized");

        Ok(Self::with_provider(config, Arc::new(provider)))
    }

    /// Assemble state around an injected provider implementation.
    pub fn with_provider(
        config: config::AppConfig,
        provider: Arc<dyn provider::Provider>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            provider,
            events: auth::EventHub::new(),
        }
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::trace::TraceLayer;

    let cors_layer = build_cors_layer(&state.config.server);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(auth::auth_router())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::refresh_session,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
        .merge(metrics::metrics_router())
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::HeaderValue;
    use tower_http::cors::{Any, CorsLayer};

    if !server.protocol.eq_ignore_ascii_case("https") {
        return CorsLayer::permissive();
    }

    let allowed_origin = server.base_url();
    match HeaderValue::from_str(&allowed_origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin([origin])
            .allow_methods(Any)
            .allow_headers(Any),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %allowed_origin,
                "Failed to parse CORS origin from server base URL; denying cross-origin requests"
            );
            CorsLayer::new().allow_methods(Any).allow_headers(Any)
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
