//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    #[serde(default)]
    pub app: AppUrlConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Public domain (e.g., "app.example.com")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl ServerConfig {
    /// Get the base URL for the application
    ///
    /// # Returns
    /// Full URL like "https://app.example.com"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

/// Hosted identity provider configuration
///
/// The provider owns credential issuance, token signing, and session
/// storage; these values only tell us where it lives and which public
/// key to present.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Provider base URL (e.g., "https://abc.provider.example")
    pub url: String,
    /// Provider publishable (public) API key
    pub publishable_key: String,
    /// Request timeout in seconds for provider calls
    #[serde(default = "default_provider_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn default_provider_timeout_seconds() -> u64 {
    10
}

/// Application URL configuration
///
/// `base_url` overrides the server base URL when constructing the
/// callback URL embedded in outbound magic-link emails. Needed when the
/// app runs behind a proxy under a different public origin.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppUrlConfig {
    pub base_url: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (MAGLINK_*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.protocol", "http")?
            .set_default("provider.timeout_seconds", 10)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (MAGLINK_*)
            .add_source(
                Environment::with_prefix("MAGLINK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// The callback URL sent to the provider in magic-link emails.
    ///
    /// Prefers `app.base_url`, falls back to the server base URL so
    /// links always point at the correct origin.
    pub fn callback_url(&self) -> String {
        let base = self
            .app
            .base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| self.server.base_url());
        format!("{base}/auth/callback")
    }

    pub fn should_use_secure_cookies(&self) -> bool {
        self.server.protocol.eq_ignore_ascii_case("https")
            || !is_local_server_domain(&self.server.domain)
    }

    pub fn validate(&self) -> Result<(), crate::error::AppError> {
        if self.provider.publishable_key.trim().is_empty() {
            return Err(crate::error::AppError::Config(
                "provider.publishable_key must not be empty".to_string(),
            ));
        }

        let provider_url = url::Url::parse(&self.provider.url).map_err(|e| {
            crate::error::AppError::Config(format!("provider.url is not a valid URL: {e}"))
        })?;
        if provider_url.host_str().is_none() {
            return Err(crate::error::AppError::Config(
                "provider.url must carry a host".to_string(),
            ));
        }

        if let Some(base_url) = &self.app.base_url {
            url::Url::parse(base_url).map_err(|e| {
                crate::error::AppError::Config(format!("app.base_url is not a valid URL: {e}"))
            })?;
        }

        if !self.should_use_secure_cookies() {
            let host = normalized_server_host(&self.server.domain);
            tracing::warn!(
                host = %host,
                protocol = %self.server.protocol,
                "Using insecure session cookies for local development"
            );
        } else if !self.server.protocol.eq_ignore_ascii_case("https") {
            return Err(crate::error::AppError::Config(
                "server.protocol must be https for non-local server domains".to_string(),
            ));
        }

        Ok(())
    }
}

fn normalized_server_host(domain: &str) -> String {
    let trimmed = domain.trim();
    let parsed_host = url::Url::parse(&format!("http://{trimmed}"))
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()));
    let host = parsed_host.unwrap_or_else(|| trimmed.to_string());
    host.trim_end_matches('.').to_ascii_lowercase()
}

fn is_local_server_domain(domain: &str) -> bool {
    let host = normalized_server_host(domain);
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}
