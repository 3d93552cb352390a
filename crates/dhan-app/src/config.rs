//! Application configuration.

use crate::error::{AppError, AppResult};
use dhan_catalog::CatalogConfig;
use dhan_client::{ClientConfig, RateLimitConfig, DEFAULT_API_BASE_URL};
use dhan_core::Credentials;
use dhan_deferred::DeferredConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Env var naming the config file.
pub const CONFIG_ENV: &str = "DHAN_CONFIG";
pub const CLIENT_ID_ENV: &str = "DHAN_CLIENT_ID";
pub const ACCESS_TOKEN_ENV: &str = "DHAN_ACCESS_TOKEN";
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Broker REST API root.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub deferred: DeferredConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            catalog: CatalogConfig::default(),
            rate_limit: RateLimitConfig::default(),
            client: ClientConfig::default(),
            deferred: DeferredConfig::default(),
            credentials: CredentialsConfig::default(),
        }
    }
}

/// Operator credentials. Usually supplied through the environment.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("client_id", &self.client_id)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl AppConfig {
    /// Load configuration.
    ///
    /// Path precedence: `explicit` > `DHAN_CONFIG` > `config/default.toml`.
    /// A missing file yields defaults. Credential env vars are applied last.
    pub fn load(explicit: Option<&str>) -> AppResult<Self> {
        let path = explicit
            .map(str::to_string)
            .or_else(|| std::env::var(CONFIG_ENV).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        let mut config = if Path::new(&path).exists() {
            Self::from_file(&path)?
        } else {
            tracing::warn!(path = %path, "Config file not found, using defaults");
            Self::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Override credentials from the environment.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup(CLIENT_ID_ENV).filter(|v| !v.trim().is_empty()) {
            self.credentials.client_id = Some(id);
        }
        if let Some(token) = lookup(ACCESS_TOKEN_ENV).filter(|v| !v.trim().is_empty()) {
            self.credentials.access_token = Some(token);
        }
    }

    /// Configured credentials, if both parts are present.
    pub fn credentials(&self) -> Option<Credentials> {
        let creds = Credentials::new(
            self.credentials.client_id.clone()?,
            self.credentials.access_token.clone()?,
        );
        creds.is_complete().then_some(creds)
    }

    /// Client settings with the top-level API root applied.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.api_base_url.clone(),
            ..self.client.clone()
        }
    }
}
