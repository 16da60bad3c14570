//! Configuration management

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{
    DEFAULT_ACCOUNT_KEY, DEFAULT_ATTEMPT_BUDGET, DEFAULT_PASSWORD_KEY,
    DEFAULT_RETRIEVE_TOKEN_KEY, DEFAULT_SERVICE_NAME, DEFAULT_TIMEOUT_SECS,
};
use crate::errors::ConfigError;
use crate::types::{AuthContext, AuthDescriptors, Credentials, EndpointDescriptor};

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub auth: AuthConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub identity_server_base_url: String,
    pub api_server_base_url: String,
    #[serde(default = "default_account_key")]
    pub account_key: String,
    #[serde(default = "default_password_key")]
    pub password_key: String,
    #[serde(default = "default_retrieve_token_key")]
    pub retrieve_token_key: String,
    #[serde(default)]
    pub use_reduced_security_mode: bool,
    /// Account used to look up stored credentials at start-up
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub login: Option<EndpointDescriptor>,
    #[serde(default)]
    pub logout: Option<EndpointDescriptor>,
    #[serde(default)]
    pub refresh: Option<EndpointDescriptor>,
    #[serde(default = "default_true")]
    pub refresh_supported: bool,
    #[serde(default = "default_attempt_budget")]
    pub attempt_budget: u32,
}

/// HTTP transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Directory receiving downloaded artifacts (system temp dir if unset)
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
}

/// Credential storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl AuthConfig {
    /// Minimal configuration: two server URLs, everything else defaulted.
    pub fn new(identity_server: impl Into<String>, api_server: impl Into<String>) -> Self {
        Self {
            identity_server_base_url: identity_server.into(),
            api_server_base_url: api_server.into(),
            account_key: default_account_key(),
            password_key: default_password_key(),
            retrieve_token_key: default_retrieve_token_key(),
            use_reduced_security_mode: false,
            account: None,
            login: None,
            logout: None,
            refresh: None,
            refresh_supported: true,
            attempt_budget: DEFAULT_ATTEMPT_BUDGET,
        }
    }

    /// Resolve URLs and descriptors into an [`AuthContext`].
    ///
    /// Descriptors that are not given explicitly fall back to the
    /// conventional identity-server layout.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` if a URL cannot be parsed or cannot
    /// carry a path.
    pub fn to_context(&self) -> Result<AuthContext, ConfigError> {
        let identity = parse_url("auth.identity_server_base_url", &self.identity_server_base_url)?;
        let api = parse_url("auth.api_server_base_url", &self.api_server_base_url)?;

        let conventional = AuthDescriptors::conventional(&identity).map_err(|e| {
            ConfigError::Invalid {
                key: "auth.identity_server_base_url".to_string(),
                message: e.to_string(),
            }
        })?;

        let refresh = if self.refresh_supported {
            self.refresh.clone().or(conventional.refresh)
        } else {
            None
        };

        let descriptors = AuthDescriptors::new(
            self.login.clone().unwrap_or(conventional.login),
            self.logout.clone().unwrap_or(conventional.logout),
            refresh,
        );

        let mut context = AuthContext::new(identity, api, descriptors)
            .with_reduced_security_mode(self.use_reduced_security_mode)
            .with_field_keys(&self.account_key, &self.password_key, &self.retrieve_token_key);

        if let Some(account) = self.account.as_deref().filter(|a| !a.is_empty()) {
            context = context.with_credentials(Credentials::account_only(account));
        }

        Ok(context)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_seconds: DEFAULT_TIMEOUT_SECS, user_agent: None, download_dir: None }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { service_name: default_service_name() }
    }
}

fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing(key.to_string()));
    }
    Url::parse(value)
        .map_err(|e| ConfigError::Invalid { key: key.to_string(), message: e.to_string() })
}

fn default_account_key() -> String {
    DEFAULT_ACCOUNT_KEY.to_string()
}

fn default_password_key() -> String {
    DEFAULT_PASSWORD_KEY.to_string()
}

fn default_retrieve_token_key() -> String {
    DEFAULT_RETRIEVE_TOKEN_KEY.to_string()
}

fn default_service_name() -> String {
    DEFAULT_SERVICE_NAME.to_string()
}

const fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

const fn default_attempt_budget() -> u32 {
    DEFAULT_ATTEMPT_BUDGET
}

const fn default_true() -> bool {
    true
}
