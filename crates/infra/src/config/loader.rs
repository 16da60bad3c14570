//! Configuration loader
//!
//! Loads client configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If the required variables are absent, falls back to a file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! Required:
//! - `TOKENRELAY_IDENTITY_URL`: Identity server base URL
//! - `TOKENRELAY_API_URL`: API server base URL
//!
//! Optional:
//! - `TOKENRELAY_ACCOUNT`: Account whose stored credentials are restored
//! - `TOKENRELAY_REDUCED_SECURITY`: Keep the password for silent re-login
//!   (true/false)
//! - `TOKENRELAY_REFRESH_SUPPORTED`: Whether a refresh endpoint exists
//! - `TOKENRELAY_ATTEMPT_BUDGET`: Dispatches allowed per call
//! - `TOKENRELAY_ACCOUNT_KEY`, `TOKENRELAY_PASSWORD_KEY`,
//!   `TOKENRELAY_TOKEN_KEY`: Login form and token field names
//! - `TOKENRELAY_TIMEOUT_SECS`: HTTP timeout in seconds
//! - `TOKENRELAY_USER_AGENT`: HTTP user agent
//! - `TOKENRELAY_DOWNLOAD_DIR`: Directory receiving downloads
//! - `TOKENRELAY_SERVICE_NAME`: Keychain service name
//!
//! ## File Locations
//! The loader probes `tokenrelay.{json,toml}` then `config.{json,toml}` in
//! the current directory, its two parents, and next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tokenrelay_domain::{AuthConfig, ClientConfig, ConfigError, HttpConfig, StorageConfig};

const IDENTITY_URL: &str = "TOKENRELAY_IDENTITY_URL";
const API_URL: &str = "TOKENRELAY_API_URL";

type Result<T> = std::result::Result<T, ConfigError>;

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If the required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `ConfigError::Invalid` for a malformed environment value, or any
/// error of [`load_from_file`] when the environment is incomplete.
pub fn load() -> Result<ClientConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(ConfigError::Missing(key)) => {
            tracing::debug!(%key, "Environment incomplete, trying file");
            load_from_file(None)
        }
        Err(e) => Err(e),
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `ConfigError::Missing` if a required variable is unset and
/// `ConfigError::Invalid` if a numeric variable does not parse.
pub fn load_from_env() -> Result<ClientConfig> {
    let mut auth = AuthConfig::new(env_var(IDENTITY_URL)?, env_var(API_URL)?);
    auth.account = optional_var("TOKENRELAY_ACCOUNT");
    auth.use_reduced_security_mode = env_bool("TOKENRELAY_REDUCED_SECURITY", false);
    auth.refresh_supported = env_bool("TOKENRELAY_REFRESH_SUPPORTED", true);
    if let Some(budget) = env_parse::<u32>("TOKENRELAY_ATTEMPT_BUDGET")? {
        auth.attempt_budget = budget;
    }
    if let Some(key) = optional_var("TOKENRELAY_ACCOUNT_KEY") {
        auth.account_key = key;
    }
    if let Some(key) = optional_var("TOKENRELAY_PASSWORD_KEY") {
        auth.password_key = key;
    }
    if let Some(key) = optional_var("TOKENRELAY_TOKEN_KEY") {
        auth.retrieve_token_key = key;
    }

    let mut http = HttpConfig::default();
    if let Some(timeout) = env_parse::<u64>("TOKENRELAY_TIMEOUT_SECS")? {
        http.timeout_seconds = timeout;
    }
    http.user_agent = optional_var("TOKENRELAY_USER_AGENT");
    http.download_dir = optional_var("TOKENRELAY_DOWNLOAD_DIR").map(PathBuf::from);

    let mut storage = StorageConfig::default();
    if let Some(service) = optional_var("TOKENRELAY_SERVICE_NAME") {
        storage.service_name = service;
    }

    Ok(ClientConfig { auth, http, storage })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations (see
/// [`probe_config_paths`]). The format follows the file extension.
///
/// # Errors
/// Returns `ConfigError::File` if the file is absent, unreadable or
/// malformed, and `ConfigError::UnsupportedFormat` for other extensions.
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::File(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            ConfigError::File("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| ConfigError::File(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content, by file extension.
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ConfigError::File(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ConfigError::File(format!("Invalid JSON format: {e}"))),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

/// Probe the standard locations for a configuration file
///
/// Returns the first existing candidate, or `None`.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf))
    {
        roots.push(exe_dir);
    }

    let names = ["tokenrelay.json", "tokenrelay.toml", "config.json", "config.toml"];
    roots
        .iter()
        .flat_map(|root| [root.clone(), root.join(".."), root.join("../..")])
        .flat_map(|dir| names.map(|name| dir.join(name)))
        .find(|candidate| candidate.exists())
}

fn env_var(key: &str) -> Result<String> {
    optional_var(key).ok_or_else(|| ConfigError::Missing(key.to_string()))
}

/// Set and non-blank variable
fn optional_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional_var(key)
        .map(|value| {
            value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                key: key.to_string(),
                message: e.to_string(),
            })
        })
        .transpose()
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
