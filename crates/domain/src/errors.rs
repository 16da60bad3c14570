//! Error types used throughout the calling layer

use thiserror::Error;

/// Categories of call errors, used by observers to decide what to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallErrorCategory {
    /// The request could not be built (bad URL, unserialisable body)
    Request,
    /// The transport failed before an HTTP response was available
    Transport,
    /// A response arrived but could not be turned into the expected value
    Response,
    /// Authorization failed and recovery could not restore a session
    Authentication,
    /// The attempt budget was exhausted
    Exhausted,
    /// The credential store rejected an explicit operation
    Storage,
}

/// Errors surfaced by the request builder, the auth session and the call
/// engine. The `Display` text is the human-readable message for callers.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid URL components: {0}")]
    InvalidComponents(String),

    #[error("The response is not a HTTP response")]
    HttpContextIsInvalid,

    #[error("Invalid HTTP status {code}")]
    InvalidHttpStatus { code: u16, message: String },

    #[error("Void data")]
    VoidData,

    #[error("Missing token key `{0}` in authentication response")]
    MissingTokenKey(String),

    #[error("Authentication did fail")]
    AuthenticationDidFail {
        #[source]
        cause: Option<Box<CallError>>,
    },

    #[error("Token refresh is not supported")]
    TokenRefreshIsNotSupported,

    #[error("Token refresh did fail")]
    TokenRefreshDidFail {
        #[source]
        cause: Option<Box<CallError>>,
    },

    #[error("Security failure: authorization rejected on an authentication endpoint")]
    SecurityFailure,

    #[error("Excessive number of attempts")]
    ExcessiveNumberOfAttempts,

    #[error("Undefined artifact location")]
    UndefinedArtifactLocation,

    #[error("Deserialization did fail: {0}")]
    DeserializationFailed(#[source] serde_json::Error),

    #[error("Serialization did fail: {0}")]
    SerializationFailed(#[source] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Credential store error: {0}")]
    CredentialStore(#[from] CredentialStoreError),
}

impl CallError {
    /// `TokenRefreshDidFail` without an underlying cause.
    #[must_use]
    pub const fn refresh_failed() -> Self {
        Self::TokenRefreshDidFail { cause: None }
    }

    /// `TokenRefreshDidFail` wrapping the error that ended the refresh.
    #[must_use]
    pub fn refresh_failed_because(cause: Self) -> Self {
        Self::TokenRefreshDidFail { cause: Some(Box::new(cause)) }
    }

    /// `AuthenticationDidFail`, optionally wrapping the login error.
    #[must_use]
    pub fn authentication_failed(cause: Option<Self>) -> Self {
        Self::AuthenticationDidFail { cause: cause.map(Box::new) }
    }

    /// Get the category for this error
    #[must_use]
    pub const fn category(&self) -> CallErrorCategory {
        match self {
            Self::InvalidUrl(_) | Self::InvalidComponents(_) | Self::SerializationFailed(_) => {
                CallErrorCategory::Request
            }
            Self::Transport(_) => CallErrorCategory::Transport,
            Self::HttpContextIsInvalid
            | Self::InvalidHttpStatus { .. }
            | Self::VoidData
            | Self::DeserializationFailed(_)
            | Self::UndefinedArtifactLocation => CallErrorCategory::Response,
            Self::MissingTokenKey(_)
            | Self::AuthenticationDidFail { .. }
            | Self::TokenRefreshIsNotSupported
            | Self::TokenRefreshDidFail { .. }
            | Self::SecurityFailure => CallErrorCategory::Authentication,
            Self::ExcessiveNumberOfAttempts => CallErrorCategory::Exhausted,
            Self::CredentialStore(_) => CallErrorCategory::Storage,
        }
    }

    /// Whether the user has to log in again before calls can succeed.
    #[must_use]
    pub const fn requires_authentication(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationDidFail { .. } | Self::TokenRefreshDidFail { .. }
        )
    }

    /// HTTP status carried by the error, if any.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::InvalidHttpStatus { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Innermost error of a recovery chain.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::AuthenticationDidFail { cause: Some(inner) }
            | Self::TokenRefreshDidFail { cause: Some(inner) } => inner.root_cause(),
            other => other,
        }
    }
}

/// Credential store failures
#[derive(Debug, Error)]
pub enum CredentialStoreError {
    /// No credentials are stored under the requested key
    #[error("No credentials stored")]
    NoCredentials,

    /// The platform store refused the operation (locked, denied, absent)
    #[error("Credential store access failed: {0}")]
    AccessFailed(String),
}

/// Configuration failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration value: {0}")]
    Missing(String),

    #[error("Invalid configuration value for {key}: {message}")]
    Invalid { key: String, message: String },

    #[error("Configuration file error: {0}")]
    File(String),

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),
}

/// Result type alias for call operations
pub type CallResult<T> = std::result::Result<T, CallError>;
