//! Authentication configuration: the descriptor bundle and the auth context.

use serde::{Deserialize, Serialize};
use url::Url;

use super::credentials::Credentials;
use super::endpoint::{append_path, ArgumentEncoding, EndpointDescriptor, HttpMethod};
use crate::constants::{
    DEFAULT_ACCOUNT_KEY, DEFAULT_PASSWORD_KEY, DEFAULT_RETRIEVE_TOKEN_KEY, LOGIN_ROUTE,
    LOGOUT_ROUTE, REFRESH_ROUTE,
};
use crate::errors::CallError;

/// Login, logout and (optional) refresh endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthDescriptors {
    pub login: EndpointDescriptor,
    pub logout: EndpointDescriptor,
    #[serde(default)]
    pub refresh: Option<EndpointDescriptor>,
}

impl AuthDescriptors {
    #[must_use]
    pub const fn new(
        login: EndpointDescriptor,
        logout: EndpointDescriptor,
        refresh: Option<EndpointDescriptor>,
    ) -> Self {
        Self { login, logout, refresh }
    }

    /// Conventional layout of an identity server:
    /// `POST /login` (form body), `DELETE /token`, `GET /refresh`.
    ///
    /// # Errors
    /// Returns `CallError::InvalidComponents` if `identity` cannot carry a
    /// path.
    pub fn conventional(identity: &Url) -> Result<Self, CallError> {
        Ok(Self {
            login: EndpointDescriptor::new(
                append_path(identity, LOGIN_ROUTE)?,
                HttpMethod::Post,
                ArgumentEncoding::FORM,
            ),
            logout: EndpointDescriptor::new(
                append_path(identity, LOGOUT_ROUTE)?,
                HttpMethod::Delete,
                ArgumentEncoding::QueryString,
            ),
            refresh: Some(EndpointDescriptor::new(
                append_path(identity, REFRESH_ROUTE)?,
                HttpMethod::Get,
                ArgumentEncoding::QueryString,
            )),
        })
    }

    /// Same bundle without a refresh endpoint.
    #[must_use]
    pub fn without_refresh(mut self) -> Self {
        self.refresh = None;
        self
    }
}

/// Everything the auth session needs to know about the servers it talks to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    /// Field carrying the account identifier on login
    #[serde(default = "default_account_key")]
    pub account_key: String,

    /// Field carrying the secret on login
    #[serde(default = "default_password_key")]
    pub password_key: String,

    /// Field of the login/refresh response holding the access token
    #[serde(default = "default_retrieve_token_key")]
    pub retrieve_token_key: String,

    /// Permit keeping the secret (in memory and in the credential store) for
    /// silent re-authentication.
    #[serde(default)]
    pub use_reduced_security_mode: bool,

    pub authentication_server_base_url: Url,

    pub api_server_base_url: Url,

    pub descriptors: AuthDescriptors,

    /// Volatile; only the account survives serialisation.
    #[serde(default)]
    pub credentials: Credentials,
}

impl AuthContext {
    #[must_use]
    pub fn new(identity_server: Url, api_server: Url, descriptors: AuthDescriptors) -> Self {
        Self {
            account_key: default_account_key(),
            password_key: default_password_key(),
            retrieve_token_key: default_retrieve_token_key(),
            use_reduced_security_mode: false,
            authentication_server_base_url: identity_server,
            api_server_base_url: api_server,
            descriptors,
            credentials: Credentials::default(),
        }
    }

    #[must_use]
    pub fn with_reduced_security_mode(mut self, enabled: bool) -> Self {
        self.use_reduced_security_mode = enabled;
        self
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    #[must_use]
    pub fn with_field_keys(
        mut self,
        account_key: impl Into<String>,
        password_key: impl Into<String>,
        retrieve_token_key: impl Into<String>,
    ) -> Self {
        self.account_key = account_key.into();
        self.password_key = password_key.into();
        self.retrieve_token_key = retrieve_token_key.into();
        self
    }

    #[must_use]
    pub const fn login(&self) -> &EndpointDescriptor {
        &self.descriptors.login
    }

    #[must_use]
    pub const fn logout(&self) -> &EndpointDescriptor {
        &self.descriptors.logout
    }

    #[must_use]
    pub const fn refresh(&self) -> Option<&EndpointDescriptor> {
        self.descriptors.refresh.as_ref()
    }
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
