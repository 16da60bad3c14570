//! Domain-level constants
//!
//! Defaults shared by the configuration layer, the request builder and the
//! auth session.

// Auth context defaults
pub const DEFAULT_ACCOUNT_KEY: &str = "email";
pub const DEFAULT_PASSWORD_KEY: &str = "password";
pub const DEFAULT_RETRIEVE_TOKEN_KEY: &str = "access_token";

// Conventional routes on the identity server
pub const LOGIN_ROUTE: &str = "login";
pub const LOGOUT_ROUTE: &str = "token";
pub const REFRESH_ROUTE: &str = "refresh";

/// Default number of dispatches a call may consume, recovery retries included.
pub const DEFAULT_ATTEMPT_BUDGET: u32 = 3;

// HTTP
pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const BEARER_PREFIX: &str = "Bearer ";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded;charset=utf-8";
pub const JSON_CONTENT_TYPE: &str = "application/json;charset=utf-8";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// Credential storage
pub const DEFAULT_SERVICE_NAME: &str = "tokenrelay";

// Messages handed back on success
pub const AUTHENTICATION_SUCCEEDED: &str = "Successful authentication";
pub const REFRESH_SUCCEEDED: &str = "Successful token refresh";
pub const LOGOUT_SUCCEEDED: &str = "Successful deconnection";
