//! Token lifecycle and the recovery chain run on 401/403.
//!
//! Recovery order: refresh first; if that fails and reduced-security mode
//! holds non-void credentials, log in again with them. Anything else ends
//! with an "authentication required" event.

use std::collections::HashMap;

use tokenrelay_domain::constants::{AUTHENTICATION_SUCCEEDED, REFRESH_SUCCEEDED};
use tokenrelay_domain::{Arguments, CallError, CallResult, HttpRequest};
use tracing::{debug, info, instrument, warn};

use super::exchange::Fetch;
use super::{Attempt, CallEngine};
use crate::request_builder::RequestBuilder;

impl CallEngine {
    /// Log in with `account` and `secret` and keep the returned token.
    ///
    /// # Errors
    /// - `MissingTokenKey` if the response lacks the token field
    /// - `SecurityFailure` if the login endpoint answers 401/403
    /// - any status, transport or decoding error of the login request
    #[instrument(skip(self, secret))]
    pub async fn authenticate(&self, account: &str, secret: &str) -> CallResult<String> {
        let _gate = self.recovery_gate.lock().await;
        self.authenticate_locked(account, secret).await
    }

    /// Obtain a new token from the refresh endpoint.
    ///
    /// Only valid while unauthenticated: with a token held this fails with
    /// `TokenRefreshDidFail` without contacting the server.
    ///
    /// # Errors
    /// - `TokenRefreshDidFail` if a token is already held
    /// - `TokenRefreshIsNotSupported` without a refresh endpoint
    /// - `MissingTokenKey` or any error of the refresh request
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> CallResult<String> {
        let _gate = self.recovery_gate.lock().await;
        self.refresh_locked().await
    }

    /// Restore a session after `request` was rejected while carrying
    /// `rejected_token`. Returns `Ok` when the request may be retried.
    pub(super) async fn recover(&self, request: &HttpRequest, rejected_token: &str) -> CallResult<()> {
        let context = self.session.context();
        let targets_refresh = context.refresh().is_some_and(|r| request.targets(r.base_url()));
        if request.targets(context.login().base_url()) || targets_refresh {
            warn!(url = %request.url(), "Authorization rejected by an authentication endpoint");
            return Err(CallError::SecurityFailure);
        }

        let _gate = self.recovery_gate.lock().await;

        let current = self.session.access_token().await;
        if !current.is_empty() && current != rejected_token {
            debug!("Token renewed by a concurrent call, retrying");
            return Ok(());
        }
        self.session.discard_token().await;

        let refresh_error = match self.refresh_locked().await {
            Ok(_) => return Ok(()),
            Err(err) => err,
        };

        if !context.use_reduced_security_mode {
            warn!(error = %refresh_error, "Token refresh failed, authentication required");
            self.session.emit_authentication_required();
            return Err(CallError::refresh_failed_because(refresh_error));
        }

        let credentials = self.session.credentials().await;
        if !credentials.is_non_void() {
            warn!(error = %refresh_error, "Token refresh failed and no stored credentials");
            self.session.emit_authentication_required();
            return Err(CallError::authentication_failed(Some(refresh_error)));
        }

        debug!(account = %credentials.account(), "Token refresh failed, re-authenticating");
        match self.authenticate_locked(credentials.account(), credentials.secret()).await {
            Ok(_) => Ok(()),
            Err(err) => {
                warn!(error = %err, "Re-authentication failed, authentication required");
                self.session.emit_authentication_required();
                Err(CallError::authentication_failed(Some(err)))
            }
        }
    }

    pub(super) async fn authenticate_locked(&self, account: &str, secret: &str) -> CallResult<String> {
        let context = self.session.context();
        let mut arguments = Arguments::new();
        arguments.insert(context.account_key.clone(), account.to_string());
        arguments.insert(context.password_key.clone(), secret.to_string());
        let request = RequestBuilder::from_descriptor(context.login(), Some(&arguments))?;

        self.session.begin_authentication().await;
        match self.fetch_token(&request).await {
            Ok(token) => {
                self.session.store_token(token).await;
                self.session.remember_credentials(account, secret).await;
                info!(account, "Authenticated");
                Ok(AUTHENTICATION_SUCCEEDED.to_string())
            }
            Err(err) => {
                self.session.settle().await;
                Err(err)
            }
        }
    }

    pub(super) async fn refresh_locked(&self) -> CallResult<String> {
        if self.session.is_authenticated().await {
            debug!("Refresh requested while a token is held");
            return Err(CallError::refresh_failed());
        }
        let Some(descriptor) = self.session.context().refresh() else {
            return Err(CallError::TokenRefreshIsNotSupported);
        };
        let request = RequestBuilder::from_descriptor(descriptor, None)?;

        self.session.begin_refresh().await;
        match self.fetch_token(&request).await {
            Ok(token) => {
                self.session.store_token(token).await;
                info!("Token refreshed");
                Ok(REFRESH_SUCCEEDED.to_string())
            }
            Err(err) => {
                self.session.settle().await;
                Err(err)
            }
        }
    }

    /// Single dispatch of a login or refresh request, without nested
    /// recovery: a 401/403 from an authentication endpoint is final.
    async fn fetch_token(&self, request: &HttpRequest) -> CallResult<String> {
        let body = match self.attempt(&Fetch, request).await? {
            Attempt::Completed(payload) => payload.ok_or(CallError::VoidData)?,
            Attempt::Rejected(status) => {
                warn!(status, url = %request.url(), "Authentication endpoint rejected the request");
                return Err(CallError::SecurityFailure);
            }
        };

        let key = &self.session.context().retrieve_token_key;
        let fields: HashMap<String, serde_json::Value> =
            serde_json::from_slice(&body).map_err(CallError::DeserializationFailed)?;
        fields
            .get(key)
            .and_then(serde_json::Value::as_str)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .ok_or_else(|| CallError::MissingTokenKey(key.clone()))
    }
}
