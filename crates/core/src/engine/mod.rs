//! Call engine - dispatch, response classification and bounded retry
//!
//! Every call carries an attempt budget. Each dispatch consumes one unit;
//! a 401/403 answer runs the recovery chain (see `recovery`) and retries
//! the rejected request with the budget decremented. A call whose budget
//! is zero before dispatch fails with `ExcessiveNumberOfAttempts`.

mod exchange;
mod recovery;

#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokenrelay_domain::constants::{DEFAULT_ATTEMPT_BUDGET, LOGOUT_SUCCEEDED};
use tokenrelay_domain::{
    append_path, ArgumentEncoding, Arguments, CallError, CallResult, HttpMethod, HttpRequest,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, instrument, warn};

use self::exchange::{Download, Exchange, Fetch};
use crate::ports::Transport;
use crate::request_builder::RequestBuilder;
use crate::session::{AuthEvent, AuthSession};

/// Outcome of a single dispatch
enum Attempt<P> {
    Completed(Option<P>),
    /// 401 or 403
    Rejected(u16),
}

/// Dispatches requests for one auth session and recovers from
/// authorization failures.
///
/// Share it behind an `Arc`; all methods take `&self`.
pub struct CallEngine {
    transport: Arc<dyn Transport>,
    session: AuthSession,
    attempt_budget: u32,
    /// Serialises every token read-modify-write sequence
    recovery_gate: Mutex<()>,
}

impl CallEngine {
    pub fn new(transport: Arc<dyn Transport>, session: AuthSession) -> Self {
        Self {
            transport,
            session,
            attempt_budget: DEFAULT_ATTEMPT_BUDGET,
            recovery_gate: Mutex::new(()),
        }
    }

    /// Budget used by [`CallEngine::call`] and friends
    #[must_use]
    pub fn with_attempt_budget(mut self, budget: u32) -> Self {
        self.attempt_budget = budget;
        self
    }

    pub const fn session(&self) -> &AuthSession {
        &self.session
    }

    pub const fn attempt_budget(&self) -> u32 {
        self.attempt_budget
    }

    /// Receive "authentication required" events
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.session.subscribe()
    }

    /// Request against the API server that carries the session's bearer
    /// token. `route` is appended to the API base URL path.
    ///
    /// # Errors
    /// Returns `InvalidComponents` if the API base URL cannot carry a path,
    /// or `SerializationFailed` for an unserialisable JSON body.
    pub fn authorized_request(
        &self,
        route: &str,
        arguments: Option<&Arguments>,
        encoding: ArgumentEncoding,
        method: HttpMethod,
    ) -> CallResult<HttpRequest> {
        let url = append_path(&self.session.context().api_server_base_url, route)?;
        Ok(RequestBuilder::build_url(url, method, arguments, encoding)?.authorized())
    }

    /// Authorized request whose JSON body is `value`.
    ///
    /// # Errors
    /// See [`CallEngine::authorized_request`].
    pub fn authorized_json_request<T>(
        &self,
        route: &str,
        value: &T,
        method: HttpMethod,
    ) -> CallResult<HttpRequest>
    where
        T: Serialize + ?Sized,
    {
        let url = append_path(&self.session.context().api_server_base_url, route)?;
        Ok(RequestBuilder::json_object(&url, value, method)?.authorized())
    }

    /// Dispatch `request` and decode the JSON response into `T`.
    ///
    /// # Errors
    /// Any [`CallError`]: status, decoding and recovery failures are all
    /// reported through the result.
    pub async fn call<T: DeserializeOwned>(&self, request: &HttpRequest) -> CallResult<T> {
        self.call_with_budget(request, self.attempt_budget).await
    }

    /// [`CallEngine::call`] with an explicit attempt budget.
    ///
    /// # Errors
    /// See [`CallEngine::call`].
    pub async fn call_with_budget<T: DeserializeOwned>(
        &self,
        request: &HttpRequest,
        budget: u32,
    ) -> CallResult<T> {
        let body = self.fetch_bytes(request, budget).await?;
        serde_json::from_slice(&body).map_err(CallError::DeserializationFailed)
    }

    /// Dispatch `request` and decode a JSON array of `T`.
    ///
    /// # Errors
    /// See [`CallEngine::call`].
    pub async fn call_many<T: DeserializeOwned>(&self, request: &HttpRequest) -> CallResult<Vec<T>> {
        self.call(request).await
    }

    /// Dispatch `request` and read the body as UTF-8 text.
    ///
    /// # Errors
    /// See [`CallEngine::call`]; invalid UTF-8 is replaced, not rejected.
    pub async fn call_text(&self, request: &HttpRequest) -> CallResult<String> {
        let body = self.fetch_bytes(request, self.attempt_budget).await?;
        Ok(String::from_utf8(body)
            .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned()))
    }

    /// Dispatch `request` and return where the transport stored the body.
    ///
    /// # Errors
    /// `UndefinedArtifactLocation` if the transport produced no artifact,
    /// otherwise see [`CallEngine::call`].
    #[instrument(skip(self, request), fields(url = %request.url()))]
    pub async fn download(&self, request: &HttpRequest) -> CallResult<PathBuf> {
        self.dispatch(&Download, request, self.attempt_budget)
            .await?
            .ok_or(CallError::UndefinedArtifactLocation)
    }

    /// Dispatch `request` and describe the outcome as text: pretty-printed
    /// JSON, raw text for other bodies, or the error and its message.
    pub async fn render(&self, request: &HttpRequest) -> String {
        match self.fetch_bytes(request, self.attempt_budget).await {
            Ok(body) => render_body(&body),
            Err(err) => describe_error(&err),
        }
    }

    /// Invalidate the token on the identity server, then clear the session.
    ///
    /// # Errors
    /// Any [`CallError`] from the logout request; the session is left
    /// untouched in that case.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> CallResult<String> {
        let request =
            RequestBuilder::from_descriptor(self.session.context().logout(), None)?.authorized();

        self.dispatch(&Fetch, &request, self.attempt_budget).await?;

        let _gate = self.recovery_gate.lock().await;
        self.session.reset().await;
        info!("Logged out");
        Ok(LOGOUT_SUCCEEDED.to_string())
    }

    /// Load the stored secret of the configured account.
    ///
    /// # Errors
    /// Returns `CallError::CredentialStore` if the store cannot be read.
    pub async fn restore_credentials(&self) -> CallResult<bool> {
        self.session.restore_credentials().await
    }

    /// Delete stored credentials and drop the in-memory secret.
    ///
    /// # Errors
    /// Returns `CallError::CredentialStore` if the store refuses the deletion.
    pub async fn forget_credentials(&self) -> CallResult<()> {
        self.session.forget_credentials().await
    }

    #[instrument(skip(self, request), fields(method = %request.method(), url = %request.url()))]
    async fn fetch_bytes(&self, request: &HttpRequest, budget: u32) -> CallResult<Vec<u8>> {
        self.dispatch(&Fetch, request, budget).await?.ok_or(CallError::VoidData)
    }

    /// Bounded dispatch loop with recovery on 401/403.
    async fn dispatch<E: Exchange>(
        &self,
        exchange: &E,
        request: &HttpRequest,
        budget: u32,
    ) -> CallResult<Option<E::Payload>> {
        let mut request = request.clone();
        let mut remaining = budget;

        loop {
            if remaining == 0 {
                warn!(url = %request.url(), budget, "Attempt budget exhausted");
                if budget > 0 {
                    self.session.lock_out().await;
                }
                return Err(CallError::ExcessiveNumberOfAttempts);
            }

            let token = self.stamp(&mut request).await;
            match self.attempt(exchange, &request).await? {
                Attempt::Completed(payload) => {
                    self.session.lift_lock_out().await;
                    return Ok(payload);
                }
                Attempt::Rejected(status) => {
                    debug!(status, remaining, "Authorization rejected, recovering");
                    self.recover(&request, &token).await?;
                    remaining -= 1;
                }
            }
        }
    }

    /// Write the current bearer token on authorized requests. Returns the
    /// token the attempt is made with.
    async fn stamp(&self, request: &mut HttpRequest) -> String {
        let token = self.session.access_token().await;
        if request.is_authorized() {
            request.set_bearer(&token);
        }
        token
    }

    /// One dispatch and classification of the response.
    async fn attempt<E: Exchange>(
        &self,
        exchange: &E,
        request: &HttpRequest,
    ) -> CallResult<Attempt<E::Payload>> {
        debug!(method = %request.method(), url = %request.url(), "Dispatching request");

        let response = exchange.exchange(self.transport.as_ref(), request).await?;
        let Some(status) = response.status else {
            return Err(CallError::HttpContextIsInvalid);
        };

        match status {
            401 | 403 => Ok(Attempt::Rejected(status)),
            200..=299 => Ok(Attempt::Completed(response.payload)),
            code => Err(CallError::InvalidHttpStatus {
                code,
                message: E::status_message(response.payload.as_ref()),
            }),
        }
    }
}

/// Pretty-printed JSON, or the body as lossy UTF-8 text when it is not JSON.
#[must_use]
pub fn render_body(body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned())
}

fn describe_error(err: &CallError) -> String {
    let root = err.root_cause();
    if std::ptr::eq(root, err) {
        format!("{:?} error: {err}", err.category())
    } else {
        format!("{:?} error: {err}: {root}", err.category())
    }
}
