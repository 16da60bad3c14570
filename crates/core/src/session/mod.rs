//! Auth session: token lifecycle, volatile credentials and the
//! "authentication required" event.
//!
//! The session only holds state. Everything that talks to a server
//! (login, refresh, logout, recovery) lives in [`crate::engine`], which owns
//! one session and serialises every token read-modify-write sequence.

mod state;

use std::sync::Arc;

use tokenrelay_domain::{
    AuthContext, CallResult, CredentialKey, CredentialStoreError, Credentials,
};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::ports::CredentialStore;

pub use state::{AuthPhase, SessionState};

/// Capacity of the event channel; slow subscribers lag rather than block.
const EVENT_CAPACITY: usize = 16;

/// Events published by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    /// Recovery is exhausted: the user has to log in again
    AuthenticationRequired,
}

/// Holds the access token, the last-attempt timestamps and the credentials
/// of one authenticated client.
pub struct AuthSession {
    context: AuthContext,
    state: RwLock<SessionState>,
    credentials: RwLock<Credentials>,
    store: Option<Arc<dyn CredentialStore>>,
    events: broadcast::Sender<AuthEvent>,
}

impl AuthSession {
    /// Create an unauthenticated session. Credentials carried by `context`
    /// become the session's in-memory credentials.
    pub fn new(mut context: AuthContext) -> Self {
        let credentials = std::mem::take(&mut context.credentials);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            context,
            state: RwLock::new(SessionState::default()),
            credentials: RwLock::new(credentials),
            store: None,
            events,
        }
    }

    /// Persist credentials through `store` (reduced-security mode only)
    #[must_use]
    pub fn with_credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub const fn context(&self) -> &AuthContext {
        &self.context
    }

    pub async fn access_token(&self) -> String {
        self.state.read().await.access_token().to_string()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.is_authenticated()
    }

    pub async fn phase(&self) -> AuthPhase {
        self.state.read().await.phase()
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> SessionState {
        self.state.read().await.clone()
    }

    /// Copy of the in-memory credentials
    pub async fn credentials(&self) -> Credentials {
        self.credentials.read().await.clone()
    }

    /// Receive [`AuthEvent`]s published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit_authentication_required(&self) {
        if self.events.send(AuthEvent::AuthenticationRequired).is_err() {
            debug!("No subscriber for authentication-required event");
        }
    }

    pub(crate) async fn begin_authentication(&self) {
        self.state.write().await.begin_authentication();
    }

    pub(crate) async fn begin_refresh(&self) {
        self.state.write().await.begin_refresh();
    }

    pub(crate) async fn store_token(&self, token: String) {
        self.state.write().await.set_token(token);
    }

    pub(crate) async fn discard_token(&self) {
        self.state.write().await.clear_token();
    }

    pub(crate) async fn settle(&self) {
        self.state.write().await.settle();
    }

    pub(crate) async fn lock_out(&self) {
        self.state.write().await.lock_out();
    }

    pub(crate) async fn lift_lock_out(&self) {
        if self.phase().await == AuthPhase::LockedOut {
            self.state.write().await.lift_lock_out();
        }
    }

    pub(crate) async fn reset(&self) {
        self.state.write().await.reset();
    }

    /// Keep the credentials of a successful login.
    ///
    /// The account is always kept. The secret is kept in memory and written
    /// to the credential store only in reduced-security mode; a failed write
    /// is logged and otherwise ignored.
    pub(crate) async fn remember_credentials(&self, account: &str, secret: &str) {
        let reduced = self.context.use_reduced_security_mode;
        let credentials = if reduced {
            Credentials::new(account, secret)
        } else {
            Credentials::account_only(account)
        };
        *self.credentials.write().await = credentials.clone();

        if !reduced || self.store.is_none() {
            return;
        }

        let key = self.credential_key(account);
        let result = self
            .with_store(move |store| store.save(&key, credentials.account(), credentials.secret()))
            .await;
        match result {
            Ok(()) => debug!(account, "Credentials persisted"),
            Err(err) => warn!(account, error = %err, "Failed to persist credentials"),
        }
    }

    /// Load the secret of the configured account from the credential store.
    ///
    /// Returns `Ok(false)` when reduced-security mode is off, no account is
    /// known, no store is configured or nothing is stored.
    ///
    /// # Errors
    /// Returns `CallError::CredentialStore` if the store cannot be read.
    pub async fn restore_credentials(&self) -> CallResult<bool> {
        let account = self.credentials.read().await.account().to_string();
        if !self.context.use_reduced_security_mode || account.is_empty() || self.store.is_none() {
            return Ok(false);
        }

        let key = self.credential_key(&account);
        match self.with_store(move |store| store.load(&key)).await {
            Ok(stored) => {
                let restored = stored.is_non_void();
                *self.credentials.write().await = Credentials::new(account.as_str(), stored.secret());
                info!(account = %account, restored, "Credentials restored");
                Ok(restored)
            }
            Err(CredentialStoreError::NoCredentials) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Delete stored credentials and drop the in-memory secret.
    ///
    /// # Errors
    /// Returns `CallError::CredentialStore` if the store refuses the deletion.
    pub async fn forget_credentials(&self) -> CallResult<()> {
        let account = {
            let mut credentials = self.credentials.write().await;
            credentials.clear_secret();
            credentials.account().to_string()
        };
        if account.is_empty() || self.store.is_none() {
            return Ok(());
        }

        let key = self.credential_key(&account);
        match self.with_store(move |store| store.delete(&key)).await {
            Ok(()) | Err(CredentialStoreError::NoCredentials) => {
                info!(account = %account, "Credentials forgotten");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn credential_key(&self, account: &str) -> CredentialKey {
        CredentialKey::derive(account, &self.context.authentication_server_base_url)
    }

    /// Run a blocking store operation off the async executor.
    async fn with_store<T, F>(&self, operation: F) -> Result<T, CredentialStoreError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn CredentialStore) -> Result<T, CredentialStoreError> + Send + 'static,
    {
        let Some(store) = self.store.clone() else {
            return Err(CredentialStoreError::AccessFailed(
                "no credential store configured".to_string(),
            ));
        };
        tokio::task::spawn_blocking(move || operation(store.as_ref()))
            .await
            .map_err(|e| CredentialStoreError::AccessFailed(e.to_string()))?
    }
}
