//! In-memory test doubles for the core ports
//!
//! Available under `cfg(test)` and the `test-utils` feature so adapter
//! crates can drive the call engine without a network or a keychain.

// Mutex poisoning is acceptable in test doubles - if a test panics, the
// test fails anyway
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::unwrap_used)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokenrelay_domain::{CredentialKey, CredentialStoreError, Credentials, HttpRequest};

use crate::ports::{CredentialStore, Transport, TransportError, TransportResponse};

type StoredCredentials = Arc<Mutex<HashMap<CredentialKey, (String, String)>>>;
type Scripts = Arc<Mutex<HashMap<String, VecDeque<Scripted>>>>;
type RequestLog = Arc<Mutex<Vec<HttpRequest>>>;

/// Credential store backed by a `HashMap`
#[derive(Debug, Clone, Default)]
pub struct InMemoryCredentialStore {
    entries: StoredCredentials,
    saves: Arc<Mutex<usize>>,
    fail_saves: Arc<Mutex<bool>>,
    fail_loads: Arc<Mutex<bool>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store credentials directly, bypassing the save counter.
    pub fn seed(&self, key: &CredentialKey, account: &str, secret: &str) {
        self.entries.lock().unwrap().insert(key.clone(), (account.to_string(), secret.to_string()));
    }

    /// Make every subsequent `save` fail with `AccessFailed`.
    pub fn fail_saves(&self, fail: bool) {
        *self.fail_saves.lock().unwrap() = fail;
    }

    /// Make every subsequent `load` fail with `AccessFailed`.
    pub fn fail_loads(&self, fail: bool) {
        *self.fail_loads.lock().unwrap() = fail;
    }

    /// Number of `save` calls that reached the store
    #[must_use]
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn get(&self, key: &CredentialKey) -> Option<(String, String)> {
        self.entries.lock().unwrap().get(key).cloned()
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn save(
        &self,
        key: &CredentialKey,
        account: &str,
        secret: &str,
    ) -> Result<(), CredentialStoreError> {
        *self.saves.lock().unwrap() += 1;
        if *self.fail_saves.lock().unwrap() {
            return Err(CredentialStoreError::AccessFailed("store is locked".to_string()));
        }
        self.seed(key, account, secret);
        Ok(())
    }

    fn load(&self, key: &CredentialKey) -> Result<Credentials, CredentialStoreError> {
        if *self.fail_loads.lock().unwrap() {
            return Err(CredentialStoreError::AccessFailed("store is locked".to_string()));
        }
        self.get(key)
            .map(|(account, secret)| Credentials::new(account, secret))
            .ok_or(CredentialStoreError::NoCredentials)
    }

    fn delete(&self, key: &CredentialKey) -> Result<(), CredentialStoreError> {
        self.entries
            .lock()
            .unwrap()
            .remove(key)
            .map(|_| ())
            .ok_or(CredentialStoreError::NoCredentials)
    }
}

#[derive(Debug, Clone)]
enum Scripted {
    Respond { status: u16, body: Option<Vec<u8>> },
    NotHttp,
    Fail(String),
}

/// Transport answering from per-path scripts.
///
/// Each path holds a queue of answers consumed in order; the last answer
/// repeats once the queue is down to one. Unscripted paths answer `404`.
/// Every request is recorded as dispatched, headers included.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    scripts: Scripts,
    requests: RequestLog,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an HTTP answer for `path`
    pub fn respond(&self, path: &str, status: u16, body: &str) -> &Self {
        self.push(path, Scripted::Respond { status, body: Some(body.as_bytes().to_vec()) })
    }

    /// Queue an HTTP answer without a body
    pub fn respond_empty(&self, path: &str, status: u16) -> &Self {
        self.push(path, Scripted::Respond { status, body: None })
    }

    /// Queue a response that carries no HTTP status
    pub fn respond_not_http(&self, path: &str) -> &Self {
        self.push(path, Scripted::NotHttp)
    }

    /// Queue a transport failure
    pub fn fail(&self, path: &str, message: &str) -> &Self {
        self.push(path, Scripted::Fail(message.to_string()))
    }

    /// Every request dispatched so far, in order
    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests dispatched to `path`
    #[must_use]
    pub fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        self.requests().into_iter().filter(|request| request.url().path() == path).collect()
    }

    #[must_use]
    pub fn count(&self, path: &str) -> usize {
        self.requests_to(path).len()
    }

    fn push(&self, path: &str, answer: Scripted) -> &Self {
        self.scripts.lock().unwrap().entry(path.to_string()).or_default().push_back(answer);
        self
    }

    fn answer(&self, request: &HttpRequest) -> Scripted {
        self.requests.lock().unwrap().push(request.clone());

        let mut scripts = self.scripts.lock().unwrap();
        let Some(queue) = scripts.get_mut(request.url().path()) else {
            return Scripted::Respond { status: 404, body: None };
        };
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap_or(Scripted::Respond { status: 404, body: None })
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        request: &HttpRequest,
    ) -> Result<TransportResponse<Vec<u8>>, TransportError> {
        // Let concurrent callers interleave as they would over a network
        tokio::task::yield_now().await;
        match self.answer(request) {
            Scripted::Respond { status, body } => Ok(TransportResponse::new(status, body)),
            Scripted::NotHttp => {
                Ok(TransportResponse { status: None, headers: BTreeMap::new(), payload: None })
            }
            Scripted::Fail(message) => Err(TransportError::Connection(message)),
        }
    }

    /// The scripted body, read as text, is the artifact path.
    async fn download(
        &self,
        request: &HttpRequest,
    ) -> Result<TransportResponse<PathBuf>, TransportError> {
        let response = self.send(request).await?;
        let payload = response
            .payload
            .filter(|body| !body.is_empty())
            .map(|body| PathBuf::from(String::from_utf8_lossy(&body).into_owned()));
        Ok(TransportResponse { status: response.status, headers: response.headers, payload })
    }
}
