//! Port interfaces for the calling layer
//!
//! These traits define the boundaries between the call engine and the
//! infrastructure that moves bytes and keeps secrets.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tokenrelay_domain::{CallError, CredentialKey, CredentialStoreError, Credentials, HttpRequest};

/// Raw outcome of one exchange with a server.
///
/// `status` is `None` when the transport produced something that is not an
/// HTTP response. `payload` is the body for [`Transport::send`] and the local
/// artifact path for [`Transport::download`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse<P> {
    pub status: Option<u16>,
    pub headers: BTreeMap<String, String>,
    pub payload: Option<P>,
}

impl<P> TransportResponse<P> {
    /// HTTP response with a payload and no headers
    pub fn new(status: u16, payload: Option<P>) -> Self {
        Self { status: Some(status), headers: BTreeMap::new(), payload }
    }
}

/// Failures raised before any HTTP response was available
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request timed out")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("{0}")]
    Other(String),
}

impl From<TransportError> for CallError {
    fn from(err: TransportError) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Trait for sending built requests over the network
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and collect the response body
    async fn send(&self, request: &HttpRequest) -> Result<TransportResponse<Vec<u8>>, TransportError>;

    /// Send a request and store the response body as a local artifact
    async fn download(
        &self,
        request: &HttpRequest,
    ) -> Result<TransportResponse<PathBuf>, TransportError>;
}

/// Trait for persisting one account + secret pair per key.
///
/// Implementations may block; callers on an async runtime must move calls
/// off the executor.
pub trait CredentialStore: Send + Sync {
    /// Store (or overwrite) the credentials under `key`
    fn save(&self, key: &CredentialKey, account: &str, secret: &str)
        -> Result<(), CredentialStoreError>;

    /// Load the credentials stored under `key`
    ///
    /// Returns `CredentialStoreError::NoCredentials` when nothing is stored.
    fn load(&self, key: &CredentialKey) -> Result<Credentials, CredentialStoreError>;

    /// Remove the credentials stored under `key`
    fn delete(&self, key: &CredentialKey) -> Result<(), CredentialStoreError>;
}
