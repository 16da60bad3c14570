//! The two kinds of exchange the engine drives through a [`Transport`].

use std::path::PathBuf;

use async_trait::async_trait;
use tokenrelay_domain::HttpRequest;

use crate::ports::{Transport, TransportError, TransportResponse};

/// Longest response excerpt carried by `InvalidHttpStatus`
const STATUS_MESSAGE_LIMIT: usize = 256;

#[async_trait]
pub(crate) trait Exchange: Send + Sync {
    type Payload: Send;

    async fn exchange(
        &self,
        transport: &dyn Transport,
        request: &HttpRequest,
    ) -> Result<TransportResponse<Self::Payload>, TransportError>;

    /// Text attached to an unexpected status
    fn status_message(payload: Option<&Self::Payload>) -> String;
}

/// In-memory body
pub(crate) struct Fetch;

/// Body stored as a local artifact
pub(crate) struct Download;

#[async_trait]
impl Exchange for Fetch {
    type Payload = Vec<u8>;

    async fn exchange(
        &self,
        transport: &dyn Transport,
        request: &HttpRequest,
    ) -> Result<TransportResponse<Vec<u8>>, TransportError> {
        transport.send(request).await
    }

    fn status_message(payload: Option<&Vec<u8>>) -> String {
        let Some(body) = payload else {
            return String::new();
        };
        let text = String::from_utf8_lossy(body);
        text.trim().chars().take(STATUS_MESSAGE_LIMIT).collect()
    }
}

#[async_trait]
impl Exchange for Download {
    type Payload = PathBuf;

    async fn exchange(
        &self,
        transport: &dyn Transport,
        request: &HttpRequest,
    ) -> Result<TransportResponse<PathBuf>, TransportError> {
        transport.download(request).await
    }

    fn status_message(_payload: Option<&PathBuf>) -> String {
        String::new()
    }
}
