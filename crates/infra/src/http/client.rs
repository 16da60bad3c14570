use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, Method, Response};
use tokenrelay_core::{Transport, TransportError, TransportResponse};
use tokenrelay_domain::constants::DEFAULT_TIMEOUT_SECS;
use tokenrelay_domain::{HttpConfig, HttpMethod, HttpRequest};
use tracing::debug;
use uuid::Uuid;

use crate::errors::IntoTransportError;

/// `reqwest`-backed transport.
///
/// Every request is sent exactly once; transient failures are reported to
/// the call engine, never retried here.
#[derive(Clone)]
pub struct HttpTransport {
    client: ReqwestClient,
    download_dir: PathBuf,
}

impl HttpTransport {
    /// Start building a new transport.
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::default()
    }

    /// Convenience constructor with default configuration.
    ///
    /// # Errors
    /// Returns `TransportError::Other` if the TLS backend cannot be set up.
    pub fn new() -> Result<Self, TransportError> {
        Self::builder().build()
    }

    /// Transport configured from the `[http]` section.
    ///
    /// # Errors
    /// See [`HttpTransport::new`].
    pub fn from_config(config: &HttpConfig) -> Result<Self, TransportError> {
        let mut builder = Self::builder().timeout(Duration::from_secs(config.timeout_seconds));
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        if let Some(dir) = &config.download_dir {
            builder = builder.download_dir(dir.clone());
        }
        builder.build()
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    async fn execute(&self, request: &HttpRequest) -> Result<Response, TransportError> {
        let mut builder = self.client.request(to_method(request.method()), request.url().clone());
        for (name, value) in request.headers() {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body() {
            builder = builder.body(body.to_vec());
        }
        let built = builder.build().map_err(IntoTransportError::into_transport)?;

        let method = built.method().clone();
        let url = built.url().clone();
        debug!(%method, %url, "sending HTTP request");

        match self.client.execute(built).await {
            Ok(response) => {
                debug!(%method, %url, status = %response.status(), "received HTTP response");
                Ok(response)
            }
            Err(err) => {
                debug!(%method, %url, error = %err, "HTTP request failed");
                Err(err.into_transport())
            }
        }
    }

    /// File name for an artifact fetched from `url`
    fn artifact_path(&self, url: &url::Url) -> PathBuf {
        let id = Uuid::new_v4();
        let name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|segment| !segment.is_empty())
            .map_or_else(|| id.to_string(), |segment| format!("{id}-{segment}"));
        self.download_dir.join(name)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &HttpRequest,
    ) -> Result<TransportResponse<Vec<u8>>, TransportError> {
        let response = self.execute(request).await?;
        let status = response.status().as_u16();
        let headers = collect_headers(&response);
        let body = response.bytes().await.map_err(IntoTransportError::into_transport)?;

        Ok(TransportResponse { status: Some(status), headers, payload: Some(body.to_vec()) })
    }

    async fn download(
        &self,
        request: &HttpRequest,
    ) -> Result<TransportResponse<PathBuf>, TransportError> {
        let response = self.execute(request).await?;
        let status = response.status();
        let headers = collect_headers(&response);

        if !status.is_success() {
            return Ok(TransportResponse { status: Some(status.as_u16()), headers, payload: None });
        }

        let body = response.bytes().await.map_err(IntoTransportError::into_transport)?;
        let path = self.artifact_path(request.url());
        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .map_err(IntoTransportError::into_transport)?;
        tokio::fs::write(&path, &body).await.map_err(IntoTransportError::into_transport)?;
        debug!(path = %path.display(), bytes = body.len(), "stored download");

        Ok(TransportResponse { status: Some(status.as_u16()), headers, payload: Some(path) })
    }
}

/// Builder for [`HttpTransport`].
#[derive(Debug)]
pub struct HttpTransportBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    download_dir: Option<PathBuf>,
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: None,
            download_dir: None,
        }
    }
}

impl HttpTransportBuilder {
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Directory receiving downloads (defaults to the system temp dir).
    #[must_use]
    pub fn download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = Some(dir.into());
        self
    }

    /// # Errors
    /// Returns `TransportError::Other` if the client cannot be built.
    pub fn build(self) -> Result<HttpTransport, TransportError> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        let client = builder.build().map_err(IntoTransportError::into_transport)?;

        Ok(HttpTransport {
            client,
            download_dir: self.download_dir.unwrap_or_else(std::env::temp_dir),
        })
    }
}

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn collect_headers(response: &Response) -> BTreeMap<String, String> {
    response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value.to_str().ok().map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}
