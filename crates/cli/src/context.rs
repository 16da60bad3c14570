//! Client context - wires configuration, transport, keychain and engine

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokenrelay_core::{AuthSession, CallEngine};
use tokenrelay_domain::ClientConfig;
use tokenrelay_infra::{config, HttpTransport, KeyringCredentialStore};
use tracing::debug;

/// Everything a command needs to talk to the servers
pub struct ClientContext {
    pub config: ClientConfig,
    pub engine: Arc<CallEngine>,
}

impl ClientContext {
    /// Load configuration (explicit file, or environment then probed files)
    /// and build the engine.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let config = match config_path {
            Some(path) => config::load_from_file(Some(path))?,
            None => config::load()?,
        };
        Self::new(config)
    }

    pub fn new(config: ClientConfig) -> Result<Self> {
        let context = config.auth.to_context().context("invalid auth configuration")?;
        let transport =
            HttpTransport::from_config(&config.http).context("failed to build HTTP transport")?;
        let store = KeyringCredentialStore::new(config.storage.service_name.clone());

        let session = AuthSession::new(context).with_credential_store(Arc::new(store));
        let engine = CallEngine::new(Arc::new(transport), session)
            .with_attempt_budget(config.auth.attempt_budget);
        debug!(budget = config.auth.attempt_budget, "Client context ready");

        Ok(Self { config, engine: Arc::new(engine) })
    }

    /// Account given on the command line, else the configured one.
    pub fn account(&self, explicit: Option<&str>) -> Option<String> {
        explicit
            .or(self.config.auth.account.as_deref())
            .filter(|account| !account.is_empty())
            .map(str::to_string)
    }
}
