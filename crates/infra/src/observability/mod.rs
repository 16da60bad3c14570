//! Tracing subscriber setup
//!
//! `RUST_LOG` wins over the level passed by the caller.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokenrelay_domain::impl_domain_enum_conversions;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is not provided
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Output format of the log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl_domain_enum_conversions!(LogFormat {
    Text => "text",
    Json => "json",
});

/// Install the global tracing subscriber, writing to stderr.
///
/// # Errors
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(format: LogFormat, level: &str) -> Result<()> {
    let installed = match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(build_env_filter(level))
            .with(fmt::layer().json().with_writer(std::io::stderr).with_target(false))
            .try_init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(build_env_filter(level))
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init(),
    };
    installed.map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}

fn build_env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}
