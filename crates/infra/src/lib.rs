//! # tokenrelay infrastructure
//!
//! Adapters for the ports defined in `tokenrelay-core`.
//!
//! This crate contains:
//! - The `reqwest` HTTP transport
//! - The platform keychain credential store
//! - Configuration loading from environment and files
//! - Tracing subscriber setup
//!
//! ## Architecture
//! - Implements traits defined in `tokenrelay-core`
//! - Contains all "impure" code (network, keychain, filesystem)

pub mod config;
mod errors;
pub mod http;
pub mod keychain;
pub mod observability;

pub use http::{HttpTransport, HttpTransportBuilder};
pub use keychain::KeyringCredentialStore;
pub use observability::{init_tracing, LogFormat, DEFAULT_LOG_LEVEL};
