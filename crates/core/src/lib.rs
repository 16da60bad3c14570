//! # TokenRelay Core
//!
//! Authenticated calling logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces for the transport and the credential store (traits)
//! - The request builder
//! - The auth session and its event bus
//! - The call engine and its recovery state machine
//!
//! ## Architecture Principles
//! - Only depends on `tokenrelay-domain`
//! - No HTTP client, keychain or filesystem code
//! - All external dependencies via traits

pub mod engine;
pub mod ports;
pub mod request_builder;
pub mod session;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export specific items to avoid ambiguity
pub use engine::{render_body, CallEngine};
pub use ports::{CredentialStore, Transport, TransportError, TransportResponse};
pub use request_builder::RequestBuilder;
pub use session::{AuthEvent, AuthPhase, AuthSession, SessionState};
