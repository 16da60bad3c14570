//! # TokenRelay Domain
//!
//! Value types shared by every TokenRelay crate.
//!
//! This crate contains:
//! - Endpoint descriptors, requests and credentials
//! - The auth context describing identity and API servers
//! - Error types and Result definitions
//! - Configuration structures
//!
//! ## Architecture
//! - No dependencies on other TokenRelay crates
//! - No I/O: pure data and validation

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
