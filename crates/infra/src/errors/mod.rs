//! Error conversions for infrastructure adapters

pub(crate) mod conversions;

pub(crate) use conversions::{IntoCredentialStoreError, IntoTransportError};
