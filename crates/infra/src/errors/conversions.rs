//! Conversions from external infrastructure errors into port errors.
//!
//! Neither side of these conversions is defined in this crate, so they are
//! expressed as extension traits instead of `From` impls.

use keyring::Error as KeyringError;
use reqwest::Error as HttpError;
use tokenrelay_core::TransportError;
use tokenrelay_domain::CredentialStoreError;

/// Turn an HTTP client or I/O failure into a [`TransportError`].
pub(crate) trait IntoTransportError {
    fn into_transport(self) -> TransportError;
}

/// Turn a keychain failure into a [`CredentialStoreError`].
pub(crate) trait IntoCredentialStoreError {
    fn into_store_error(self) -> CredentialStoreError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → TransportError */
/* -------------------------------------------------------------------------- */

impl IntoTransportError for HttpError {
    fn into_transport(self) -> TransportError {
        if self.is_timeout() {
            return TransportError::Timeout;
        }
        if self.is_connect() {
            return TransportError::Connection(self.to_string());
        }
        if self.is_builder() {
            return TransportError::Other(format!("invalid request: {self}"));
        }
        TransportError::Other(self.to_string())
    }
}

impl IntoTransportError for std::io::Error {
    fn into_transport(self) -> TransportError {
        TransportError::Io(self.to_string())
    }
}

/* -------------------------------------------------------------------------- */
/* keyring::Error → CredentialStoreError */
/* -------------------------------------------------------------------------- */

impl IntoCredentialStoreError for KeyringError {
    fn into_store_error(self) -> CredentialStoreError {
        match self {
            KeyringError::NoEntry => CredentialStoreError::NoCredentials,
            KeyringError::BadEncoding(_) => {
                CredentialStoreError::AccessFailed("stored credential is not valid UTF-8".into())
            }
            KeyringError::TooLong(name, limit) => CredentialStoreError::AccessFailed(format!(
                "keychain attribute '{name}' exceeds platform limit ({limit})"
            )),
            KeyringError::Invalid(attr, reason) => CredentialStoreError::AccessFailed(format!(
                "keychain attribute '{attr}' is invalid: {reason}"
            )),
            KeyringError::NoStorageAccess(err) => {
                CredentialStoreError::AccessFailed(format!("keychain is not accessible: {err}"))
            }
            other => CredentialStoreError::AccessFailed(other.to_string()),
        }
    }
}
