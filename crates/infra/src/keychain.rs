//! Credential store backed by the platform keychain
//!
//! One credential key maps to two keychain entries under the configured
//! service name: `<key>.account` and `<key>.secret`.

use keyring::Entry;
use tokenrelay_core::CredentialStore;
use tokenrelay_domain::{CredentialKey, CredentialStoreError, Credentials};
use tracing::debug;

use crate::errors::IntoCredentialStoreError;

const ACCOUNT_FIELD: &str = "account";
const SECRET_FIELD: &str = "secret";

/// Keychain-backed [`CredentialStore`]
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service: String,
}

impl KeyringCredentialStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self { service: service.into() }
    }

    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, key: &CredentialKey, field: &str) -> Result<Entry, CredentialStoreError> {
        Entry::new(&self.service, &format!("{key}.{field}"))
            .map_err(IntoCredentialStoreError::into_store_error)
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn save(
        &self,
        key: &CredentialKey,
        account: &str,
        secret: &str,
    ) -> Result<(), CredentialStoreError> {
        self.entry(key, ACCOUNT_FIELD)?
            .set_password(account)
            .map_err(IntoCredentialStoreError::into_store_error)?;
        self.entry(key, SECRET_FIELD)?
            .set_password(secret)
            .map_err(IntoCredentialStoreError::into_store_error)?;
        debug!(service = %self.service, "Credentials written to keychain");
        Ok(())
    }

    fn load(&self, key: &CredentialKey) -> Result<Credentials, CredentialStoreError> {
        let account = self
            .entry(key, ACCOUNT_FIELD)?
            .get_password()
            .map_err(IntoCredentialStoreError::into_store_error)?;
        let secret = self
            .entry(key, SECRET_FIELD)?
            .get_password()
            .map_err(IntoCredentialStoreError::into_store_error)?;
        Ok(Credentials::new(account, secret))
    }

    /// Removes both entries; fails with `NoCredentials` only when neither
    /// existed.
    fn delete(&self, key: &CredentialKey) -> Result<(), CredentialStoreError> {
        let mut removed = false;
        for field in [ACCOUNT_FIELD, SECRET_FIELD] {
            match self.entry(key, field)?.delete_credential() {
                Ok(()) => removed = true,
                Err(keyring::Error::NoEntry) => {}
                Err(err) => return Err(err.into_store_error()),
            }
        }
        if removed {
            Ok(())
        } else {
            Err(CredentialStoreError::NoCredentials)
        }
    }
}
