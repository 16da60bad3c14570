//! Account + secret pair and the key it is stored under.

use std::fmt;

use serde::de::Deserializer;
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Account identifier and secret used for (re-)authentication.
///
/// Serialising writes the account only; a deserialised value always has an
/// empty secret. The secret is wiped from memory on drop.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    account: String,
    secret: String,
}

impl Credentials {
    pub fn new(account: impl Into<String>, secret: impl Into<String>) -> Self {
        Self { account: account.into(), secret: secret.into() }
    }

    /// Credentials with a known account and no secret.
    pub fn account_only(account: impl Into<String>) -> Self {
        Self::new(account, String::new())
    }

    #[must_use]
    pub fn account(&self) -> &str {
        &self.account
    }

    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Both account and secret are non-empty. Only non-void credentials may
    /// be used for silent re-authentication.
    #[must_use]
    pub fn is_non_void(&self) -> bool {
        !self.account.is_empty() && !self.secret.is_empty()
    }

    /// Drop the secret, keep the account.
    pub fn clear_secret(&mut self) {
        self.secret.zeroize();
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("account", &self.account)
            .field("secret", &if self.secret.is_empty() { "<empty>" } else { "<redacted>" })
            .finish()
    }
}

impl Serialize for Credentials {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Credentials", 1)?;
        state.serialize_field("account", &self.account)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for Credentials {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct AccountOnly {
            #[serde(default)]
            account: String,
        }

        let AccountOnly { account } = AccountOnly::deserialize(deserializer)?;
        Ok(Self::account_only(account))
    }
}

/// Storage key derived from (account, authentication server URL).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CredentialKey(String);

impl CredentialKey {
    /// Stable SHA-256 digest of the account and the server URL.
    #[must_use]
    pub fn derive(account: &str, server: &Url) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(account.as_bytes());
        hasher.update([0u8]);
        hasher.update(server.as_str().as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
