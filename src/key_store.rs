use std::{
    fmt,
    sync::{PoisonError, RwLock},
};

use keyring::{Entry, Error as KeyringError};

use crate::error::KeyStoreError;

pub const KEYRING_SERVICE: &str = "com.teamdesk.dashboard";
pub const KEYRING_ACCOUNT: &str = "gemini_api_key";

/// API key for the generative-language provider. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

impl From<&str> for Credential {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Credential {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Where the provider key lives between sessions.
///
/// Reads are synchronous and infallible from the caller's point of view: an
/// unreadable store behaves like an empty one. The value is stored exactly as
/// given; the settings form is the only writer.
pub trait KeyStore: Send + Sync {
    fn get_key(&self) -> Option<Credential>;

    fn set_key(&self, value: Credential) -> Result<(), KeyStoreError>;

    fn clear_key(&self) -> Result<(), KeyStoreError>;

    fn has_key(&self) -> bool {
        self.get_key().is_some()
    }
}

/// OS keychain entry (macOS Keychain, Secret Service, Windows Credential Manager).
pub struct KeyringKeyStore {
    service: String,
    account: String,
}

impl KeyringKeyStore {
    pub fn new() -> Self {
        Self::with_entry(KEYRING_SERVICE, KEYRING_ACCOUNT)
    }

    pub fn with_entry(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<Entry, KeyStoreError> {
        Entry::new(&self.service, &self.account).map_err(KeyStoreError::Entry)
    }
}

impl Default for KeyringKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyStore for KeyringKeyStore {
    fn get_key(&self) -> Option<Credential> {
        let entry = match self.entry() {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(error = %err, "keyring unavailable, treating API key as unset");
                return None;
            }
        };

        match entry.get_password() {
            Ok(key) => Some(Credential::new(key)),
            Err(KeyringError::NoEntry) => None,
            Err(err) => {
                tracing::warn!(error = %err, "unable to read API key from keyring");
                None
            }
        }
    }

    fn set_key(&self, value: Credential) -> Result<(), KeyStoreError> {
        self.entry()?
            .set_password(value.expose())
            .map_err(KeyStoreError::Write)?;
        tracing::info!(service = %self.service, "API key saved to keyring");
        Ok(())
    }

    fn clear_key(&self) -> Result<(), KeyStoreError> {
        match self.entry()?.delete_password() {
            Ok(()) | Err(KeyringError::NoEntry) => Ok(()),
            Err(err) => Err(KeyStoreError::Delete(err)),
        }
    }
}

/// Process-local store, used by tests and by hosts that inject the key.
#[derive(Default)]
pub struct MemoryKeyStore {
    value: RwLock<Option<Credential>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(value: impl Into<Credential>) -> Self {
        Self {
            value: RwLock::new(Some(value.into())),
        }
    }
}

impl KeyStore for MemoryKeyStore {
    fn get_key(&self) -> Option<Credential> {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_key(&self, value: Credential) -> Result<(), KeyStoreError> {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = Some(value);
        Ok(())
    }

    fn clear_key(&self) -> Result<(), KeyStoreError> {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
