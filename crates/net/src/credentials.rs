//! Persisted session credentials behind a key-value port.
//!
//! Two keys matter to this subsystem: the bearer credential and the
//! serialized user snapshot. Both are removed together whenever the
//! gateway observes a 401. Production uses the platform keyring
//! (macOS Keychain, Windows Credential Manager, Linux Secret Service);
//! tests and ephemeral sessions use the in-memory store.

use std::collections::HashMap;

use hearth_domain::{AUTH_TOKEN_KEY, USER_SNAPSHOT_KEY};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors surfaced by the credential backend.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential backend error: {0}")]
    Backend(String),
}

/// Minimal key-value port over the platform credential store.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CredentialError>;
    fn set(&self, key: &str, value: &str) -> Result<(), CredentialError>;
    fn remove(&self, key: &str) -> Result<(), CredentialError>;
}

/// Remove the bearer credential and user snapshot together.
///
/// Removal failures are logged, not propagated: session invalidation
/// must never abort the request that detected it.
pub fn purge_session(store: &dyn CredentialStore) {
    for key in [AUTH_TOKEN_KEY, USER_SNAPSHOT_KEY] {
        match store.remove(key) {
            Ok(()) => debug!(key, "removed persisted credential"),
            Err(err) => warn!(key, error = %err, "failed to remove persisted credential"),
        }
    }
}

/// Credential store backed by the platform keyring.
pub struct KeyringCredentialStore {
    service: String,
}

impl KeyringCredentialStore {
    /// `service` scopes entries in the platform keyring.
    pub fn new(service: impl Into<String>) -> Self {
        Self { service: service.into() }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, CredentialError> {
        keyring::Entry::new(&self.service, key)
            .map_err(|e| CredentialError::Backend(e.to_string()))
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>, CredentialError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(CredentialError::Backend(err.to_string())),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CredentialError> {
        self.entry(key)?
            .set_password(value)
            .map_err(|e| CredentialError::Backend(e.to_string()))
    }

    fn remove(&self, key: &str) -> Result<(), CredentialError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(CredentialError::Backend(err.to_string())),
        }
    }
}

/// In-memory credential store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>, CredentialError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CredentialError> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CredentialError> {
        self.values.lock().remove(key);
        Ok(())
    }
}
