//! OS keychain credential store.
//!
//! Uses the `keyring` crate to store/retrieve credentials via:
//! - macOS Keychain
//! - Linux Secret Service (GNOME Keyring, KDE Wallet)
//! - Windows Credential Manager

use revlens_core::credential::CredentialStore;
use revlens_types::error::RepositoryError;

/// Default keychain service name.
pub const SERVICE_NAME: &str = "revlens";

/// OS keychain credential store using the `keyring` crate.
///
/// Each credential is one keychain entry under the service name, with the
/// credential name as the account.
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service_name: String,
}

impl KeyringCredentialStore {
    pub fn new() -> Self {
        Self {
            service_name: SERVICE_NAME.to_string(),
        }
    }

    /// Use a custom service name (useful for testing).
    pub fn with_service(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    fn entry(&self, name: &str) -> Result<keyring::Entry, RepositoryError> {
        keyring::Entry::new(&self.service_name, name)
            .map_err(|e| RepositoryError::Query(format!("keychain entry error: {e}")))
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn name(&self) -> &str {
        "keychain"
    }

    async fn get(&self, name: &str) -> Result<Option<String>, RepositoryError> {
        let entry = self.entry(name)?;

        match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(RepositoryError::Query(format!("keychain get error: {e}"))),
        }
    }

    async fn set(&self, name: &str, value: &str) -> Result<(), RepositoryError> {
        self.entry(name)?
            .set_password(value)
            .map_err(|e| RepositoryError::Query(format!("keychain set error: {e}")))
    }

    async fn clear(&self, name: &str) -> Result<(), RepositoryError> {
        match self.entry(name)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(RepositoryError::Query(format!("keychain delete error: {e}"))),
        }
    }
}
