//! Environment variable credential store.
//!
//! A read-only store that checks environment variables. It sits first in
//! the resolution chain: env vars override every other backend.
//!
//! Lookup order for a credential `NAME`:
//! 1. `REVLENS_NAME`
//! 2. `NAME`

use revlens_core::credential::CredentialStore;
use revlens_types::error::RepositoryError;

/// Prefix checked before the bare variable name.
pub const ENV_PREFIX: &str = "REVLENS_";

/// Environment variable credential store.
///
/// Read-only: `set()` and `clear()` return an error because environment
/// variables cannot be persistently modified.
#[derive(Debug, Default)]
pub struct EnvCredentialStore;

impl EnvCredentialStore {
    pub fn new() -> Self {
        Self
    }
}

fn read_var(name: &str) -> Option<String> {
    // Non-Unicode values are treated as absent; credentials must be strings.
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl CredentialStore for EnvCredentialStore {
    fn name(&self) -> &str {
        "env"
    }

    async fn get(&self, name: &str) -> Result<Option<String>, RepositoryError> {
        Ok(read_var(&format!("{ENV_PREFIX}{name}")).or_else(|| read_var(name)))
    }

    async fn set(&self, _name: &str, _value: &str) -> Result<(), RepositoryError> {
        Err(RepositoryError::Query(
            "environment variable store is read-only".to_string(),
        ))
    }

    async fn clear(&self, _name: &str) -> Result<(), RepositoryError> {
        Err(RepositoryError::Query(
            "environment variable store is read-only".to_string(),
        ))
    }
}
