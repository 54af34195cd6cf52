//! Credential store port and resolution chain.
//!
//! A credential store is an opaque get/set/clear cell per secret name.
//! Only the model-client factory reads from it. Concrete stores
//! (environment, OS keychain) live in revlens-infra.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use revlens_types::error::RepositoryError;

/// Trait for credential storage backends.
pub trait CredentialStore: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &str;

    /// Read a credential. `None` when this store does not hold it.
    fn get(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<String>, RepositoryError>> + Send;

    fn set(
        &self,
        name: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Remove a credential. No-op when absent.
    fn clear(&self, name: &str) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// Object-safe mirror of [`CredentialStore`].
pub trait CredentialStoreDyn: Send + Sync {
    fn name(&self) -> &str;

    fn get_boxed<'a>(
        &'a self,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, RepositoryError>> + Send + 'a>>;

    fn set_boxed<'a>(
        &'a self,
        name: &'a str,
        value: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), RepositoryError>> + Send + 'a>>;

    fn clear_boxed<'a>(
        &'a self,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), RepositoryError>> + Send + 'a>>;
}

impl<T: CredentialStore> CredentialStoreDyn for T {
    fn name(&self) -> &str {
        CredentialStore::name(self)
    }

    fn get_boxed<'a>(
        &'a self,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, RepositoryError>> + Send + 'a>> {
        Box::pin(self.get(name))
    }

    fn set_boxed<'a>(
        &'a self,
        name: &'a str,
        value: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), RepositoryError>> + Send + 'a>> {
        Box::pin(self.set(name, value))
    }

    fn clear_boxed<'a>(
        &'a self,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), RepositoryError>> + Send + 'a>> {
        Box::pin(self.clear(name))
    }
}

pub type DynCredentialStore = Arc<dyn CredentialStoreDyn>;

/// Ordered list of credential stores; first match wins on read.
#[derive(Clone, Default)]
pub struct CredentialChain {
    stores: Vec<DynCredentialStore>,
}

impl CredentialChain {
    /// Stores ordered by precedence, highest first.
    pub fn new(stores: Vec<DynCredentialStore>) -> Self {
        Self { stores }
    }

    pub fn store_names(&self) -> Vec<&str> {
        self.stores.iter().map(|s| s.name()).collect()
    }

    /// Resolve a credential through the chain.
    ///
    /// A failing store is logged and skipped so that a broken keychain does
    /// not mask a usable environment variable.
    pub async fn resolve(&self, name: &str) -> Option<String> {
        for store in &self.stores {
            match store.get_boxed(name).await {
                Ok(Some(value)) => {
                    tracing::debug!(credential = name, store = store.name(), "credential resolved");
                    return Some(value);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(credential = name, store = store.name(), error = %e, "credential store failed");
                }
            }
        }
        None
    }

    /// Write to the first store that accepts the write.
    pub async fn set(&self, name: &str, value: &str) -> Result<(), RepositoryError> {
        let mut last_err = None;
        for store in &self.stores {
            match store.set_boxed(name, value).await {
                Ok(()) => return Ok(()),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| RepositoryError::Query("no credential store configured".to_string())))
    }

    /// Clear the credential from every writable store.
    pub async fn clear(&self, name: &str) -> Result<(), RepositoryError> {
        let mut cleared = false;
        let mut last_err = None;
        for store in &self.stores {
            match store.clear_boxed(name).await {
                Ok(()) => cleared = true,
                Err(e) => last_err = Some(e),
            }
        }
        match (cleared, last_err) {
            (false, Some(e)) => Err(e),
            _ => Ok(()),
        }
    }
}
