//! Key-value store trait.
//!
//! Defines the interface for the process-wide persistent store that backs
//! every cache collection. Implementations live in revlens-infra (SQLite)
//! and in [`super::memory`] (in-process).

use revlens_types::error::RepositoryError;

/// Trait for a persistent name → JSON value store.
///
/// No atomicity is assumed across names; each call stands alone.
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait KeyValueStore: Send + Sync {
    /// Get a value by name. Returns None if the name does not exist.
    fn get(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Option<serde_json::Value>, RepositoryError>> + Send;

    /// Set a value for a name (upsert).
    fn set(
        &self,
        name: &str,
        value: &serde_json::Value,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Remove a name. No-op if it does not exist.
    fn remove(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
