//! In-process key-value store.
//!
//! Backs tests and ephemeral sessions. Can be told to yield between the
//! phases of every call (to surface interleavings) and to fail writes for
//! chosen names (to exercise partial-failure paths).

use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::{DashMap, DashSet};

use revlens_types::error::RepositoryError;

use super::kv_store::KeyValueStore;

/// `DashMap`-backed implementation of [`KeyValueStore`].
#[derive(Default)]
pub struct InMemoryKvStore {
    values: DashMap<String, serde_json::Value>,
    failing_writes: DashSet<String>,
    yield_between_ops: AtomicBool,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Yield to the scheduler before each operation completes.
    pub fn with_yielding(self) -> Self {
        self.yield_between_ops.store(true, Ordering::Relaxed);
        self
    }

    /// Make every `set`/`remove` on `name` fail until [`Self::clear_failures`].
    pub fn fail_writes_to(&self, name: &str) {
        self.failing_writes.insert(name.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing_writes.clear();
    }

    /// Raw stored value, bypassing any decoding.
    pub fn raw(&self, name: &str) -> Option<serde_json::Value> {
        self.values.get(name).map(|v| v.value().clone())
    }

    async fn maybe_yield(&self) {
        if self.yield_between_ops.load(Ordering::Relaxed) {
            tokio::task::yield_now().await;
        }
    }

    fn check_writable(&self, name: &str) -> Result<(), RepositoryError> {
        if self.failing_writes.contains(name) {
            return Err(RepositoryError::Query(format!("write to '{name}' rejected")));
        }
        Ok(())
    }
}

impl KeyValueStore for InMemoryKvStore {
    async fn get(&self, name: &str) -> Result<Option<serde_json::Value>, RepositoryError> {
        let value = self.values.get(name).map(|v| v.value().clone());
        self.maybe_yield().await;
        Ok(value)
    }

    async fn set(&self, name: &str, value: &serde_json::Value) -> Result<(), RepositoryError> {
        self.maybe_yield().await;
        self.check_writable(name)?;
        self.values.insert(name.to_string(), value.clone());
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<(), RepositoryError> {
        self.maybe_yield().await;
        self.check_writable(name)?;
        self.values.remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let store = InMemoryKvStore::new();
        let value = serde_json::json!({"theme": "dark"});
        store.set("settings", &value).await.unwrap();
        assert_eq!(store.get("settings").await.unwrap(), Some(value));
    }

    #[tokio::test]
    async fn test_remove_missing_is_noop() {
        let store = InMemoryKvStore::new();
        store.remove("nope").await.unwrap();
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failing_writes() {
        let store = InMemoryKvStore::new();
        store.fail_writes_to("locked");
        assert!(store.set("locked", &serde_json::json!(1)).await.is_err());
        assert!(store.set("open", &serde_json::json!(1)).await.is_ok());

        store.clear_failures();
        assert!(store.set("locked", &serde_json::json!(1)).await.is_ok());
    }
}
