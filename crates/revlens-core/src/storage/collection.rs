//! Versioned whole-collection codec.
//!
//! Every cache collection is read in full, mutated in memory, and written
//! back in full inside a [`StoredCollection`] envelope. Reading accepts the
//! current envelope and the unversioned legacy shape; anything else is
//! reported as [`RepositoryError::IncompatibleSchema`] and left untouched.

use serde::Serialize;
use serde::de::DeserializeOwned;

use revlens_types::error::RepositoryError;
use revlens_types::storage::{SCHEMA_VERSION, StoredCollection};

use super::kv_store::KeyValueStore;

/// Load a collection, returning `T::default()` when nothing is stored.
pub async fn load<S, T>(store: &S, name: &str) -> Result<T, RepositoryError>
where
    S: KeyValueStore + ?Sized,
    T: DeserializeOwned + Default,
{
    match store.get(name).await? {
        Some(raw) => decode(name, raw),
        None => Ok(T::default()),
    }
}

/// Write a whole collection in the current envelope.
pub async fn save<S, T>(store: &S, name: &str, items: &T) -> Result<(), RepositoryError>
where
    S: KeyValueStore + ?Sized,
    T: Serialize,
{
    let value = serde_json::to_value(StoredCollection::current(items))
        .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
    store.set(name, &value).await
}

fn decode<T: DeserializeOwned>(name: &str, raw: serde_json::Value) -> Result<T, RepositoryError> {
    let incompatible = |found: String| RepositoryError::IncompatibleSchema {
        collection: name.to_string(),
        found,
    };

    let version = match &raw {
        serde_json::Value::Object(map) => map.get("schema_version").cloned(),
        _ => None,
    };

    match version {
        Some(version) => {
            let version = version
                .as_u64()
                .ok_or_else(|| incompatible(format!("schema_version {version}")))?;
            if version != u64::from(SCHEMA_VERSION) {
                return Err(incompatible(format!("schema_version {version}")));
            }
            serde_json::from_value::<StoredCollection<T>>(raw)
                .map(|envelope| envelope.items)
                .map_err(|e| incompatible(format!("schema_version {version}: {e}")))
        }
        // Unversioned legacy shape; rewritten in the current envelope on next save.
        None => serde_json::from_value::<T>(raw)
            .map_err(|e| incompatible(format!("unversioned: {e}"))),
    }
}
