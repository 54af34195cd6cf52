//! SessionRepository: the session record list.
//!
//! All records live in one collection blob; every mutation reads the whole
//! list, edits it in memory, and writes it back. Records keep their
//! insertion position so that equal `saved_at` values evict in insertion
//! order.

use std::collections::HashSet;
use std::sync::Arc;

use revlens_types::error::RepositoryError;
use revlens_types::session::{SessionKey, SessionRecord};
use revlens_types::storage::SESSIONS_COLLECTION;

use crate::storage::collection;
use crate::storage::kv_store::KeyValueStore;

pub struct SessionRepository<S: KeyValueStore> {
    store: Arc<S>,
}

impl<S: KeyValueStore> SessionRepository<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn get_all(&self) -> Result<Vec<SessionRecord>, RepositoryError> {
        collection::load(self.store.as_ref(), SESSIONS_COLLECTION).await
    }

    pub async fn get(&self, key: &SessionKey) -> Result<Option<SessionRecord>, RepositoryError> {
        Ok(self.get_all().await?.into_iter().find(|r| &r.key == key))
    }

    /// Insert a new record or replace the existing one for the same key in place.
    pub async fn upsert(&self, record: SessionRecord) -> Result<(), RepositoryError> {
        let mut records = self.get_all().await?;
        match records.iter_mut().find(|r| r.key == record.key) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        collection::save(self.store.as_ref(), SESSIONS_COLLECTION, &records).await
    }

    /// Remove every record whose key is in `keys`.
    ///
    /// Returns how many records were removed. Nothing is written when no
    /// key matched.
    pub async fn remove_batch(&self, keys: &[SessionKey]) -> Result<usize, RepositoryError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let doomed: HashSet<&SessionKey> = keys.iter().collect();
        let mut records = self.get_all().await?;
        let before = records.len();
        records.retain(|r| !doomed.contains(&r.key));
        let removed = before - records.len();
        if removed > 0 {
            collection::save(self.store.as_ref(), SESSIONS_COLLECTION, &records).await?;
        }
        Ok(removed)
    }
}
