//! RecencyRepository: capped "recently viewed" index.
//!
//! Capped independently of the session cache. Entries are kept
//! most-recent-first; trimming drops the globally-oldest by `touched_at`.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use revlens_types::error::RepositoryError;
use revlens_types::recency::RecencyEntry;
use revlens_types::session::SessionKey;
use revlens_types::storage::RECENT_SESSIONS_COLLECTION;

use crate::storage::collection;
use crate::storage::kv_store::KeyValueStore;

pub struct RecencyRepository<S: KeyValueStore> {
    store: Arc<S>,
    cap: usize,
}

impl<S: KeyValueStore> RecencyRepository<S> {
    /// `cap` below 1 is treated as 1.
    pub fn new(store: Arc<S>, cap: usize) -> Self {
        Self {
            store,
            cap: cap.max(1),
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    async fn load(&self) -> Result<Vec<RecencyEntry>, RepositoryError> {
        collection::load(self.store.as_ref(), RECENT_SESSIONS_COLLECTION).await
    }

    async fn write(&self, entries: &[RecencyEntry]) -> Result<(), RepositoryError> {
        collection::save(self.store.as_ref(), RECENT_SESSIONS_COLLECTION, &entries).await
    }

    /// Upsert `key` with timestamp `now`, trimming the oldest entries to
    /// `cap - 1` before inserting.
    pub async fn touch(
        &self,
        key: &SessionKey,
        title: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut entries = self.load().await?;
        entries.retain(|e| &e.key != key);

        if entries.len() >= self.cap {
            // Stable sort: ties keep their stored (most-recent-first) order.
            entries.sort_by(|a, b| b.touched_at.cmp(&a.touched_at));
            let dropped = entries.len() - (self.cap - 1);
            entries.truncate(self.cap - 1);
            tracing::debug!(dropped, cap = self.cap, "trimmed recency index");
        }

        entries.push(RecencyEntry {
            key: key.clone(),
            title: title.to_string(),
            touched_at: now,
        });
        entries.sort_by(|a, b| b.touched_at.cmp(&a.touched_at));
        self.write(&entries).await
    }

    /// Entries ordered most-recent-first.
    pub async fn list(&self) -> Result<Vec<RecencyEntry>, RepositoryError> {
        let mut entries = self.load().await?;
        entries.sort_by(|a, b| b.touched_at.cmp(&a.touched_at));
        Ok(entries)
    }

    pub async fn keys(&self) -> Result<Vec<SessionKey>, RepositoryError> {
        Ok(self.load().await?.into_iter().map(|e| e.key).collect())
    }

    pub async fn remove(&self, key: &SessionKey) -> Result<(), RepositoryError> {
        self.remove_batch(std::slice::from_ref(key)).await
    }

    /// Drop entries for all `keys` in a single write. No write when none matched.
    pub async fn remove_batch(&self, keys: &[SessionKey]) -> Result<(), RepositoryError> {
        if keys.is_empty() {
            return Ok(());
        }
        let doomed: HashSet<&SessionKey> = keys.iter().collect();
        let mut entries = self.load().await?;
        let before = entries.len();
        entries.retain(|e| !doomed.contains(&e.key));
        if entries.len() != before {
            self.write(&entries).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::{Clock, ManualClock};
    use crate::storage::memory::InMemoryKvStore;

    fn key(n: usize) -> SessionKey {
        SessionKey::from(format!("github.com/acme/widgets/{n}"))
    }

    #[tokio::test]
    async fn test_cap_keeps_most_recent_in_order() {
        let repo = RecencyRepository::new(Arc::new(InMemoryKvStore::new()), 10);
        let clock = ManualClock::default();

        for n in 0..15 {
            repo.touch(&key(n), &format!("PR {n}"), clock.now()).await.unwrap();
        }

        let listed: Vec<SessionKey> = repo.list().await.unwrap().into_iter().map(|e| e.key).collect();
        let expected: Vec<SessionKey> = (5..15).rev().map(key).collect();
        assert_eq!(listed, expected);
    }

    #[tokio::test]
    async fn test_retouch_moves_to_front_without_trimming() {
        let repo = RecencyRepository::new(Arc::new(InMemoryKvStore::new()), 3);
        let clock = ManualClock::default();

        for n in 0..3 {
            repo.touch(&key(n), "t", clock.now()).await.unwrap();
        }
        repo.touch(&key(0), "renamed", clock.now()).await.unwrap();

        let listed = repo.list().await.unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].key, key(0));
        assert_eq!(listed[0].title, "renamed");
        assert_eq!(listed[2].key, key(1));
    }

    #[tokio::test]
    async fn test_remove_batch() {
        let repo = RecencyRepository::new(Arc::new(InMemoryKvStore::new()), 10);
        let clock = ManualClock::default();
        for n in 0..4 {
            repo.touch(&key(n), "t", clock.now()).await.unwrap();
        }

        repo.remove_batch(&[key(1), key(3), key(99)]).await.unwrap();

        let keys = repo.keys().await.unwrap();
        assert_eq!(keys.len(), 2);
        assert!(!keys.contains(&key(1)));
        assert!(!keys.contains(&key(3)));
    }

    #[test]
    fn test_zero_cap_is_clamped() {
        let repo = RecencyRepository::new(Arc::new(InMemoryKvStore::new()), 0);
        assert_eq!(repo.cap(), 1);
    }
}
