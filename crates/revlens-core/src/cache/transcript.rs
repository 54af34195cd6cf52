//! ChatTranscriptRepository: per-session, per-file chat transcripts.
//!
//! Stored as one blob mapping session key → file path → turns. Reads for
//! unknown keys or files return empty values, never `None`. Empty
//! transcripts are not stored.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use revlens_types::chat::{ChatTurn, FileTranscripts};
use revlens_types::error::RepositoryError;
use revlens_types::session::SessionKey;
use revlens_types::storage::CHAT_HISTORIES_COLLECTION;

use crate::storage::collection;
use crate::storage::kv_store::KeyValueStore;

type AllTranscripts = BTreeMap<SessionKey, FileTranscripts>;

pub struct ChatTranscriptRepository<S: KeyValueStore> {
    store: Arc<S>,
}

impl<S: KeyValueStore> ChatTranscriptRepository<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    async fn load(&self) -> Result<AllTranscripts, RepositoryError> {
        collection::load(self.store.as_ref(), CHAT_HISTORIES_COLLECTION).await
    }

    async fn write(&self, all: &AllTranscripts) -> Result<(), RepositoryError> {
        collection::save(self.store.as_ref(), CHAT_HISTORIES_COLLECTION, all).await
    }

    /// Replace every transcript for `key` with `transcripts`.
    ///
    /// Existing files not present in `transcripts` are dropped.
    pub async fn save_all(
        &self,
        key: &SessionKey,
        transcripts: FileTranscripts,
    ) -> Result<(), RepositoryError> {
        let mut all = self.load().await?;
        all.remove(key);
        let transcripts: FileTranscripts = transcripts
            .into_iter()
            .filter(|(_, turns)| !turns.is_empty())
            .collect();
        if !transcripts.is_empty() {
            all.insert(key.clone(), transcripts);
        }
        self.write(&all).await
    }

    /// Replace the turns of exactly one file, leaving sibling files untouched.
    pub async fn save_one(
        &self,
        key: &SessionKey,
        file_path: &str,
        turns: Vec<ChatTurn>,
    ) -> Result<(), RepositoryError> {
        let mut all = self.load().await?;
        if turns.is_empty() {
            if let Some(files) = all.get_mut(key) {
                files.remove(file_path);
                if files.is_empty() {
                    all.remove(key);
                }
            }
        } else {
            all.entry(key.clone())
                .or_default()
                .insert(file_path.to_string(), turns);
        }
        self.write(&all).await
    }

    /// Append one turn to a file's transcript, creating it lazily.
    pub async fn append(
        &self,
        key: &SessionKey,
        file_path: &str,
        turn: ChatTurn,
    ) -> Result<(), RepositoryError> {
        let mut all = self.load().await?;
        all.entry(key.clone())
            .or_default()
            .entry(file_path.to_string())
            .or_default()
            .push(turn);
        self.write(&all).await
    }

    pub async fn get_all(&self, key: &SessionKey) -> Result<FileTranscripts, RepositoryError> {
        Ok(self.load().await?.remove(key).unwrap_or_default())
    }

    pub async fn get_one(
        &self,
        key: &SessionKey,
        file_path: &str,
    ) -> Result<Vec<ChatTurn>, RepositoryError> {
        Ok(self
            .get_all(key)
            .await?
            .remove(file_path)
            .unwrap_or_default())
    }

    /// Session keys that currently own at least one transcript.
    pub async fn keys(&self) -> Result<Vec<SessionKey>, RepositoryError> {
        Ok(self.load().await?.into_keys().collect())
    }

    pub async fn remove_for_key(&self, key: &SessionKey) -> Result<(), RepositoryError> {
        self.remove_for_keys(std::slice::from_ref(key)).await
    }

    /// Drop transcripts for all `keys` in a single write.
    pub async fn remove_for_keys(&self, keys: &[SessionKey]) -> Result<(), RepositoryError> {
        if keys.is_empty() {
            return Ok(());
        }
        let doomed: HashSet<&SessionKey> = keys.iter().collect();
        let mut all = self.load().await?;
        let before = all.len();
        all.retain(|k, _| !doomed.contains(k));
        if all.len() != before {
            self.write(&all).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::InMemoryKvStore;

    fn repo() -> ChatTranscriptRepository<InMemoryKvStore> {
        ChatTranscriptRepository::new(Arc::new(InMemoryKvStore::new()))
    }

    fn key() -> SessionKey {
        SessionKey::from("github.com/acme/widgets/1")
    }

    #[tokio::test]
    async fn test_save_one_leaves_siblings_untouched() {
        let repo = repo();
        let turns_a = vec![ChatTurn::user("why?"), ChatTurn::assistant("because")];
        let turns_b = vec![ChatTurn::user("and b?")];

        repo.save_one(&key(), "a.ts", turns_a.clone()).await.unwrap();
        repo.save_one(&key(), "b.ts", turns_b.clone()).await.unwrap();

        assert_eq!(repo.get_one(&key(), "a.ts").await.unwrap(), turns_a);
        assert_eq!(repo.get_one(&key(), "b.ts").await.unwrap(), turns_b);
    }

    #[tokio::test]
    async fn test_save_all_drops_stale_files() {
        let repo = repo();
        repo.save_one(&key(), "old.ts", vec![ChatTurn::user("x")]).await.unwrap();

        let mut fresh = FileTranscripts::new();
        fresh.insert("new.ts".to_string(), vec![ChatTurn::user("y")]);
        repo.save_all(&key(), fresh).await.unwrap();

        let all = repo.get_all(&key()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all.contains_key("new.ts"));
        assert!(repo.get_one(&key(), "old.ts").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_all_empty_clears_key() {
        let repo = repo();
        repo.save_one(&key(), "a.ts", vec![ChatTurn::user("x")]).await.unwrap();
        repo.save_all(&key(), FileTranscripts::new()).await.unwrap();
        assert!(repo.get_all(&key()).await.unwrap().is_empty());
        assert!(repo.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_reads_are_empty() {
        let repo = repo();
        assert!(repo.get_all(&key()).await.unwrap().is_empty());
        assert!(repo.get_one(&key(), "nothing.rs").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_creates_lazily() {
        let repo = repo();
        repo.append(&key(), "a.ts", ChatTurn::user("one")).await.unwrap();
        repo.append(&key(), "a.ts", ChatTurn::assistant("two")).await.unwrap();
        let turns = repo.get_one(&key(), "a.ts").await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].text, "two");
    }

    #[tokio::test]
    async fn test_remove_for_keys() {
        let repo = repo();
        let other = SessionKey::from("github.com/acme/widgets/2");
        repo.append(&key(), "a.ts", ChatTurn::user("one")).await.unwrap();
        repo.append(&other, "a.ts", ChatTurn::user("two")).await.unwrap();

        repo.remove_for_keys(&[key()]).await.unwrap();

        assert!(repo.get_all(&key()).await.unwrap().is_empty());
        assert_eq!(repo.get_one(&other, "a.ts").await.unwrap().len(), 1);
    }
}
