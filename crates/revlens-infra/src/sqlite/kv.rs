//! SQLite key-value store implementation.
//!
//! Implements `KeyValueStore` from `revlens-core` using sqlx with split
//! read/write pools. Values are stored as JSON text and parsed on read.

use chrono::{DateTime, Utc};
use revlens_core::storage::kv_store::KeyValueStore;
use revlens_types::error::RepositoryError;
use revlens_types::storage::StoreEntry;
use sqlx::Row;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `KeyValueStore`.
pub struct SqliteKvStore {
    pool: DatabasePool,
}

impl SqliteKvStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// List every stored name with its size and last write time.
    pub async fn entries(&self) -> Result<Vec<StoreEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT name, LENGTH(value) AS bytes, updated_at FROM kv_store ORDER BY name",
        )
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row
                .try_get("name")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            let bytes: i64 = row
                .try_get("bytes")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            let updated_at: String = row
                .try_get("updated_at")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            entries.push(StoreEntry {
                name,
                bytes: usize::try_from(bytes).unwrap_or_default(),
                updated_at: parse_datetime(&updated_at)?,
            });
        }
        Ok(entries)
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

impl KeyValueStore for SqliteKvStore {
    async fn get(&self, name: &str) -> Result<Option<serde_json::Value>, RepositoryError> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let value_str: String = row
                    .try_get("value")
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                let value: serde_json::Value = serde_json::from_str(&value_str).map_err(|e| {
                    RepositoryError::Serialization(format!("invalid JSON under '{name}': {e}"))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, name: &str, value: &serde_json::Value) -> Result<(), RepositoryError> {
        let now = format_datetime(&Utc::now());
        let value_str = serde_json::to_string(value)
            .map_err(|e| RepositoryError::Serialization(format!("failed to serialize value: {e}")))?;

        sqlx::query(
            r#"INSERT INTO kv_store (name, value, created_at, updated_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT (name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at"#,
        )
        .bind(name)
        .bind(&value_str)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM kv_store WHERE name = ?")
            .bind(name)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use revlens_core::cache::ReviewCacheService;
    use revlens_types::chat::ChatTurn;
    use revlens_types::config::CacheConfig;
    use revlens_types::session::{HostKind, SessionIdentifier, SessionSnapshot};
    use revlens_types::storage::SESSIONS_COLLECTION;

    async fn test_pool() -> (tempfile::TempDir, DatabasePool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::open_in(dir.path()).await.unwrap();
        (dir, pool)
    }

    fn snapshot(number: u64) -> SessionSnapshot {
        SessionSnapshot {
            identifier: SessionIdentifier {
                kind: HostKind::GitHub,
                host: "github.com".to_string(),
                owner: "acme".to_string(),
                repo: "widgets".to_string(),
                number,
            },
            title: format!("Change {number}"),
            description: String::new(),
            author: "octocat".to_string(),
            state: Default::default(),
            files: vec![],
            review_comments: vec![],
            instructions: None,
            readme: None,
        }
    }

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let (_dir, pool) = test_pool().await;
        let store = SqliteKvStore::new(pool);

        let value = serde_json::json!({"schema_version": 1, "items": [{"a": 1}]});
        store.set("revlens.test", &value).await.unwrap();

        let got = store.get("revlens.test").await.unwrap();
        assert_eq!(got, Some(value));
    }

    #[tokio::test]
    async fn test_get_nonexistent_returns_none() {
        let (_dir, pool) = test_pool().await;
        let store = SqliteKvStore::new(pool);

        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_upserts() {
        let (_dir, pool) = test_pool().await;
        let store = SqliteKvStore::new(pool);

        store.set("counter", &serde_json::json!(1)).await.unwrap();
        store.set("counter", &serde_json::json!(2)).await.unwrap();

        assert_eq!(store.get("counter").await.unwrap(), Some(serde_json::json!(2)));
        assert_eq!(store.entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_and_remove_nonexistent() {
        let (_dir, pool) = test_pool().await;
        let store = SqliteKvStore::new(pool);

        store.set("temp", &serde_json::json!("value")).await.unwrap();
        store.remove("temp").await.unwrap();
        assert!(store.get("temp").await.unwrap().is_none());

        // Should not error
        store.remove("nope").await.unwrap();
    }

    #[tokio::test]
    async fn test_entries_sorted_with_sizes() {
        let (_dir, pool) = test_pool().await;
        let store = SqliteKvStore::new(pool);

        store.set("beta", &serde_json::json!("bb")).await.unwrap();
        store.set("alpha", &serde_json::json!(1)).await.unwrap();

        let entries = store.entries().await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
        assert_eq!(entries[0].bytes, 1);
        assert_eq!(entries[1].bytes, 4);
        assert!(entries[0].updated_at <= Utc::now());
    }

    #[tokio::test]
    async fn test_corrupt_value_is_serialization_error() {
        let (_dir, pool) = test_pool().await;
        sqlx::query(
            "INSERT INTO kv_store (name, value, created_at, updated_at) VALUES ('bad', '{not json', ?, ?)",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(&pool.writer)
        .await
        .unwrap();
        let store = SqliteKvStore::new(pool);

        let err = store.get("bad").await.unwrap_err();
        assert!(matches!(err, RepositoryError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_cache_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let key = snapshot(1).key();
        {
            let store = Arc::new(SqliteKvStore::new(DatabasePool::open_in(dir.path()).await.unwrap()));
            let cache = ReviewCacheService::new(store, CacheConfig::default());
            cache.save(&key, snapshot(1), None).await.unwrap();
            cache
                .append_turn(&key, "src/lib.rs", ChatTurn::user("why?"))
                .await
                .unwrap();
        }

        let store = Arc::new(SqliteKvStore::new(DatabasePool::open_in(dir.path()).await.unwrap()));
        let cache = ReviewCacheService::new(Arc::clone(&store), CacheConfig::default());
        let record = cache.get(&key).await.unwrap().unwrap();
        assert_eq!(record.snapshot.title, "Change 1");
        assert_eq!(cache.transcript(&key, "src/lib.rs").await.unwrap().len(), 1);
        assert_eq!(cache.recent().await.unwrap()[0].key, key);
        assert!(store.get(SESSIONS_COLLECTION).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_cache_eviction_over_sqlite() {
        let (_dir, pool) = test_pool().await;
        let cache = ReviewCacheService::new(
            Arc::new(SqliteKvStore::new(pool)),
            CacheConfig::new(2, 10),
        );

        for n in 1..=3 {
            cache.save(&snapshot(n).key(), snapshot(n), None).await.unwrap();
        }

        let keys: Vec<_> = cache
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.snapshot.identifier.number)
            .collect();
        assert_eq!(keys.len(), 2);
        assert!(!keys.contains(&1));
    }
}
