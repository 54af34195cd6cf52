//! ReviewCacheService: the bounded, cross-store session cache.
//!
//! Coordinates [`SessionRepository`], [`ChatTranscriptRepository`] and
//! [`RecencyRepository`] so that, after every operation completes:
//!
//! - the session store holds at most `cache_cap` records, evicting the
//!   oldest by `saved_at` before a new key is stored;
//! - the recency index holds at most `recency_cap` entries;
//! - removing or evicting a key removes its transcripts and recency entry;
//! - analysis-only updates never drop the snapshot or create a key;
//! - replacing one file's transcript never touches its siblings.
//!
//! Within one call the stores are touched in a fixed order: sessions,
//! then transcripts, then recency. A failure part-way leaves the session
//! store as the source of truth; [`ReviewCacheService::sweep_orphans`]
//! removes anything left behind.
//!
//! All mutations are serialized through one async write gate. Each
//! collection is a single blob shared by every key, so the gate is
//! service-wide. Reads do not take it.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;

use revlens_types::analysis::AnalysisResult;
use revlens_types::chat::{ChatTurn, FileTranscripts};
use revlens_types::config::CacheConfig;
use revlens_types::error::RepositoryError;
use revlens_types::recency::RecencyEntry;
use revlens_types::session::{SessionKey, SessionRecord, SessionSnapshot};

use super::clock::{Clock, SystemClock};
use super::recency::RecencyRepository;
use super::session::SessionRepository;
use super::transcript::ChatTranscriptRepository;
use crate::storage::kv_store::KeyValueStore;

/// Counts of what [`ReviewCacheService::sweep_orphans`] removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub transcripts: usize,
    pub recency_entries: usize,
}

pub struct ReviewCacheService<S: KeyValueStore> {
    sessions: SessionRepository<S>,
    transcripts: ChatTranscriptRepository<S>,
    recency: RecencyRepository<S>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    write_gate: Mutex<()>,
}

impl<S: KeyValueStore> ReviewCacheService<S> {
    pub fn new(store: Arc<S>, config: CacheConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<S>, config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let config = config.normalized();
        Self {
            sessions: SessionRepository::new(Arc::clone(&store)),
            transcripts: ChatTranscriptRepository::new(Arc::clone(&store)),
            recency: RecencyRepository::new(store, config.recency_cap),
            config,
            clock,
            write_gate: Mutex::new(()),
        }
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    // -- Sessions --------------------------------------------------------

    /// Store `snapshot` under `key`, first evicting the oldest other
    /// sessions until the store fits `cache_cap` with `key` in it.
    ///
    /// When `analysis` is `None` any existing analysis is preserved.
    pub async fn save(
        &self,
        key: &SessionKey,
        snapshot: SessionSnapshot,
        analysis: Option<AnalysisResult>,
    ) -> Result<SessionRecord, RepositoryError> {
        let _gate = self.write_gate.lock().await;

        let records = self.sessions.get_all().await?;
        let existing = records.iter().position(|r| &r.key == key);
        let previous_analysis = existing.and_then(|idx| records[idx].analysis.clone());

        // A lowered cap can leave the store over it even when `key` exists.
        let incoming = usize::from(existing.is_none());
        let excess = (records.len() + incoming).saturating_sub(self.config.cache_cap);
        if excess > 0 {
            let mut candidates: Vec<&SessionRecord> =
                records.iter().filter(|r| &r.key != key).collect();
            // Stable: equal timestamps evict in storage order.
            candidates.sort_by_key(|r| r.saved_at);
            let evicted: Vec<SessionKey> = candidates
                .into_iter()
                .take(excess)
                .map(|r| r.key.clone())
                .collect();
            tracing::info!(
                key = %key,
                evicted = evicted.len(),
                cap = self.config.cache_cap,
                "evicting oldest sessions"
            );
            self.remove_batch_unlocked(&evicted).await?;
        }

        let now = self.clock.now();
        let title = snapshot.title.clone();
        let record = SessionRecord {
            key: key.clone(),
            snapshot,
            analysis: analysis.or(previous_analysis),
            saved_at: now,
        };
        self.sessions.upsert(record.clone()).await?;
        self.recency.touch(key, &title, now).await?;

        tracing::debug!(key = %key, replaced = existing.is_some(), "saved session");
        Ok(record)
    }

    /// Replace the analysis of an existing record and refresh `saved_at`.
    ///
    /// No-op when `key` is not cached.
    pub async fn update_analysis_result(
        &self,
        key: &SessionKey,
        analysis: AnalysisResult,
    ) -> Result<(), RepositoryError> {
        self.update_analysis_with(key, |_| analysis).await.map(|_| ())
    }

    /// Read-modify-write the analysis of an existing record under the write
    /// gate. Returns the new analysis, or `None` when `key` is not cached.
    pub async fn update_analysis_with<F>(
        &self,
        key: &SessionKey,
        update: F,
    ) -> Result<Option<AnalysisResult>, RepositoryError>
    where
        F: FnOnce(Option<AnalysisResult>) -> AnalysisResult + Send,
    {
        let _gate = self.write_gate.lock().await;

        let Some(mut record) = self.sessions.get(key).await? else {
            tracing::debug!(key = %key, "analysis update for uncached session ignored");
            return Ok(None);
        };

        let analysis = update(record.analysis.take());
        let now = self.clock.now();
        record.analysis = Some(analysis.clone());
        record.saved_at = now;
        let title = record.snapshot.title.clone();

        self.sessions.upsert(record).await?;
        self.recency.touch(key, &title, now).await?;
        Ok(Some(analysis))
    }

    /// Drop the analysis of a cached record, keeping the snapshot.
    pub async fn clear_analysis(&self, key: &SessionKey) -> Result<bool, RepositoryError> {
        let _gate = self.write_gate.lock().await;

        let Some(mut record) = self.sessions.get(key).await? else {
            return Ok(false);
        };
        let now = self.clock.now();
        record.analysis = None;
        record.saved_at = now;
        let title = record.snapshot.title.clone();
        self.sessions.upsert(record).await?;
        self.recency.touch(key, &title, now).await?;
        Ok(true)
    }

    pub async fn get(&self, key: &SessionKey) -> Result<Option<SessionRecord>, RepositoryError> {
        self.sessions.get(key).await
    }

    /// All cached records in storage order.
    pub async fn get_all(&self) -> Result<Vec<SessionRecord>, RepositoryError> {
        self.sessions.get_all().await
    }

    /// Remove `key` from all three stores. Absent keys are a no-op.
    pub async fn remove(&self, key: &SessionKey) -> Result<(), RepositoryError> {
        self.remove_batch(std::slice::from_ref(key)).await
    }

    /// Remove many keys, touching each store once.
    pub async fn remove_batch(&self, keys: &[SessionKey]) -> Result<(), RepositoryError> {
        let _gate = self.write_gate.lock().await;
        self.remove_batch_unlocked(keys).await
    }

    async fn remove_batch_unlocked(&self, keys: &[SessionKey]) -> Result<(), RepositoryError> {
        if keys.is_empty() {
            return Ok(());
        }
        let removed = self.sessions.remove_batch(keys).await?;
        self.transcripts.remove_for_keys(keys).await?;
        self.recency.remove_batch(keys).await?;
        tracing::debug!(requested = keys.len(), removed, "removed sessions");
        Ok(())
    }

    // -- Recency ---------------------------------------------------------

    /// Recently saved sessions, most-recent-first.
    pub async fn recent(&self) -> Result<Vec<RecencyEntry>, RepositoryError> {
        self.recency.list().await
    }

    // -- Transcripts -----------------------------------------------------

    pub async fn transcripts(&self, key: &SessionKey) -> Result<FileTranscripts, RepositoryError> {
        self.transcripts.get_all(key).await
    }

    pub async fn transcript(
        &self,
        key: &SessionKey,
        file_path: &str,
    ) -> Result<Vec<ChatTurn>, RepositoryError> {
        self.transcripts.get_one(key, file_path).await
    }

    /// Replace every transcript of `key`. Passing an empty map resets the
    /// discussion.
    ///
    /// Returns `false` (and writes nothing) when non-empty transcripts are
    /// given for an uncached key.
    pub async fn save_transcripts(
        &self,
        key: &SessionKey,
        transcripts: FileTranscripts,
    ) -> Result<bool, RepositoryError> {
        let _gate = self.write_gate.lock().await;
        let creates = transcripts.values().any(|turns| !turns.is_empty());
        if creates && !self.is_cached(key).await? {
            return Ok(false);
        }
        self.transcripts.save_all(key, transcripts).await?;
        Ok(true)
    }

    /// Replace one file's transcript. Same uncached-key rule as
    /// [`Self::save_transcripts`].
    pub async fn save_transcript(
        &self,
        key: &SessionKey,
        file_path: &str,
        turns: Vec<ChatTurn>,
    ) -> Result<bool, RepositoryError> {
        let _gate = self.write_gate.lock().await;
        if !turns.is_empty() && !self.is_cached(key).await? {
            return Ok(false);
        }
        self.transcripts.save_one(key, file_path, turns).await?;
        Ok(true)
    }

    /// Append one turn to a file's transcript.
    pub async fn append_turn(
        &self,
        key: &SessionKey,
        file_path: &str,
        turn: ChatTurn,
    ) -> Result<bool, RepositoryError> {
        let _gate = self.write_gate.lock().await;
        if !self.is_cached(key).await? {
            return Ok(false);
        }
        self.transcripts.append(key, file_path, turn).await?;
        Ok(true)
    }

    /// Remove the last turn of a file's transcript if it equals `turn`.
    ///
    /// Returns whether a turn was removed.
    pub async fn retract_turn(
        &self,
        key: &SessionKey,
        file_path: &str,
        turn: &ChatTurn,
    ) -> Result<bool, RepositoryError> {
        let _gate = self.write_gate.lock().await;
        let mut turns = self.transcripts.get_one(key, file_path).await?;
        if turns.last() != Some(turn) {
            return Ok(false);
        }
        turns.pop();
        self.transcripts.save_one(key, file_path, turns).await?;
        Ok(true)
    }

    async fn is_cached(&self, key: &SessionKey) -> Result<bool, RepositoryError> {
        let cached = self.sessions.get(key).await?.is_some();
        if !cached {
            tracing::warn!(key = %key, "skipping transcript write for uncached session");
        }
        Ok(cached)
    }

    // -- Maintenance -----------------------------------------------------

    /// Remove transcripts and recency entries whose key is no longer in the
    /// session store (left behind by an interrupted cascade).
    pub async fn sweep_orphans(&self) -> Result<SweepReport, RepositoryError> {
        let _gate = self.write_gate.lock().await;

        let live: HashSet<SessionKey> = self
            .sessions
            .get_all()
            .await?
            .into_iter()
            .map(|r| r.key)
            .collect();

        let orphan_transcripts: Vec<SessionKey> = self
            .transcripts
            .keys()
            .await?
            .into_iter()
            .filter(|k| !live.contains(k))
            .collect();
        self.transcripts.remove_for_keys(&orphan_transcripts).await?;

        let orphan_recency: Vec<SessionKey> = self
            .recency
            .keys()
            .await?
            .into_iter()
            .filter(|k| !live.contains(k))
            .collect();
        self.recency.remove_batch(&orphan_recency).await?;

        let report = SweepReport {
            transcripts: orphan_transcripts.len(),
            recency_entries: orphan_recency.len(),
        };
        if report != SweepReport::default() {
            tracing::info!(
                transcripts = report.transcripts,
                recency_entries = report.recency_entries,
                "swept orphaned cache entries"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;
    use crate::storage::memory::InMemoryKvStore;
    use revlens_types::analysis::{ChecklistItem, ChecklistResult};
    use revlens_types::session::{FileChange, FileStatus, HostKind, SessionIdentifier};
    use revlens_types::storage::{CHAT_HISTORIES_COLLECTION, RECENT_SESSIONS_COLLECTION, SESSIONS_COLLECTION};

    fn snapshot(n: usize) -> SessionSnapshot {
        SessionSnapshot {
            identifier: SessionIdentifier {
                kind: HostKind::GitHub,
                host: "github.com".to_string(),
                owner: "acme".to_string(),
                repo: "widgets".to_string(),
                number: n as u64,
            },
            title: format!("Change {n}"),
            description: String::new(),
            author: "octocat".to_string(),
            state: Default::default(),
            files: vec![FileChange {
                path: "src/lib.rs".to_string(),
                status: FileStatus::Modified,
                diff: "@@ -1 +1 @@\n-a\n+b".to_string(),
                content: None,
                additions: 1,
                deletions: 1,
            }],
            review_comments: vec![],
            instructions: None,
            readme: None,
        }
    }

    fn key(n: usize) -> SessionKey {
        SessionKey::from(format!("k{n}"))
    }

    fn analysis(explanation: &str) -> AnalysisResult {
        AnalysisResult::default().with_checklist(ChecklistResult {
            filename: "src/lib.rs".to_string(),
            explanation: explanation.to_string(),
            checklist_items: vec![ChecklistItem {
                id: "1".to_string(),
                description: "Check it".to_string(),
                is_checked: false,
            }],
        })
    }

    fn service_with(
        store: Arc<InMemoryKvStore>,
        cache_cap: usize,
        recency_cap: usize,
    ) -> ReviewCacheService<InMemoryKvStore> {
        ReviewCacheService::with_clock(
            store,
            CacheConfig::new(cache_cap, recency_cap),
            Arc::new(ManualClock::default()),
        )
    }

    fn service(cache_cap: usize) -> ReviewCacheService<InMemoryKvStore> {
        service_with(Arc::new(InMemoryKvStore::new()), cache_cap, 10)
    }

    async fn keys_of(svc: &ReviewCacheService<InMemoryKvStore>) -> Vec<SessionKey> {
        svc.get_all().await.unwrap().into_iter().map(|r| r.key).collect()
    }

    #[tokio::test]
    async fn test_cap_holds_after_every_save() {
        let svc = service(5);
        for n in 0..12 {
            svc.save(&key(n), snapshot(n), None).await.unwrap();
            assert!(svc.get_all().await.unwrap().len() <= 5);
        }
    }

    #[tokio::test]
    async fn test_eviction_drops_oldest() {
        let svc = service(20);
        for n in 0..25 {
            svc.save(&key(n), snapshot(n), None).await.unwrap();
        }

        let mut keys = keys_of(&svc).await;
        keys.sort_by_key(|k| k.as_str()[1..].parse::<usize>().unwrap());
        let expected: Vec<SessionKey> = (5..25).map(key).collect();
        assert_eq!(keys, expected);
    }

    #[tokio::test]
    async fn test_resave_refreshes_eviction_order() {
        let svc = service(2);
        svc.save(&key(0), snapshot(0), None).await.unwrap();
        svc.save(&key(1), snapshot(1), None).await.unwrap();
        // Re-saving an existing key under the cap evicts nothing, but makes it newest.
        svc.save(&key(0), snapshot(0), None).await.unwrap();
        assert_eq!(svc.get_all().await.unwrap().len(), 2);

        svc.save(&key(2), snapshot(2), None).await.unwrap();
        let keys = keys_of(&svc).await;
        assert!(keys.contains(&key(0)));
        assert!(keys.contains(&key(2)));
        assert!(!keys.contains(&key(1)));
    }

    #[tokio::test]
    async fn test_resave_under_lowered_cap_evicts_down_to_cap() {
        let store = Arc::new(InMemoryKvStore::new());
        let wide = service_with(Arc::clone(&store), 20, 10);
        for n in 0..6 {
            wide.save(&key(n), snapshot(n), None).await.unwrap();
            wide.append_turn(&key(n), "a.ts", ChatTurn::user("x")).await.unwrap();
        }

        let later = chrono::DateTime::<chrono::Utc>::UNIX_EPOCH + chrono::Duration::days(1);
        let narrow = ReviewCacheService::with_clock(
            Arc::clone(&store),
            CacheConfig::new(3, 10),
            Arc::new(ManualClock::starting_at(later, chrono::Duration::seconds(1))),
        );
        narrow.save(&key(1), snapshot(1), None).await.unwrap();

        let mut keys = keys_of(&narrow).await;
        keys.sort_by_key(|k| k.as_str()[1..].parse::<usize>().unwrap());
        assert_eq!(keys, vec![key(1), key(4), key(5)]);
        assert!(narrow.transcripts(&key(0)).await.unwrap().is_empty());
        assert_eq!(narrow.transcript(&key(1), "a.ts").await.unwrap().len(), 1);
        assert!(narrow.recent().await.unwrap().iter().all(|e| e.key != key(2)));
    }

    #[tokio::test]
    async fn test_clear_analysis_touches_recency() {
        let svc = service(5);
        svc.save(&key(1), snapshot(1), Some(analysis("a"))).await.unwrap();
        svc.save(&key(2), snapshot(2), None).await.unwrap();

        assert!(svc.clear_analysis(&key(1)).await.unwrap());

        let recent: Vec<SessionKey> = svc.recent().await.unwrap().into_iter().map(|e| e.key).collect();
        assert_eq!(recent, vec![key(1), key(2)]);
        assert!(!svc.clear_analysis(&key(9)).await.unwrap());
    }

    #[tokio::test]
    async fn test_cap_two_scenario_cascades() {
        let svc = service(2);
        let (a, b, c) = (SessionKey::from("a"), SessionKey::from("b"), SessionKey::from("c"));

        svc.save(&a, snapshot(1), None).await.unwrap();
        svc.append_turn(&a, "src/lib.rs", ChatTurn::user("hello")).await.unwrap();
        svc.save(&b, snapshot(2), None).await.unwrap();
        svc.save(&c, snapshot(3), None).await.unwrap();

        let keys = keys_of(&svc).await;
        assert_eq!(keys, vec![b.clone(), c.clone()]);
        assert!(svc.get(&a).await.unwrap().is_none());
        assert!(svc.transcripts(&a).await.unwrap().is_empty());
        assert!(svc.recent().await.unwrap().iter().all(|e| e.key != a));
    }

    #[tokio::test]
    async fn test_eviction_cascade_is_complete() {
        let svc = service(3);
        for n in 0..3 {
            svc.save(&key(n), snapshot(n), None).await.unwrap();
            svc.append_turn(&key(n), "src/lib.rs", ChatTurn::user("q")).await.unwrap();
        }
        svc.save(&key(3), snapshot(3), None).await.unwrap();

        assert!(svc.transcripts(&key(0)).await.unwrap().is_empty());
        assert!(svc.recent().await.unwrap().iter().all(|e| e.key != key(0)));
        assert_eq!(svc.transcript(&key(1), "src/lib.rs").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_analysis_update_keeps_snapshot() {
        let svc = service(5);
        let snap = snapshot(7);
        svc.save(&key(7), snap.clone(), None).await.unwrap();

        svc.update_analysis_result(&key(7), analysis("first")).await.unwrap();
        let record = svc.get(&key(7)).await.unwrap().unwrap();
        assert_eq!(record.snapshot, snap);
        assert_eq!(record.analysis, Some(analysis("first")));

        svc.update_analysis_result(&key(7), analysis("second")).await.unwrap();
        let updated = svc.get(&key(7)).await.unwrap().unwrap();
        assert_eq!(updated.snapshot, snap);
        assert_eq!(updated.analysis, Some(analysis("second")));
        assert!(updated.saved_at > record.saved_at);
    }

    #[tokio::test]
    async fn test_analysis_update_on_absent_key_is_noop() {
        let store = Arc::new(InMemoryKvStore::new());
        let svc = service_with(Arc::clone(&store), 5, 10);

        svc.update_analysis_result(&key(1), analysis("x")).await.unwrap();

        assert!(svc.get(&key(1)).await.unwrap().is_none());
        assert!(store.raw(SESSIONS_COLLECTION).is_none());
        assert!(store.raw(RECENT_SESSIONS_COLLECTION).is_none());
    }

    #[tokio::test]
    async fn test_resave_without_analysis_preserves_it() {
        let svc = service(5);
        svc.save(&key(1), snapshot(1), Some(analysis("kept"))).await.unwrap();

        let mut refreshed = snapshot(1);
        refreshed.title = "Refetched".to_string();
        svc.save(&key(1), refreshed, None).await.unwrap();

        let record = svc.get(&key(1)).await.unwrap().unwrap();
        assert_eq!(record.snapshot.title, "Refetched");
        assert_eq!(record.analysis, Some(analysis("kept")));

        assert!(svc.clear_analysis(&key(1)).await.unwrap());
        assert!(svc.get(&key(1)).await.unwrap().unwrap().analysis.is_none());
    }

    #[tokio::test]
    async fn test_update_analysis_with_merges() {
        let svc = service(5);
        svc.save(&key(1), snapshot(1), Some(analysis("a"))).await.unwrap();

        let merged = svc
            .update_analysis_with(&key(1), |current| {
                let mut current = current.unwrap_or_default();
                current.set_checked("src/lib.rs", "1", true);
                current
            })
            .await
            .unwrap()
            .unwrap();

        assert!(merged.checklist("src/lib.rs").unwrap().checklist_items[0].is_checked);
    }

    #[tokio::test]
    async fn test_transcript_isolation() {
        let svc = service(5);
        svc.save(&key(1), snapshot(1), None).await.unwrap();
        let turns_a = vec![ChatTurn::user("a?"), ChatTurn::assistant("a!")];
        let turns_b = vec![ChatTurn::user("b?")];

        svc.save_transcript(&key(1), "a.ts", turns_a.clone()).await.unwrap();
        svc.save_transcript(&key(1), "b.ts", turns_b).await.unwrap();

        assert_eq!(svc.transcript(&key(1), "a.ts").await.unwrap(), turns_a);
    }

    #[tokio::test]
    async fn test_transcript_write_for_uncached_key_is_skipped() {
        let store = Arc::new(InMemoryKvStore::new());
        let svc = service_with(Arc::clone(&store), 5, 10);

        let written = svc.append_turn(&key(9), "a.ts", ChatTurn::user("hi")).await.unwrap();

        assert!(!written);
        assert!(store.raw(CHAT_HISTORIES_COLLECTION).is_none());
    }

    #[tokio::test]
    async fn test_retract_turn_only_removes_matching_tail() {
        let svc = service(5);
        svc.save(&key(1), snapshot(1), None).await.unwrap();
        svc.append_turn(&key(1), "a.ts", ChatTurn::user("first")).await.unwrap();
        svc.append_turn(&key(1), "a.ts", ChatTurn::user("second")).await.unwrap();

        assert!(!svc.retract_turn(&key(1), "a.ts", &ChatTurn::user("first")).await.unwrap());
        assert!(svc.retract_turn(&key(1), "a.ts", &ChatTurn::user("second")).await.unwrap());

        assert_eq!(svc.transcript(&key(1), "a.ts").await.unwrap(), vec![ChatTurn::user("first")]);
    }

    #[tokio::test]
    async fn test_reset_discussion_clears_all_files() {
        let svc = service(5);
        svc.save(&key(1), snapshot(1), None).await.unwrap();
        svc.append_turn(&key(1), "a.ts", ChatTurn::user("x")).await.unwrap();
        svc.append_turn(&key(1), "b.ts", ChatTurn::user("y")).await.unwrap();

        svc.save_transcripts(&key(1), FileTranscripts::new()).await.unwrap();

        assert!(svc.transcripts(&key(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_absent_key_changes_nothing() {
        let store = Arc::new(InMemoryKvStore::new());
        let svc = service_with(Arc::clone(&store), 5, 10);
        svc.save(&key(1), snapshot(1), None).await.unwrap();
        svc.append_turn(&key(1), "a.ts", ChatTurn::user("x")).await.unwrap();

        let before: Vec<_> = [SESSIONS_COLLECTION, CHAT_HISTORIES_COLLECTION, RECENT_SESSIONS_COLLECTION]
            .iter()
            .map(|name| store.raw(name))
            .collect();

        svc.remove(&key(42)).await.unwrap();

        let after: Vec<_> = [SESSIONS_COLLECTION, CHAT_HISTORIES_COLLECTION, RECENT_SESSIONS_COLLECTION]
            .iter()
            .map(|name| store.raw(name))
            .collect();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_remove_batch_clears_all_stores() {
        let svc = service(5);
        for n in 0..3 {
            svc.save(&key(n), snapshot(n), None).await.unwrap();
            svc.append_turn(&key(n), "a.ts", ChatTurn::user("x")).await.unwrap();
        }

        svc.remove_batch(&[key(0), key(2)]).await.unwrap();

        assert_eq!(keys_of(&svc).await, vec![key(1)]);
        assert!(svc.transcripts(&key(0)).await.unwrap().is_empty());
        assert!(svc.transcripts(&key(2)).await.unwrap().is_empty());
        let recent: Vec<SessionKey> = svc.recent().await.unwrap().into_iter().map(|e| e.key).collect();
        assert_eq!(recent, vec![key(1)]);
    }

    #[tokio::test]
    async fn test_recency_capped_independently() {
        let svc = service_with(Arc::new(InMemoryKvStore::new()), 20, 3);
        for n in 0..6 {
            svc.save(&key(n), snapshot(n), None).await.unwrap();
        }

        assert_eq!(svc.get_all().await.unwrap().len(), 6);
        let recent: Vec<SessionKey> = svc.recent().await.unwrap().into_iter().map(|e| e.key).collect();
        assert_eq!(recent, vec![key(5), key(4), key(3)]);
    }

    #[tokio::test]
    async fn test_concurrent_saves_lose_nothing() {
        let store = Arc::new(InMemoryKvStore::new().with_yielding());
        let svc = service_with(store, 50, 50);

        let keys: Vec<SessionKey> = (0..16).map(key).collect();
        let saves = keys
            .iter()
            .enumerate()
            .map(|(n, k)| svc.save(k, snapshot(n), None));
        for result in futures_util::future::join_all(saves).await {
            result.unwrap();
        }

        assert_eq!(svc.get_all().await.unwrap().len(), 16);
        assert_eq!(svc.recent().await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn test_failed_cascade_propagates_and_sweep_recovers() {
        let store = Arc::new(InMemoryKvStore::new());
        let svc = service_with(Arc::clone(&store), 1, 10);
        svc.save(&key(0), snapshot(0), None).await.unwrap();
        svc.append_turn(&key(0), "a.ts", ChatTurn::user("x")).await.unwrap();

        store.fail_writes_to(CHAT_HISTORIES_COLLECTION);
        let err = svc.save(&key(1), snapshot(1), None).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Query(_)));

        // Session store already dropped the evicted key; the rest lag behind.
        assert!(svc.get(&key(0)).await.unwrap().is_none());
        assert_eq!(svc.transcript(&key(0), "a.ts").await.unwrap().len(), 1);

        store.clear_failures();
        let report = svc.sweep_orphans().await.unwrap();
        assert_eq!(report.transcripts, 1);
        assert_eq!(report.recency_entries, 1);
        assert!(svc.transcripts(&key(0)).await.unwrap().is_empty());
        assert!(svc.recent().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_incompatible_collection_is_not_overwritten() {
        let store = Arc::new(InMemoryKvStore::new());
        let future = serde_json::json!({"schema_version": 99, "items": []});
        store.set(SESSIONS_COLLECTION, &future).await.unwrap();
        let svc = service_with(Arc::clone(&store), 5, 10);

        let err = svc.save(&key(1), snapshot(1), None).await.unwrap_err();

        assert!(matches!(err, RepositoryError::IncompatibleSchema { .. }));
        assert_eq!(store.raw(SESSIONS_COLLECTION).unwrap(), future);
    }
}
