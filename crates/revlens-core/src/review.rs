//! ReviewWorkflow: the cache, the code host and the model wired together.
//!
//! This is what the presentation layer calls. It loads sessions through the
//! cache, falls back to the code host on a miss, and writes AI results and
//! chat turns back through [`ReviewCacheService`].

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use revlens_types::analysis::ChecklistResult;
use revlens_types::chat::{ChatTurn, FileTranscripts};
use revlens_types::error::{AiError, ErrorKind, HostError, RepositoryError};
use revlens_types::llm::Locale;
use revlens_types::session::{SessionIdentifier, SessionKey, SessionRecord, SessionSnapshot};

use crate::ai::service::AiOrchestrationService;
use crate::cache::service::ReviewCacheService;
use crate::host::CodeHostClient;
use crate::llm::factory::ModelClientFactory;
use crate::storage::kv_store::KeyValueStore;

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("session '{0}' is not cached")]
    NotCached(SessionKey),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Cache(#[from] RepositoryError),

    #[error(transparent)]
    Ai(#[from] AiError),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::NotCached(_) | WorkflowError::Host(HostError::NotFound(_)) => {
                ErrorKind::NotFound
            }
            WorkflowError::Host(_) | WorkflowError::Cache(_) => ErrorKind::ServiceUnavailable,
            WorkflowError::Ai(e) => e.kind(),
        }
    }
}

pub struct ReviewWorkflow<S, H, F>
where
    S: KeyValueStore,
    H: CodeHostClient,
    F: ModelClientFactory,
{
    cache: Arc<ReviewCacheService<S>>,
    host: Arc<H>,
    ai: Arc<AiOrchestrationService<F>>,
}

impl<S, H, F> ReviewWorkflow<S, H, F>
where
    S: KeyValueStore,
    H: CodeHostClient,
    F: ModelClientFactory,
{
    pub fn new(
        cache: Arc<ReviewCacheService<S>>,
        host: Arc<H>,
        ai: Arc<AiOrchestrationService<F>>,
    ) -> Self {
        Self { cache, host, ai }
    }

    pub fn cache(&self) -> &ReviewCacheService<S> {
        &self.cache
    }

    /// Return the cached session, fetching it from the code host on a miss
    /// or when `refresh` is set. A refresh keeps existing analysis.
    pub async fn load_session(
        &self,
        identifier: &SessionIdentifier,
        refresh: bool,
    ) -> Result<SessionRecord, WorkflowError> {
        let key = identifier.key();
        if !refresh {
            if let Some(record) = self.cache.get(&key).await? {
                tracing::debug!(key = %key, "session cache hit");
                return Ok(record);
            }
        }

        tracing::info!(key = %key, refresh, "fetching session from code host");
        let mut snapshot = self.host.fetch_session(identifier).await?;
        snapshot.review_comments = self.host.fetch_review_comments(identifier).await?;
        Ok(self.cache.save(&key, snapshot, None).await?)
    }

    /// Store a snapshot obtained out of band (e.g. exported to a file).
    pub async fn import_snapshot(
        &self,
        snapshot: SessionSnapshot,
    ) -> Result<SessionRecord, WorkflowError> {
        let key = snapshot.key();
        Ok(self.cache.save(&key, snapshot, None).await?)
    }

    async fn cached(&self, key: &SessionKey) -> Result<SessionRecord, WorkflowError> {
        self.cache
            .get(key)
            .await?
            .ok_or_else(|| WorkflowError::NotCached(key.clone()))
    }

    /// Generate a checklist for one file and merge it into the session's
    /// analysis, replacing any earlier checklist for that file.
    pub async fn generate_checklist(
        &self,
        key: &SessionKey,
        file_path: &str,
        locale: Locale,
    ) -> Result<ChecklistResult, WorkflowError> {
        let record = self.cached(key).await?;
        let checklist = self
            .ai
            .generate_checklist(&record.snapshot, file_path, locale)
            .await?;

        let stored = checklist.clone();
        let path = file_path.to_string();
        self.cache
            .update_analysis_with(key, move |current| {
                let mut analysis = current.unwrap_or_default();
                analysis.checklists.insert(path, stored);
                analysis.updated_at = Some(Utc::now());
                analysis
            })
            .await?;
        Ok(checklist)
    }

    /// Mark a checklist item checked or unchecked. Returns `false` when the
    /// file has no checklist or the item is unknown.
    pub async fn set_item_checked(
        &self,
        key: &SessionKey,
        file_path: &str,
        item_id: &str,
        checked: bool,
    ) -> Result<bool, WorkflowError> {
        let record = self.cached(key).await?;
        let known = record
            .analysis
            .as_ref()
            .and_then(|a| a.checklist(file_path))
            .is_some_and(|c| c.checklist_items.iter().any(|i| i.id == item_id));
        if !known {
            return Ok(false);
        }

        let (path, id) = (file_path.to_string(), item_id.to_string());
        let updated = self
            .cache
            .update_analysis_with(key, move |current| {
                let mut analysis = current.unwrap_or_default();
                analysis.set_checked(&path, &id, checked);
                analysis
            })
            .await?;
        Ok(updated.is_some())
    }

    /// Ask a question about one file and stream the answer.
    ///
    /// The user turn is stored before the call and the reply after it. If
    /// `cancel` fires mid-stream the partial reply is stored as an
    /// interrupted turn and [`AiError::Aborted`] is returned. When the call
    /// fails with nothing streamed, the user turn is taken back out.
    pub async fn chat<T>(
        &self,
        key: &SessionKey,
        file_path: &str,
        user_text: &str,
        locale: Locale,
        mut on_token: T,
        cancel: Option<&CancellationToken>,
    ) -> Result<String, WorkflowError>
    where
        T: FnMut(&str) + Send,
    {
        let record = self.cached(key).await?;
        if user_text.trim().is_empty() {
            return Err(AiError::InvalidInput("message is empty".to_string()).into());
        }
        if record.snapshot.file(file_path).is_none() {
            return Err(AiError::InvalidInput(format!("'{file_path}' is not part of session {key}")).into());
        }

        let question = ChatTurn::user(user_text);
        self.append(key, file_path, question.clone()).await?;
        let history = self.cache.transcript(key, file_path).await?;

        let mut partial = String::new();
        let result = self
            .ai
            .stream_chat(
                &record.snapshot,
                file_path,
                &history,
                |token| {
                    partial.push_str(token);
                    on_token(token);
                },
                locale,
                cancel,
            )
            .await;

        match result {
            Ok(reply) => {
                self.append(key, file_path, ChatTurn::assistant(reply.clone()))
                    .await?;
                Ok(reply)
            }
            Err(AiError::Aborted) if !partial.is_empty() => {
                self.append(key, file_path, ChatTurn::interrupted(partial))
                    .await?;
                Err(AiError::Aborted.into())
            }
            Err(e) => {
                // Unanswered; the caller may ask again.
                if let Err(rollback) = self.cache.retract_turn(key, file_path, &question).await {
                    tracing::warn!(key = %key, error = %rollback, "failed to retract unanswered question");
                }
                Err(e.into())
            }
        }
    }

    async fn append(
        &self,
        key: &SessionKey,
        file_path: &str,
        turn: ChatTurn,
    ) -> Result<(), WorkflowError> {
        if !self.cache.append_turn(key, file_path, turn).await? {
            return Err(WorkflowError::NotCached(key.clone()));
        }
        Ok(())
    }

    /// Stream a summary of the whole change request. Not persisted.
    pub async fn summarize<T>(
        &self,
        key: &SessionKey,
        locale: Locale,
        on_token: T,
        cancel: Option<&CancellationToken>,
    ) -> Result<String, WorkflowError>
    where
        T: FnMut(&str) + Send,
    {
        let record = self.cached(key).await?;
        Ok(self
            .ai
            .stream_summary(&record.snapshot, locale, on_token, cancel)
            .await?)
    }

    /// Drop every file discussion of a session.
    pub async fn reset_discussion(&self, key: &SessionKey) -> Result<(), WorkflowError> {
        self.cache.save_transcripts(key, FileTranscripts::new()).await?;
        Ok(())
    }
}
