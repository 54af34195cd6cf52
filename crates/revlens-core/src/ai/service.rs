//! AiOrchestrationService: provider-agnostic checklist, chat and summary calls.
//!
//! Builds prompts from a session snapshot, obtains a client from the
//! injected [`ModelClientFactory`] per call, and classifies every failure
//! into the [`AiError`] taxonomy. Nothing here retries.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, warn};

use revlens_types::analysis::ChecklistResult;
use revlens_types::chat::{ChatSender, ChatTurn};
use revlens_types::config::ModelConfig;
use revlens_types::error::AiError;
use revlens_types::llm::{
    CompletionRequest, Locale, Message, MessageRole, StopReason, StreamEvent,
};
use revlens_types::session::{FileChange, SessionSnapshot};

use super::prompt::ReviewPromptBuilder;
use super::schema::{checklist_schema, parse_checklist};
use crate::llm::box_client::BoxModelClient;
use crate::llm::factory::ModelClientFactory;

/// Request parameters shared by every call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
}

impl From<&ModelConfig> for GenerationSettings {
    fn from(config: &ModelConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::from(&ModelConfig::default())
    }
}

pub struct AiOrchestrationService<F: ModelClientFactory> {
    factory: Arc<F>,
    settings: GenerationSettings,
}

impl<F: ModelClientFactory> AiOrchestrationService<F> {
    pub fn new(factory: Arc<F>, settings: GenerationSettings) -> Self {
        Self { factory, settings }
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Generate a review checklist for one file of the session.
    pub async fn generate_checklist(
        &self,
        snapshot: &SessionSnapshot,
        file_path: &str,
        locale: Locale,
    ) -> Result<ChecklistResult, AiError> {
        let file = target_file(snapshot, file_path)?;
        let request = self.request(
            ReviewPromptBuilder::checklist(snapshot, file, locale),
            vec![Message {
                role: MessageRole::User,
                content: ReviewPromptBuilder::checklist_request(file_path),
            }],
        );
        let schema = checklist_schema();

        let client = self.client().await?;
        let span = info_span!(
            "gen_ai.checklist",
            gen_ai.system = client.name(),
            gen_ai.request.model = %request.model,
            gen_ai.request.max_tokens = request.max_tokens,
            file = file_path,
        );

        let value = client
            .generate_structured(&request, &schema)
            .instrument(span)
            .await?;
        let checklist = parse_checklist(value)?;
        debug!(
            file = file_path,
            items = checklist.checklist_items.len(),
            "checklist generated"
        );
        Ok(checklist)
    }

    /// Stream a reply in a per-file discussion.
    ///
    /// `history` must end with the user turn being answered. Tokens are
    /// handed to `on_token` as they arrive and the full reply is returned.
    /// On cancellation the call fails with [`AiError::Aborted`]; tokens
    /// already delivered are the caller's to keep.
    pub async fn stream_chat<T>(
        &self,
        snapshot: &SessionSnapshot,
        file_path: &str,
        history: &[ChatTurn],
        on_token: T,
        locale: Locale,
        cancel: Option<&CancellationToken>,
    ) -> Result<String, AiError>
    where
        T: FnMut(&str) + Send,
    {
        let file = target_file(snapshot, file_path)?;
        let messages = history_messages(history)?;
        let request = self.request(ReviewPromptBuilder::chat(snapshot, file, locale), messages);
        let cancel = cancel.cloned().unwrap_or_default();
        if cancel.is_cancelled() {
            return Err(AiError::Aborted);
        }

        let client = self.client().await?;
        let span = info_span!(
            "gen_ai.stream_chat",
            gen_ai.system = client.name(),
            gen_ai.request.model = %request.model,
            gen_ai.request.max_tokens = request.max_tokens,
            gen_ai.request.stream = true,
            file = file_path,
            turns = history.len(),
        );
        drive_stream(&client, request, on_token, &cancel)
            .instrument(span)
            .await
    }

    /// Stream a five-part summary of the whole change request.
    pub async fn stream_summary<T>(
        &self,
        snapshot: &SessionSnapshot,
        locale: Locale,
        on_token: T,
        cancel: Option<&CancellationToken>,
    ) -> Result<String, AiError>
    where
        T: FnMut(&str) + Send,
    {
        require_files(snapshot)?;
        let request = self.request(
            ReviewPromptBuilder::summary(snapshot, locale),
            vec![Message {
                role: MessageRole::User,
                content: ReviewPromptBuilder::summary_request(),
            }],
        );
        let cancel = cancel.cloned().unwrap_or_default();
        if cancel.is_cancelled() {
            return Err(AiError::Aborted);
        }

        let client = self.client().await?;
        let span = info_span!(
            "gen_ai.stream_summary",
            gen_ai.system = client.name(),
            gen_ai.request.model = %request.model,
            gen_ai.request.max_tokens = request.max_tokens,
            gen_ai.request.stream = true,
            files = snapshot.files.len(),
        );
        drive_stream(&client, request, on_token, &cancel)
            .instrument(span)
            .await
    }

    async fn client(&self) -> Result<BoxModelClient, AiError> {
        self.factory.create().await.map_err(|e| {
            warn!(error = %e, "model client unavailable");
            AiError::ServiceUnavailable(e)
        })
    }

    fn request(&self, system: String, messages: Vec<Message>) -> CompletionRequest {
        CompletionRequest {
            model: self.settings.model.clone(),
            messages,
            system: Some(system),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        }
    }
}

/// Pump a client stream into `on_token` until it ends, fails, or `cancel` fires.
///
/// Returning early drops the stream, which releases the transport.
async fn drive_stream<T>(
    client: &BoxModelClient,
    request: CompletionRequest,
    mut on_token: T,
    cancel: &CancellationToken,
) -> Result<String, AiError>
where
    T: FnMut(&str) + Send,
{
    let mut stream = client.stream_chat(request);
    let mut reply = String::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(received = reply.len(), "stream cancelled");
                return Err(AiError::Aborted);
            }
            next = stream.next() => next,
        };

        match next {
            None | Some(Ok(StreamEvent::Done)) => break,
            Some(Ok(StreamEvent::TextDelta { text })) => {
                if cancel.is_cancelled() {
                    return Err(AiError::Aborted);
                }
                on_token(&text);
                reply.push_str(&text);
            }
            Some(Ok(StreamEvent::MessageDelta { stop_reason })) => {
                if matches!(stop_reason, StopReason::MaxTokens | StopReason::Refusal) {
                    warn!(%stop_reason, "stream stopped early");
                }
            }
            Some(Ok(StreamEvent::Usage(usage))) => {
                debug!(
                    gen_ai.usage.input_tokens = usage.input_tokens,
                    gen_ai.usage.output_tokens = usage.output_tokens,
                    "stream usage"
                );
            }
            Some(Ok(StreamEvent::Connected)) => {}
            Some(Err(e)) => return Err(AiError::from(e)),
        }
    }

    Ok(reply)
}

fn require_files(snapshot: &SessionSnapshot) -> Result<(), AiError> {
    if snapshot.files.is_empty() {
        return Err(AiError::InvalidInput(format!(
            "session {} has no changed files",
            snapshot.key()
        )));
    }
    Ok(())
}

fn target_file<'a>(snapshot: &'a SessionSnapshot, file_path: &str) -> Result<&'a FileChange, AiError> {
    require_files(snapshot)?;
    snapshot.file(file_path).ok_or_else(|| {
        AiError::InvalidInput(format!("'{file_path}' is not part of session {}", snapshot.key()))
    })
}

/// Turn a stored transcript into alternating provider messages.
///
/// Leading assistant turns are dropped and consecutive turns from the same
/// sender are merged. The result must end with a user message.
fn history_messages(history: &[ChatTurn]) -> Result<Vec<Message>, AiError> {
    let mut messages: Vec<Message> = Vec::with_capacity(history.len());
    for turn in history
        .iter()
        .skip_while(|t| t.sender == ChatSender::Assistant)
        .filter(|t| !t.text.trim().is_empty())
    {
        let role = MessageRole::from(turn.sender);
        match messages.last_mut() {
            Some(last) if last.role == role => {
                last.content.push_str("\n\n");
                last.content.push_str(&turn.text);
            }
            _ => messages.push(Message {
                role,
                content: turn.text.clone(),
            }),
        }
    }

    match messages.last() {
        Some(last) if last.role == MessageRole::User => Ok(messages),
        Some(_) => Err(AiError::InvalidInput(
            "chat history must end with a user turn".to_string(),
        )),
        None => Err(AiError::InvalidInput("chat history is empty".to_string())),
    }
}
