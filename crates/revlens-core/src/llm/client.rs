//! ModelClient trait definition.
//!
//! The uniform capability interface every language-model backend
//! implements: batch structured generation and token streaming.

use std::pin::Pin;

use futures_util::Stream;

use revlens_types::llm::{CompletionRequest, LlmError, OutputSchema, StreamEvent};

/// Boxed stream of provider events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>>;

/// Trait for model backends (Anthropic today).
///
/// Uses RPITIT for `generate_structured`. `stream_chat` returns a boxed
/// stream so the trait can be wrapped by [`BoxModelClient`](super::box_client::BoxModelClient).
/// Dropping the stream must release the underlying transport.
///
/// Implementations live in revlens-infra (e.g. `AnthropicClient`).
pub trait ModelClient: Send + Sync {
    /// Provider name, for logs and spans.
    fn name(&self) -> &str;

    /// Generate one JSON value constrained by `schema`.
    ///
    /// Returns [`LlmError::SchemaViolation`] when the provider answers with
    /// something that is not a JSON object.
    fn generate_structured(
        &self,
        request: &CompletionRequest,
        schema: &OutputSchema,
    ) -> impl std::future::Future<Output = Result<serde_json::Value, LlmError>> + Send;

    /// Stream a chat completion.
    fn stream_chat(&self, request: CompletionRequest) -> EventStream;
}
