//! BoxModelClient -- object-safe dynamic dispatch wrapper for ModelClient.
//!
//! 1. `ModelClientDyn` is an object-safe mirror of [`ModelClient`] with boxed futures
//! 2. A blanket impl covers every `T: ModelClient`
//! 3. `BoxModelClient` wraps `Box<dyn ModelClientDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use revlens_types::llm::{CompletionRequest, LlmError, OutputSchema};

use super::client::{EventStream, ModelClient};

/// Object-safe version of [`ModelClient`] with boxed futures.
pub trait ModelClientDyn: Send + Sync {
    fn name(&self) -> &str;

    fn generate_structured_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
        schema: &'a OutputSchema,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, LlmError>> + Send + 'a>>;

    fn stream_chat_boxed(&self, request: CompletionRequest) -> EventStream;
}

impl<T: ModelClient> ModelClientDyn for T {
    fn name(&self) -> &str {
        ModelClient::name(self)
    }

    fn generate_structured_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
        schema: &'a OutputSchema,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, LlmError>> + Send + 'a>> {
        Box::pin(self.generate_structured(request, schema))
    }

    fn stream_chat_boxed(&self, request: CompletionRequest) -> EventStream {
        self.stream_chat(request)
    }
}

/// Type-erased model client, selected at runtime by the factory.
pub struct BoxModelClient {
    inner: Box<dyn ModelClientDyn + Send + Sync>,
}

impl BoxModelClient {
    pub fn new<T: ModelClient + 'static>(client: T) -> Self {
        Self {
            inner: Box::new(client),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn generate_structured(
        &self,
        request: &CompletionRequest,
        schema: &OutputSchema,
    ) -> Result<serde_json::Value, LlmError> {
        self.inner.generate_structured_boxed(request, schema).await
    }

    pub fn stream_chat(&self, request: CompletionRequest) -> EventStream {
        self.inner.stream_chat_boxed(request)
    }
}
