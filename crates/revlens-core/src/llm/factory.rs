//! ModelClientFactory: decouples orchestration from provider selection.

use revlens_types::llm::LlmError;

use super::box_client::BoxModelClient;

/// Produces a ready-to-use model client.
///
/// Called once per orchestration request, so configuration or credential
/// changes take effect on the next call. Failures (missing credential,
/// unknown provider) surface as [`LlmError`].
pub trait ModelClientFactory: Send + Sync {
    fn create(
        &self,
    ) -> impl std::future::Future<Output = Result<BoxModelClient, LlmError>> + Send;
}
