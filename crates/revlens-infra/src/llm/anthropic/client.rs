//! AnthropicClient -- concrete [`ModelClient`] for the Anthropic Messages API.
//!
//! Sends requests to `/v1/messages` with the API key and version headers.
//! Structured generation uses a non-streaming call constrained by a JSON
//! schema; chat and summaries stream over SSE.
//!
//! The API key is wrapped in [`secrecy::SecretString`] and is never logged
//! or included in `Debug` output.

use std::time::Duration;

use reqwest::header::HeaderMap;
use secrecy::{ExposeSecret, SecretString};

use revlens_core::llm::client::{EventStream, ModelClient};
use revlens_types::llm::{CompletionRequest, LlmError, OutputSchema};

use super::streaming::create_anthropic_stream;
use super::types::{
    AnthropicMessage, AnthropicNonStreamResponse, AnthropicRequest, ErrorPayload, OutputConfig,
};

/// The Anthropic API version header value.
pub(crate) const API_VERSION: &str = "2023-06-01";

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic Claude model client.
///
/// Intentionally not `Debug`: the key never leaves `SecretString` except
/// when building request headers.
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl AnthropicClient {
    /// Create a client for `model` (e.g. "claude-sonnet-4-20250514").
    pub fn new(api_key: SecretString, model: String) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| LlmError::Provider {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model,
        })
    }

    /// The default model for requests that leave `model` empty.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Override the base URL (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Convert a generic [`CompletionRequest`] into an [`AnthropicRequest`].
    fn to_anthropic_request(
        &self,
        request: &CompletionRequest,
        stream: bool,
        output_config: Option<OutputConfig>,
    ) -> AnthropicRequest {
        let model = if request.model.is_empty() {
            self.model.clone()
        } else {
            request.model.clone()
        };

        AnthropicRequest {
            model,
            max_tokens: request.max_tokens,
            messages: request
                .messages
                .iter()
                .map(|m| AnthropicMessage {
                    role: m.role.to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            system: request.system.clone(),
            stream,
            temperature: request.temperature,
            output_config,
        }
    }
}

/// Map a non-2xx response to an [`LlmError`].
pub(crate) fn error_from_status(status: u16, body: &str, retry_after_ms: Option<u64>) -> LlmError {
    let message = serde_json::from_str::<ErrorPayload>(body)
        .map(|p| p.error.message)
        .unwrap_or_else(|_| body.to_string());

    match status {
        401 | 403 => LlmError::AuthenticationFailed,
        429 => LlmError::RateLimited { retry_after_ms },
        400 | 404 | 413 => LlmError::InvalidRequest(message),
        529 => LlmError::Overloaded(message),
        _ => LlmError::Provider {
            message: format!("HTTP {status}: {message}"),
        },
    }
}

/// Parse a `retry-after` header given in seconds.
pub(crate) fn retry_after_ms(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("retry-after")?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| secs.saturating_mul(1000))
}

/// Turn the model's text into a JSON object, or a schema violation.
fn parse_structured_text(schema_name: &str, text: &str) -> Result<serde_json::Value, LlmError> {
    let value: serde_json::Value =
        serde_json::from_str(text.trim()).map_err(|e| LlmError::SchemaViolation {
            schema: schema_name.to_string(),
            reason: format!("response is not JSON: {e}"),
        })?;
    if !value.is_object() {
        return Err(LlmError::SchemaViolation {
            schema: schema_name.to_string(),
            reason: "response is not a JSON object".to_string(),
        });
    }
    Ok(value)
}

impl ModelClient for AnthropicClient {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate_structured(
        &self,
        request: &CompletionRequest,
        schema: &OutputSchema,
    ) -> Result<serde_json::Value, LlmError> {
        let output_config = OutputConfig::json_schema(&schema.name, schema.schema.clone());
        let body = self.to_anthropic_request(request, false, Some(output_config));

        let response = self
            .client
            .post(self.url("/v1/messages"))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Provider {
                message: format!("HTTP request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_ms(response.headers());
            let error_body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "anthropic API error response");
            return Err(error_from_status(status.as_u16(), &error_body, retry_after));
        }

        let anthropic_resp: AnthropicNonStreamResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Deserialization(format!("failed to parse response: {e}")))?;

        tracing::debug!(
            message_id = %anthropic_resp.id,
            model = %anthropic_resp.model,
            input_tokens = anthropic_resp.usage.input_tokens,
            output_tokens = anthropic_resp.usage.output_tokens,
            "structured generation finished"
        );

        match anthropic_resp.stop_reason.as_deref() {
            Some("refusal") => Err(LlmError::SchemaViolation {
                schema: schema.name.clone(),
                reason: "model refused to answer".to_string(),
            }),
            Some("max_tokens") => Err(LlmError::SchemaViolation {
                schema: schema.name.clone(),
                reason: "response truncated at max_tokens".to_string(),
            }),
            _ => parse_structured_text(&schema.name, &anthropic_resp.text()),
        }
    }

    fn stream_chat(&self, request: CompletionRequest) -> EventStream {
        let body = self.to_anthropic_request(&request, true, None);
        create_anthropic_stream(&self.client, &self.url("/v1/messages"), body, &self.api_key)
    }
}
