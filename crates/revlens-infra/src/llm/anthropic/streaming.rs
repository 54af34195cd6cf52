//! SSE stream creation and state machine for the Anthropic Messages API.
//!
//! Implements the streaming protocol described in the Anthropic docs:
//! 1. `message_start` -- Message object with initial usage
//! 2. Per block: `content_block_start` -> N x `content_block_delta` -> `content_block_stop`
//! 3. `message_delta` -- stop_reason and cumulative usage
//! 4. `message_stop` -- final event
//! 5. `ping` events may appear anywhere (keepalive)
//! 6. `error` events may appear mid-stream
//!
//! Dropping the returned stream closes the HTTP connection; that is how
//! cancellation reaches the transport.

use futures_util::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use secrecy::{ExposeSecret, SecretString};

use revlens_core::llm::client::EventStream;
use revlens_types::llm::{LlmError, StopReason, StreamEvent, Usage};

use super::client::{API_VERSION, error_from_status, retry_after_ms};
use super::types::{
    AnthropicDelta, AnthropicRequest, ContentBlockDeltaPayload, ErrorPayload,
    MessageDeltaPayload, MessageStartPayload,
};

/// Per-stream state carried between SSE events.
#[derive(Debug, Default)]
pub(crate) struct StreamState {
    input_tokens: u32,
    finished: bool,
}

/// Map one SSE event to zero or more [`StreamEvent`]s.
pub(crate) fn process_anthropic_event(
    event_type: &str,
    json_data: &str,
    state: &mut StreamState,
) -> Result<Vec<StreamEvent>, LlmError> {
    let mut events = Vec::new();

    match event_type {
        "message_start" => {
            let payload: MessageStartPayload = serde_json::from_str(json_data)
                .map_err(|e| LlmError::Deserialization(format!("message_start: {e}")))?;
            if let Some(usage) = payload.message.usage {
                state.input_tokens = usage.input_tokens;
            }
            tracing::debug!(
                message_id = %payload.message.id,
                model = %payload.message.model,
                "anthropic stream started"
            );
        }

        "content_block_start" | "content_block_stop" | "ping" => {}

        "content_block_delta" => {
            let payload: ContentBlockDeltaPayload = serde_json::from_str(json_data)
                .map_err(|e| LlmError::Deserialization(format!("content_block_delta: {e}")))?;
            match payload.delta {
                AnthropicDelta::TextDelta { text } if !text.is_empty() => {
                    events.push(StreamEvent::TextDelta { text });
                }
                // Thinking and signature deltas are not part of the visible reply.
                _ => {}
            }
        }

        "message_delta" => {
            let payload: MessageDeltaPayload = serde_json::from_str(json_data)
                .map_err(|e| LlmError::Deserialization(format!("message_delta: {e}")))?;
            let stop_reason = match payload.delta.stop_reason.as_deref() {
                Some("max_tokens") => StopReason::MaxTokens,
                Some("stop_sequence") => StopReason::StopSequence,
                Some("refusal") => StopReason::Refusal,
                _ => StopReason::EndTurn,
            };
            events.push(StreamEvent::Usage(Usage {
                input_tokens: state.input_tokens.max(payload.usage.input_tokens),
                output_tokens: payload.usage.output_tokens,
            }));
            events.push(StreamEvent::MessageDelta { stop_reason });
        }

        "message_stop" => {
            state.finished = true;
            events.push(StreamEvent::Done);
        }

        "error" => {
            let payload: ErrorPayload = serde_json::from_str(json_data)
                .map_err(|e| LlmError::Deserialization(format!("error event: {e}")))?;
            let err = match payload.error.error_type.as_str() {
                "overloaded_error" => LlmError::Overloaded(payload.error.message),
                "rate_limit_error" => LlmError::RateLimited {
                    retry_after_ms: None,
                },
                "authentication_error" => LlmError::AuthenticationFailed,
                "invalid_request_error" => LlmError::InvalidRequest(payload.error.message),
                _ => LlmError::Provider {
                    message: payload.error.message,
                },
            };
            return Err(err);
        }

        unknown => {
            tracing::warn!(event_type = unknown, "unknown anthropic event type, skipping");
        }
    }

    Ok(events)
}

/// Open a streaming SSE connection to the Anthropic Messages API.
///
/// The returned stream yields `Connected` once the response headers arrive,
/// then text deltas, usage and the stop reason, and ends after `Done`.
pub fn create_anthropic_stream(
    client: &reqwest::Client,
    url: &str,
    body: AnthropicRequest,
    api_key: &SecretString,
) -> EventStream {
    let builder = client
        .post(url)
        .header("x-api-key", api_key.expose_secret())
        .header("anthropic-version", API_VERSION)
        .header("content-type", "application/json")
        .json(&body);

    Box::pin(async_stream::try_stream! {
        let mut source = EventSource::new(builder).map_err(|e| LlmError::Provider {
            message: format!("failed to open event stream: {e}"),
        })?;
        let mut state = StreamState::default();

        while let Some(next) = source.next().await {
            match next {
                Ok(Event::Open) => {
                    yield StreamEvent::Connected;
                }
                Ok(Event::Message(message)) => {
                    let events = process_anthropic_event(&message.event, &message.data, &mut state);
                    let events = match events {
                        Ok(events) => events,
                        Err(err) => {
                            source.close();
                            Err(err)?
                        }
                    };
                    for event in events {
                        yield event;
                    }
                    if state.finished {
                        source.close();
                        break;
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => {
                    source.close();
                    if !state.finished {
                        Err::<(), _>(LlmError::Stream("stream ended before message_stop".to_string()))?;
                    }
                    break;
                }
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                    source.close();
                    let retry_after = retry_after_ms(response.headers());
                    let error_body = response.text().await.unwrap_or_default();
                    tracing::warn!(status = %status, "anthropic stream API error response");
                    Err::<(), _>(error_from_status(status.as_u16(), &error_body, retry_after))?;
                }
                Err(err) => {
                    source.close();
                    Err::<(), _>(LlmError::Stream(err.to_string()))?;
                }
            }
        }
    })
}
