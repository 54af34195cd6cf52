//! Anthropic Claude model client.
//!
//! [`AnthropicClient`] implements
//! [`ModelClient`](revlens_core::llm::client::ModelClient) for the Anthropic
//! Messages API, including SSE streaming.

pub mod client;
pub mod streaming;
pub mod types;

pub use client::AnthropicClient;
