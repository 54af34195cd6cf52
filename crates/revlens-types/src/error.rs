use std::fmt;

use thiserror::Error;

use crate::llm::LlmError;

/// Errors from the key-value store and the cache repositories over it.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("query error: {0}")]
    Query(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// Stored data for a collection has a shape this build cannot read.
    #[error("collection '{collection}' has incompatible stored schema ({found})")]
    IncompatibleSchema { collection: String, found: String },
}

/// Errors from the code-host client.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("change request not found: {0}")]
    NotFound(String),

    #[error("code host unreachable: {0}")]
    Unavailable(String),

    #[error("unexpected response from code host: {0}")]
    InvalidResponse(String),
}

/// Stable error taxonomy surfaced to callers.
///
/// The presentation layer uses [`ErrorKind::as_str`] as a lookup key into
/// localized text; the core never ships human-readable strings for these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    ServiceUnavailable,
    MalformedResponse,
    Aborted,
    NotFound,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::ServiceUnavailable => "service_unavailable",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::Aborted => "aborted",
            ErrorKind::NotFound => "not_found",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from AI orchestration (checklist generation, chat, summaries).
#[derive(Debug, Error)]
pub enum AiError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("model service unavailable")]
    ServiceUnavailable(#[source] LlmError),

    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    #[error("request aborted")]
    Aborted,
}

impl AiError {
    /// The taxonomy tag for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AiError::InvalidInput(_) => ErrorKind::InvalidInput,
            AiError::ServiceUnavailable(_) => ErrorKind::ServiceUnavailable,
            AiError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            AiError::Aborted => ErrorKind::Aborted,
        }
    }
}

impl From<LlmError> for AiError {
    /// Classify a client error.
    ///
    /// Errors already carrying a known kind keep it; everything else is
    /// wrapped as `ServiceUnavailable` with the original retained as source.
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::SchemaViolation { schema, reason } => {
                AiError::MalformedResponse(format!("{schema}: {reason}"))
            }
            LlmError::Cancelled => AiError::Aborted,
            other => AiError::ServiceUnavailable(other),
        }
    }
}
