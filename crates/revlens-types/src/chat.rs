//! Per-file chat transcript types for revlens.
//!
//! A transcript is the ordered list of turns for one file inside one review
//! session. All transcripts of a session form a [`FileTranscripts`] map.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::llm::MessageRole;

/// Who produced a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatSender {
    User,
    Assistant,
}

impl fmt::Display for ChatSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatSender::User => write!(f, "user"),
            ChatSender::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for ChatSender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(ChatSender::User),
            "assistant" => Ok(ChatSender::Assistant),
            other => Err(format!("invalid chat sender: '{other}'")),
        }
    }
}

impl From<ChatSender> for MessageRole {
    fn from(sender: ChatSender) -> Self {
        match sender {
            ChatSender::User => MessageRole::User,
            ChatSender::Assistant => MessageRole::Assistant,
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// A single turn in a file discussion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub sender: ChatSender,
    pub text: String,
    /// Set when an assistant reply was cut short by cancellation.
    #[serde(default, skip_serializing_if = "is_false")]
    pub interrupted: bool,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: ChatSender::User,
            text: text.into(),
            interrupted: false,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            sender: ChatSender::Assistant,
            text: text.into(),
            interrupted: false,
        }
    }

    /// A partial assistant reply kept after the stream was aborted.
    pub fn interrupted(text: impl Into<String>) -> Self {
        Self {
            sender: ChatSender::Assistant,
            text: text.into(),
            interrupted: true,
        }
    }
}

/// All transcripts of one session, keyed by file path.
pub type FileTranscripts = BTreeMap<String, Vec<ChatTurn>>;
