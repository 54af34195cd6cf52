//! Test doubles shared by the core test modules.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;

use revlens_types::llm::{
    CompletionRequest, LlmError, OutputSchema, StopReason, StreamEvent, Usage,
};
use revlens_types::session::{FileChange, FileStatus, HostKind, SessionIdentifier, SessionSnapshot};

use crate::llm::box_client::BoxModelClient;
use crate::llm::client::{EventStream, ModelClient};
use crate::llm::factory::ModelClientFactory;

pub type Structured = Arc<dyn Fn() -> Result<serde_json::Value, LlmError> + Send + Sync>;

/// Scripted stream: events, then an optional trailing error.
#[derive(Clone, Default)]
pub struct Script {
    pub events: Vec<StreamEvent>,
    pub fail_with: Option<fn() -> LlmError>,
}

pub struct MockClient {
    script: Script,
    structured: Structured,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ModelClient for MockClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate_structured(
        &self,
        request: &CompletionRequest,
        _schema: &OutputSchema,
    ) -> Result<serde_json::Value, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        (self.structured)()
    }

    fn stream_chat(&self, request: CompletionRequest) -> EventStream {
        self.requests.lock().unwrap().push(request);
        let mut items: Vec<Result<StreamEvent, LlmError>> =
            self.script.events.iter().cloned().map(Ok).collect();
        if let Some(fail) = self.script.fail_with {
            items.push(Err(fail()));
        }
        Box::pin(futures_util::stream::iter(items))
    }
}

pub struct MockFactory {
    pub script: Script,
    pub structured: Structured,
    pub fail_create: bool,
    created: AtomicUsize,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockFactory {
    /// A client whose stream yields `tokens` as text deltas.
    pub fn streaming(tokens: &[&str]) -> Self {
        let mut events = vec![StreamEvent::Connected];
        events.extend(tokens.iter().map(|t| StreamEvent::TextDelta {
            text: t.to_string(),
        }));
        events.push(StreamEvent::MessageDelta {
            stop_reason: StopReason::EndTurn,
        });
        events.push(StreamEvent::Usage(Usage {
            input_tokens: 10,
            output_tokens: tokens.len() as u32,
        }));
        events.push(StreamEvent::Done);
        Self::with(Script { events, fail_with: None }, Arc::new(|| Ok(json!({}))))
    }

    pub fn structured(reply: Structured) -> Self {
        Self::with(Script::default(), reply)
    }

    pub fn with(script: Script, structured: Structured) -> Self {
        Self {
            script,
            structured,
            fail_create: false,
            created: AtomicUsize::new(0),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> CompletionRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

impl ModelClientFactory for MockFactory {
    async fn create(&self) -> Result<BoxModelClient, LlmError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        if self.fail_create {
            return Err(LlmError::AuthenticationFailed);
        }
        Ok(BoxModelClient::new(MockClient {
            script: self.script.clone(),
            structured: Arc::clone(&self.structured),
            requests: Arc::clone(&self.requests),
        }))
    }
}

/// A one-file GitHub change request (`github.com/acme/widgets/7`).
pub fn snapshot() -> SessionSnapshot {
    SessionSnapshot {
        identifier: SessionIdentifier {
            kind: HostKind::GitHub,
            host: "github.com".to_string(),
            owner: "acme".to_string(),
            repo: "widgets".to_string(),
            number: 7,
        },
        title: "Add retry".to_string(),
        description: String::new(),
        author: "octocat".to_string(),
        state: Default::default(),
        files: vec![FileChange {
            path: "src/retry.rs".to_string(),
            status: FileStatus::Added,
            diff: "+fn retry() {}".to_string(),
            content: Some("fn retry() {}".to_string()),
            additions: 1,
            deletions: 0,
        }],
        review_comments: vec![],
        instructions: None,
        readme: None,
    }
}
