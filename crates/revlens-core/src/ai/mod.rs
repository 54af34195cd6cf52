//! AI orchestration: prompt composition, structured checklists, streaming.

pub mod prompt;
pub mod schema;
pub mod service;

pub use service::{AiOrchestrationService, GenerationSettings};
