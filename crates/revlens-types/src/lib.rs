//! Shared domain types for revlens.
//!
//! Review sessions, checklist analysis, chat transcripts, the recency index,
//! model-client request shapes, configuration, and the error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror, schemars.

pub mod analysis;
pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod recency;
pub mod session;
pub mod storage;
