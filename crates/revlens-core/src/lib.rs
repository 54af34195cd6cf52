//! Business logic and port definitions for revlens.
//!
//! This crate owns the session cache, the model-client and code-host
//! "ports" that the infrastructure layer implements, and the AI
//! orchestration built on top of them. It depends only on `revlens-types`
//! -- never on `revlens-infra` or any database/IO crate.

pub mod ai;
pub mod cache;
pub mod credential;
pub mod host;
pub mod llm;
pub mod review;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;
