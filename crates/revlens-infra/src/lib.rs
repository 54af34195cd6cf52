//! Infrastructure layer for revlens.
//!
//! Implementations of the ports defined in `revlens-core`: the SQLite
//! key-value store behind the review cache, the Anthropic model client and
//! its factory, environment and OS keychain credential stores, a
//! snapshot-directory code host, and the global config loader.

pub mod config;
pub mod filesystem;
pub mod keychain;
pub mod llm;
pub mod secret;
pub mod sqlite;
