//! Storage abstractions for revlens.
//!
//! Defines the key-value store port, the in-process implementation used by
//! tests, and the versioned collection codec shared by the cache
//! repositories. The SQLite implementation lives in revlens-infra.

pub mod collection;
pub mod kv_store;
pub mod memory;
