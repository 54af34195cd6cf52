//! SQLite persistence for the review cache.

pub mod kv;
pub mod pool;
