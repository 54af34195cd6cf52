//! Persisted layout types for revlens.
//!
//! Each cache collection lives under one key-value store name and is written
//! whole as a [`StoredCollection`] envelope carrying a schema version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store name holding the session record list.
pub const SESSIONS_COLLECTION: &str = "revlens.sessions";

/// Store name holding per-session, per-file chat transcripts.
pub const CHAT_HISTORIES_COLLECTION: &str = "revlens.chat_histories";

/// Store name holding the recently-viewed index.
pub const RECENT_SESSIONS_COLLECTION: &str = "revlens.recent_sessions";

/// Schema version written by this build.
pub const SCHEMA_VERSION: u32 = 1;

/// Versioned envelope around a whole collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCollection<T> {
    pub schema_version: u32,
    pub items: T,
}

impl<T> StoredCollection<T> {
    pub fn current(items: T) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            items,
        }
    }
}

/// Metadata about one stored name, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreEntry {
    pub name: String,
    /// Size of the serialized value.
    pub bytes: usize,
    pub updated_at: DateTime<Utc>,
}
