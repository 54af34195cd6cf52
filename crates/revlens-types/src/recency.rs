//! Recently-viewed session index entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::SessionKey;

/// Read-model row for "recently viewed" listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecencyEntry {
    pub key: SessionKey,
    pub title: String,
    pub touched_at: DateTime<Utc>,
}
