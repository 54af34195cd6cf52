//! Bounded review-session cache.
//!
//! Three repositories over one [`KeyValueStore`](crate::storage::kv_store::KeyValueStore),
//! coordinated by [`service::ReviewCacheService`]. Callers outside this
//! module mutate the cache only through the service.

pub mod clock;
pub mod recency;
pub mod service;
pub mod session;
pub mod transcript;

pub use clock::{Clock, ManualClock, SystemClock};
pub use service::{ReviewCacheService, SweepReport};
