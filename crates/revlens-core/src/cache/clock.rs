//! Timestamp source for `saved_at` / `touched_at`.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, Utc};

/// Source of the current time for cache writes.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deterministic clock that advances by a fixed step on every reading.
///
/// Gives strictly increasing timestamps, which makes eviction order exact.
#[derive(Debug)]
pub struct ManualClock {
    next_millis: AtomicI64,
    step_millis: i64,
}

impl ManualClock {
    pub fn starting_at(start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            next_millis: AtomicI64::new(start.timestamp_millis()),
            step_millis: step.num_milliseconds().max(1),
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::starting_at(DateTime::<Utc>::UNIX_EPOCH, Duration::seconds(1))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let millis = self.next_millis.fetch_add(self.step_millis, Ordering::SeqCst);
        DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}
