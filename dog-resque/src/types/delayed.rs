use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// One entry of the delayed schedule: a timestamp and its bucket size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayedTimestamp {
    /// Epoch seconds
    pub timestamp: i64,
    /// Number of payloads in the bucket
    pub count: usize,
}

impl DelayedTimestamp {
    pub fn new(timestamp: i64, count: usize) -> Self {
        Self { timestamp, count }
    }

    pub fn at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.timestamp, 0).single()
    }

    /// Whether the bucket is due at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.timestamp <= now.timestamp()
    }
}
