use chrono::{DateTime, Utc};

/// Source of "now" for TTL checks, timestamps and ETAs.
pub trait ClockPort: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
