//! Wall-clock and pinned-clock `ClockPort` adapters.

use chrono::{DateTime, Utc};

use crate::infrastructure::ports::ClockPort;

/// Reads `Utc::now()` on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockPort for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always reports the wrapped instant.
#[cfg(test)]
pub struct FixedClock(pub DateTime<Utc>);

#[cfg(test)]
impl ClockPort for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
