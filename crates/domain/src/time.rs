//! Time and timestamp helpers.

use chrono::{DateTime, DurationRound, TimeDelta, Utc};

/// UTC timestamp used for heartbeat ticks and date-time triggers.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Drop seconds and sub-seconds; date-time triggers have minute resolution.
#[must_use]
pub fn truncate_to_minute(ts: Timestamp) -> Timestamp {
    ts.duration_trunc(TimeDelta::minutes(1)).unwrap_or(ts)
}
