//! Date-time schedules: a point in time or a recurrence.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::time::{Timestamp, truncate_to_minute};

/// Recurrence of a [`DateTimeSchedule`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "repeat", rename_all = "snake_case")]
pub enum Repeat {
    /// Fire once at `start`.
    Once,
    /// Fire `times` occurrences, `every_minutes` apart.
    Count { every_minutes: u32, times: u32 },
    /// Fire every `every_minutes` until `until` (inclusive).
    Until { every_minutes: u32, until: Timestamp },
}

/// When a date-time trigger fires.
///
/// Occurrences are computed from `start` and the recurrence; the schedule
/// remembers the last occurrence it fired for so a tick never fires the same
/// occurrence twice. Missed occurrences collapse into one firing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateTimeSchedule {
    pub start: Timestamp,
    #[serde(flatten)]
    pub repeat: Repeat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_fired: Option<Timestamp>,
}

impl DateTimeSchedule {
    #[must_use]
    pub fn new(start: Timestamp, repeat: Repeat) -> Self {
        Self {
            start: truncate_to_minute(start),
            repeat,
            last_fired: None,
        }
    }

    #[must_use]
    pub fn once(start: Timestamp) -> Self {
        Self::new(start, Repeat::Once)
    }

    #[must_use]
    pub fn last_fired(&self) -> Option<Timestamp> {
        self.last_fired
    }

    /// Latest occurrence at or before `now`, if any.
    #[must_use]
    pub fn latest_occurrence(&self, now: Timestamp) -> Option<Timestamp> {
        let now = truncate_to_minute(now);
        if now < self.start {
            return None;
        }
        match &self.repeat {
            Repeat::Once => Some(self.start),
            Repeat::Count {
                every_minutes,
                times,
            } => {
                if *times == 0 {
                    return None;
                }
                if *every_minutes == 0 {
                    return Some(self.start);
                }
                let elapsed = steps_between(self.start, now, *every_minutes);
                let index = elapsed.min(i64::from(*times) - 1);
                Some(self.occurrence(index, *every_minutes))
            }
            Repeat::Until {
                every_minutes,
                until,
            } => {
                if *until < self.start {
                    return None;
                }
                if *every_minutes == 0 {
                    return Some(self.start);
                }
                let horizon = now.min(*until);
                let index = steps_between(self.start, horizon, *every_minutes);
                Some(self.occurrence(index, *every_minutes))
            }
        }
    }

    /// First occurrence strictly after `now`, or `None` once exhausted.
    #[must_use]
    pub fn next_occurrence(&self, now: Timestamp) -> Option<Timestamp> {
        let now = truncate_to_minute(now);
        if now < self.start {
            return Some(self.start);
        }
        match &self.repeat {
            Repeat::Once => None,
            Repeat::Count {
                every_minutes,
                times,
            } => {
                if *every_minutes == 0 {
                    return None;
                }
                let index = steps_between(self.start, now, *every_minutes) + 1;
                (index < i64::from(*times)).then(|| self.occurrence(index, *every_minutes))
            }
            Repeat::Until {
                every_minutes,
                until,
            } => {
                if *every_minutes == 0 {
                    return None;
                }
                let index = steps_between(self.start, now, *every_minutes) + 1;
                let candidate = self.occurrence(index, *every_minutes);
                (candidate <= *until).then_some(candidate)
            }
        }
    }

    /// Whether no occurrence remains after `now` and the last one already fired.
    #[must_use]
    pub fn is_exhausted(&self, now: Timestamp) -> bool {
        self.next_occurrence(now).is_none() && self.latest_occurrence(now) == self.last_fired
    }

    /// Fire for the latest due occurrence that has not fired yet.
    pub fn evaluate(&mut self, now: Timestamp) -> bool {
        match self.latest_occurrence(now) {
            Some(occurrence) if self.last_fired.is_none_or(|last| last < occurrence) => {
                self.last_fired = Some(occurrence);
                true
            }
            _ => false,
        }
    }

    fn occurrence(&self, index: i64, every_minutes: u32) -> Timestamp {
        self.start + TimeDelta::minutes(index * i64::from(every_minutes))
    }
}

fn steps_between(from: Timestamp, to: Timestamp, every_minutes: u32) -> i64 {
    (to - from).num_minutes() / i64::from(every_minutes)
}
