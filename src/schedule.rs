use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{LendingError, Result};

/// fixed daily wall-clock trigger for the reconciler
///
/// the host drives its own timer; this helper only answers "when is the
/// next run" and "is a run due", so a ticker of any granularity can hit
/// the daily boundary exactly once. at-most-one-in-flight is enforced
/// separately by the reconciler's run lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySchedule {
    hour: u32,
    minute: u32,
}

impl DailySchedule {
    /// the platform default: every day at 00:00
    pub fn midnight() -> Self {
        Self { hour: 0, minute: 0 }
    }

    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(LendingError::InvalidConfiguration {
                message: format!("invalid schedule time {:02}:{:02}", hour, minute),
            });
        }
        Ok(Self { hour, minute })
    }

    /// first scheduled boundary strictly after `after`
    pub fn next_run_after(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        // hour/minute are validated at construction; clamp keeps this total
        let naive = after
            .date_naive()
            .and_hms_opt(self.hour.min(23), self.minute.min(59), 0)
            .unwrap_or_else(|| after.naive_utc());
        let candidate = Utc.from_utc_datetime(&naive);

        if candidate > after {
            candidate
        } else {
            candidate + Duration::days(1)
        }
    }

    /// check whether a run boundary has passed since the last run
    pub fn is_due(&self, last_run: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_run {
            None => true,
            Some(last) => self.next_run_after(last) <= now,
        }
    }
}

impl Default for DailySchedule {
    fn default() -> Self {
        Self::midnight()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_rejects_invalid_times() {
        assert!(DailySchedule::new(24, 0).is_err());
        assert!(DailySchedule::new(0, 60).is_err());
        assert!(DailySchedule::new(23, 59).is_ok());
    }

    #[test]
    fn test_next_run_is_next_midnight() {
        let schedule = DailySchedule::midnight();

        let midday = at(2024, 3, 10, 13, 30);
        assert_eq!(schedule.next_run_after(midday), at(2024, 3, 11, 0, 0));

        // exactly on the boundary rolls to the following day
        let midnight = at(2024, 3, 10, 0, 0);
        assert_eq!(schedule.next_run_after(midnight), at(2024, 3, 11, 0, 0));
    }

    #[test]
    fn test_is_due_once_per_day() {
        let schedule = DailySchedule::midnight();

        assert!(schedule.is_due(None, at(2024, 3, 10, 5, 0)));

        let last_run = Some(at(2024, 3, 10, 0, 0));
        assert!(!schedule.is_due(last_run, at(2024, 3, 10, 23, 59)));
        assert!(schedule.is_due(last_run, at(2024, 3, 11, 0, 0)));
    }
}
