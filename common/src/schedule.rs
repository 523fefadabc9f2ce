// Schedule calculation module
//
// Pure next-occurrence math for events that recur on a fixed hourly
// cadence, plus planning of the per-occurrence timer delays.

use crate::errors::ScheduleError;
use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use chrono_tz::Tz;
use std::time::Duration as StdDuration;

/// Calculate the next occurrence of an event aligned so that
/// `hour mod period_hours == phase_offset_hours`.
///
/// The result is always a top-of-hour instant strictly after `now` and
/// at most `period_hours` hours away. When `now` is already exactly on
/// an aligned hour the next occurrence is one full period later:
/// chains are only (re)armed after a prior occurrence has fired, so
/// the current hour is never a valid target.
///
/// Hour values past 23 wrap into the next calendar day. Day-over-day
/// hour alignment is stable when the period divides 24; other periods
/// still honor the strictly-future and at-most-one-period bounds.
pub fn next_occurrence(
    now: DateTime<Tz>,
    phase_offset_hours: u32,
    period_hours: u32,
) -> Result<DateTime<Tz>, ScheduleError> {
    if period_hours == 0 || period_hours > 24 {
        return Err(ScheduleError::InvalidPeriod(period_hours));
    }
    if phase_offset_hours >= period_hours {
        return Err(ScheduleError::InvalidPhaseOffset {
            offset: phase_offset_hours,
            period: period_hours,
        });
    }

    let hour = now.hour();
    let remainder = period_hours - (hour % period_hours) + phase_offset_hours;
    // A phase offset can push the raw remainder past a full period;
    // fold it back so the target stays within one period of now.
    let hours_until = if remainder > period_hours {
        remainder - period_hours
    } else {
        remainder
    };

    // Build the target from local midnight so an hour value >= 24
    // lands on the next calendar day instead of an invalid hour field.
    let midnight = now.date_naive().and_time(NaiveTime::MIN);
    let target = midnight + Duration::hours((hour + hours_until) as i64);

    resolve_local(now.timezone(), target)
}

/// Map a naive local datetime onto the zone's timeline. Ambiguous
/// local times (fall-back) take the earliest mapping; nonexistent ones
/// (spring-forward gap) slide one hour later.
fn resolve_local(tz: Tz, naive: NaiveDateTime) -> Result<DateTime<Tz>, ScheduleError> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(t) => Ok(t),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => match tz.from_local_datetime(&(naive + Duration::hours(1))) {
            LocalResult::Single(t) => Ok(t),
            LocalResult::Ambiguous(earliest, _) => Ok(earliest),
            LocalResult::None => Err(ScheduleError::UnrepresentableLocalTime(naive.to_string())),
        },
    }
}

/// The two one-shot delays armed for a single occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirePlan {
    /// Delay until the pre-event warning, `None` when the occurrence
    /// is closer than the warning lead (the warning is skipped for the
    /// whole cycle rather than fired late or with a negative delay).
    pub warning_delay: Option<StdDuration>,
    /// Delay until the start notification. Always armed.
    pub start_delay: StdDuration,
}

impl FirePlan {
    pub fn new(time_to_start: Duration, warning_lead: Duration) -> Self {
        let start_delay = time_to_start.to_std().unwrap_or(StdDuration::ZERO);
        // to_std fails on negative durations, which is exactly the
        // suppression condition.
        let warning_delay = (time_to_start - warning_lead).to_std().ok();
        Self {
            warning_delay,
            start_delay,
        }
    }
}
