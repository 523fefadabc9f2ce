// Core data model: event definitions, occurrences and notification payloads

use crate::errors::ScheduleError;
use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// A recurring real-world event that fires on a fixed hourly cadence.
///
/// One instance per event type, provided at startup and immutable for
/// the process lifetime. Occurrences align on hours where
/// `hour mod period_hours == phase_offset_hours`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDefinition {
    pub name: String,
    /// Hour-of-day, modulo the period, at which occurrences align.
    pub phase_offset_hours: u32,
    /// Hours between consecutive occurrences.
    pub period_hours: u32,
    /// How long one occurrence lasts, in hours.
    pub duration_hours: f64,
    /// Label for the zone/region the event takes place in.
    pub region: String,
    /// Accent color for rendered notifications (0xRRGGBB).
    pub color: u32,
}

impl EventDefinition {
    /// Validate the cadence parameters before any timer chain is armed.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.period_hours == 0 || self.period_hours > 24 {
            return Err(ScheduleError::InvalidPeriod(self.period_hours));
        }
        if self.phase_offset_hours >= self.period_hours {
            return Err(ScheduleError::InvalidPhaseOffset {
                offset: self.phase_offset_hours,
                period: self.period_hours,
            });
        }
        if self.duration_hours <= 0.0 {
            return Err(ScheduleError::InvalidDuration(self.duration_hours));
        }
        Ok(())
    }

    /// Duration of one occurrence as a chrono duration.
    pub fn duration(&self) -> Duration {
        Duration::milliseconds((self.duration_hours * 3_600_000.0) as i64)
    }
}

/// One concrete future firing of an event. Computed fresh each cycle,
/// consumed by the scheduler that produced it, never persisted.
#[derive(Debug, Clone)]
pub struct Occurrence {
    pub start: DateTime<Tz>,
    pub event: EventDefinition,
}

impl Occurrence {
    pub fn end(&self) -> DateTime<Tz> {
        self.start + self.event.duration()
    }
}

/// A labeled field in a rendered notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NoticeField {
    pub name: String,
    pub value: String,
}

/// Transport-agnostic rendered notification payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventNotice {
    pub color: u32,
    pub body: String,
    pub image_url: String,
    pub fields: Vec<NoticeField>,
}

/// Outcome of one destination's branch of a broadcast.
#[derive(Debug)]
pub struct DeliveryOutcome {
    pub guild_id: String,
    pub channel_id: String,
    pub result: Result<(), crate::errors::SendError>,
}

/// Summary of a completed broadcast, returned after every branch has
/// finished (success or failure).
#[derive(Debug)]
pub struct BroadcastReport {
    pub outcomes: Vec<DeliveryOutcome>,
}

impl BroadcastReport {
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.delivered()
    }
}
