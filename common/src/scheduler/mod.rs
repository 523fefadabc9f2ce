// Scheduler module: self-perpetuating per-event timer chains

pub mod engine;

pub use engine::{EventScheduler, SchedulerConfig};
