// Event scheduler engine implementation

use crate::errors::ScheduleError;
use crate::models::{EventDefinition, Occurrence};
use crate::notify::{render_notice, Notifier};
use crate::schedule::{next_occurrence, FirePlan};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument};

/// Pause before recomputing after an unexpected schedule failure, so a
/// persistent fault cannot spin the chain hot.
const RETRY_DELAY: StdDuration = StdDuration::from_secs(60);

/// Configuration for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Minutes ahead of an occurrence start the warning notice fires.
    pub warning_lead_minutes: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            warning_lead_minutes: 15,
        }
    }
}

/// Owns one self-perpetuating timer chain per configured event.
///
/// Each chain computes the next occurrence from the current clock,
/// arms the warning and start delays, broadcasts at each firing, and
/// re-arms itself after the start firing, until `stop`.
pub struct EventScheduler {
    config: SchedulerConfig,
    events: Vec<EventDefinition>,
    timezone: Tz,
    notifier: Arc<Notifier>,
    shutdown_tx: tokio::sync::broadcast::Sender<()>,
}

impl EventScheduler {
    pub fn new(
        config: SchedulerConfig,
        events: Vec<EventDefinition>,
        timezone: Tz,
        notifier: Arc<Notifier>,
    ) -> Self {
        let (shutdown_tx, _shutdown_rx) = tokio::sync::broadcast::channel(1);
        Self {
            config,
            events,
            timezone,
            notifier,
            shutdown_tx,
        }
    }

    /// Validate every definition, then run one chain per event until
    /// shutdown. Returns only after all chains have stopped.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<(), ScheduleError> {
        // Refuse to arm anything on an invalid definition.
        for event in &self.events {
            event.validate()?;
        }

        info!(
            events = self.events.len(),
            timezone = %self.timezone,
            warning_lead_minutes = self.config.warning_lead_minutes,
            "Starting event scheduler"
        );

        let mut handles = Vec::with_capacity(self.events.len());
        for event in self.events.clone() {
            let notifier = self.notifier.clone();
            let timezone = self.timezone;
            let warning_lead = Duration::minutes(self.config.warning_lead_minutes);
            let mut shutdown_rx = self.shutdown_tx.subscribe();

            handles.push(tokio::spawn(async move {
                info!(event = %event.name, "Event chain armed");
                loop {
                    let now = Utc::now().with_timezone(&timezone);
                    tokio::select! {
                        _ = shutdown_rx.recv() => {
                            info!(event = %event.name, "Event chain stopped");
                            break;
                        }
                        _ = Self::run_cycle(&event, timezone, warning_lead, &notifier, now) => {}
                    }
                }
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }

        info!("Event scheduler stopped");
        Ok(())
    }

    /// Signal all chains to stop after their current await point.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// One full occurrence cycle: compute, warn (when there is enough
    /// lead), fire the start notice. Returning re-arms the chain.
    /// Nothing in here may propagate a failure: an escaped error
    /// would silently kill the event's recurring chain.
    #[instrument(skip(event, notifier, now), fields(event = %event.name))]
    async fn run_cycle(
        event: &EventDefinition,
        timezone: Tz,
        warning_lead: Duration,
        notifier: &Notifier,
        now: DateTime<Tz>,
    ) -> Option<Occurrence> {
        let start = match next_occurrence(now, event.phase_offset_hours, event.period_hours) {
            Ok(start) => start,
            Err(e) => {
                // Definitions are validated at startup, so hitting
                // this means something unexpected; keep the chain
                // alive and try again.
                error!(error = %e, "Failed to compute next occurrence, retrying");
                sleep(RETRY_DELAY).await;
                return None;
            }
        };
        let occurrence = Occurrence {
            start,
            event: event.clone(),
        };

        let plan = FirePlan::new(start - now, warning_lead);
        debug!(
            start = %start,
            warning_armed = plan.warning_delay.is_some(),
            "Occurrence scheduled"
        );

        if let Some(delay) = plan.warning_delay {
            sleep(delay).await;
            let text = format!("**{}** is starting soon!", occurrence.event.name);
            notifier
                .broadcast(&render_notice(&occurrence, Some(&text)))
                .await;
        }

        // Re-measure so warning broadcast latency cannot push the
        // start firing late, and re-arming never accumulates drift.
        let now = Utc::now().with_timezone(&timezone);
        let remaining = (occurrence.start - now)
            .to_std()
            .unwrap_or(StdDuration::ZERO);
        sleep(remaining).await;

        info!(event = %occurrence.event.name, start = %occurrence.start, "Event starting");
        notifier.broadcast(&render_notice(&occurrence, None)).await;

        Some(occurrence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SendError;
    use crate::models::EventNotice;
    use crate::registry::ChannelRegistry;
    use crate::storage::JsonStore;
    use crate::transport::ChannelSender;
    use async_trait::async_trait;
    use chrono::{TimeZone, Timelike};
    use tempfile::tempdir;
    use tokio::sync::Mutex;

    #[test]
    fn test_scheduler_config_default() {
        let config = SchedulerConfig::default();
        assert_eq!(config.warning_lead_minutes, 15);
    }

    #[test]
    fn test_scheduler_config_custom() {
        let config = SchedulerConfig {
            warning_lead_minutes: 5,
        };
        assert_eq!(config.warning_lead_minutes, 5);
    }

    struct RecordingSender {
        bodies: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChannelSender for RecordingSender {
        async fn send(&self, _channel_id: &str, notice: &EventNotice) -> Result<(), SendError> {
            self.bodies.lock().await.push(notice.body.clone());
            Ok(())
        }
    }

    fn event() -> EventDefinition {
        EventDefinition {
            name: "Battle for Ashenvale".to_string(),
            phase_offset_hours: 1,
            period_hours: 3,
            duration_hours: 1.0,
            region: "Ashenvale".to_string(),
            color: 0x0099FF,
        }
    }

    async fn notifier_with_sender(
        dir: &std::path::Path,
    ) -> (Arc<Notifier>, Arc<RecordingSender>) {
        let registry = Arc::new(ChannelRegistry::open(
            JsonStore::open(dir.join("channels.json")).unwrap(),
        ));
        registry.upsert("guild-1", "chan-1").await.unwrap();
        let sender = Arc::new(RecordingSender {
            bodies: Mutex::new(Vec::new()),
        });
        (
            Arc::new(Notifier::new(sender.clone(), registry)),
            sender,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_fires_warning_before_start() {
        let dir = tempdir().unwrap();
        let (notifier, sender) = notifier_with_sender(dir.path()).await;

        let tz: Tz = "UTC".parse().unwrap();
        // Exactly on a non-aligned top of hour: 05:00 with period 3,
        // offset 1 puts the occurrence at 07:00, two hours of lead.
        let now = tz.with_ymd_and_hms(2026, 3, 10, 5, 0, 0).unwrap();

        let fired =
            EventScheduler::run_cycle(&event(), tz, Duration::minutes(15), &notifier, now)
                .await
                .unwrap();
        assert_eq!(fired.start.hour(), 7);

        let bodies = sender.bodies.lock().await.clone();
        assert_eq!(bodies.len(), 2);
        assert!(bodies[0].contains("starting soon"));
        assert!(bodies[1].contains("is starting in"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_skips_warning_when_under_lead() {
        let dir = tempdir().unwrap();
        let (notifier, sender) = notifier_with_sender(dir.path()).await;

        let tz: Tz = "UTC".parse().unwrap();
        // 06:50 with period 3, offset 1: ten minutes to 07:00, under a
        // 15-minute lead, so only the start notice goes out.
        let now = tz.with_ymd_and_hms(2026, 3, 10, 6, 50, 0).unwrap();

        let fired =
            EventScheduler::run_cycle(&event(), tz, Duration::minutes(15), &notifier, now)
                .await
                .unwrap();
        assert_eq!(fired.start.hour(), 7);

        let bodies = sender.bodies.lock().await.clone();
        assert_eq!(bodies.len(), 1);
        assert!(bodies[0].contains("is starting in"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_targets_a_strictly_later_occurrence() {
        let dir = tempdir().unwrap();
        let (notifier, _sender) = notifier_with_sender(dir.path()).await;

        let tz: Tz = "UTC".parse().unwrap();
        let now = tz.with_ymd_and_hms(2026, 3, 10, 5, 0, 0).unwrap();

        let first =
            EventScheduler::run_cycle(&event(), tz, Duration::minutes(15), &notifier, now)
                .await
                .unwrap();
        // The chain re-arms from the moment the start fired.
        let second = EventScheduler::run_cycle(
            &event(),
            tz,
            Duration::minutes(15),
            &notifier,
            first.start,
        )
        .await
        .unwrap();

        assert!(second.start > first.start);
        assert_eq!(second.start - first.start, Duration::hours(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_stop_terminate_all_chains() {
        let dir = tempdir().unwrap();
        let (notifier, _sender) = notifier_with_sender(dir.path()).await;

        let scheduler = Arc::new(EventScheduler::new(
            SchedulerConfig::default(),
            vec![event()],
            "UTC".parse().unwrap(),
            notifier,
        ));

        let runner = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.start().await })
        };
        tokio::task::yield_now().await;
        scheduler.stop();

        let result = tokio::time::timeout(StdDuration::from_secs(30), runner)
            .await
            .expect("scheduler did not stop")
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_definitions_before_arming() {
        let dir = tempdir().unwrap();
        let (notifier, sender) = notifier_with_sender(dir.path()).await;

        let mut bad = event();
        bad.phase_offset_hours = 7;
        let scheduler =
            EventScheduler::new(SchedulerConfig::default(), vec![bad], "UTC".parse().unwrap(), notifier);

        assert!(scheduler.start().await.is_err());
        assert!(sender.bodies.lock().await.is_empty());
    }
}
