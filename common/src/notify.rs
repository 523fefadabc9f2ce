// Notification rendering and registry-wide fan-out

use crate::models::{BroadcastReport, DeliveryOutcome, EventNotice, NoticeField, Occurrence};
use crate::registry::ChannelRegistry;
use crate::transport::ChannelSender;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Fixed illustrative image attached to every notice.
const NOTICE_IMAGE_URL: &str = "https://raw.githubusercontent.com/herald-bot/assets/main/horn.png";

/// Render a notification payload for one occurrence.
///
/// `override_text` replaces the canned "is starting" body when given
/// (the pre-event warning uses this). Start and end times are rendered
/// in the occurrence's zone with its label; recipients all see the
/// same process-wide zone.
pub fn render_notice(occurrence: &Occurrence, override_text: Option<&str>) -> EventNotice {
    let event = &occurrence.event;
    let body = match override_text {
        Some(text) => text.to_string(),
        None => format!("**{}** is starting in {}!", event.name, event.region),
    };

    EventNotice {
        color: event.color,
        body,
        image_url: NOTICE_IMAGE_URL.to_string(),
        fields: vec![
            NoticeField {
                name: "Starts".to_string(),
                value: occurrence.start.format("%H:%M %Z").to_string(),
            },
            NoticeField {
                name: "Ends".to_string(),
                value: occurrence.end().format("%H:%M %Z").to_string(),
            },
        ],
    }
}

/// Fans a rendered notice out to every registered destination,
/// isolating per-destination failures.
pub struct Notifier {
    sender: Arc<dyn ChannelSender>,
    registry: Arc<ChannelRegistry>,
}

impl Notifier {
    pub fn new(sender: Arc<dyn ChannelSender>, registry: Arc<ChannelRegistry>) -> Self {
        Self { sender, registry }
    }

    /// Send `notice` to every channel in the current registry
    /// snapshot. All sends run concurrently; a failure in one is
    /// logged and does not abort the others. Returns only after every
    /// attempt has completed. No retries: a dropped delivery is
    /// retried implicitly at the next occurrence.
    #[instrument(skip(self, notice))]
    pub async fn broadcast(&self, notice: &EventNotice) -> BroadcastReport {
        let snapshot = self.registry.read().await;

        let sends = snapshot.into_iter().map(|(guild_id, channel_id)| {
            let sender = self.sender.clone();
            let notice = notice.clone();
            async move {
                let result = sender.send(&channel_id, &notice).await;
                if let Err(e) = &result {
                    warn!(
                        guild_id = %guild_id,
                        channel_id = %channel_id,
                        error = %e,
                        "Notice delivery failed"
                    );
                }
                DeliveryOutcome {
                    guild_id,
                    channel_id,
                    result,
                }
            }
        });

        let report = BroadcastReport {
            outcomes: join_all(sends).await,
        };
        info!(
            delivered = report.delivered(),
            failed = report.failed(),
            "Broadcast complete"
        );
        report
    }
}
