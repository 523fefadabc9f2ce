// Discord REST transport and the channel send contract

use crate::errors::SendError;
use crate::models::EventNotice;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};

const API_BASE: &str = "https://discord.com/api/v10";

/// Hard ceiling on any single REST call so one stalled destination
/// cannot hold a broadcast branch open indefinitely.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Send contract consumed by the notifier: attempt delivery to one
/// destination, surfacing a distinguishable failure instead of
/// blocking forever or panicking across the fan-out boundary.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    async fn send(&self, channel_id: &str, notice: &EventNotice) -> Result<(), SendError>;
}

/// Discord REST API client.
pub struct DiscordApi {
    client: reqwest::Client,
}

impl DiscordApi {
    pub fn new(bot_token: &str) -> Result<Self, SendError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bot {bot_token}"))
            .map_err(|e| SendError::Failed(format!("Invalid bot token: {e}")))?;
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SendError::Failed(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Post a rendered notice as an embed in the given channel.
    #[instrument(skip(self, notice), fields(channel_id = %channel_id))]
    pub async fn send_notice(
        &self,
        channel_id: &str,
        notice: &EventNotice,
    ) -> Result<(), SendError> {
        let url = format!("{API_BASE}/channels/{channel_id}/messages");
        let fields: Vec<_> = notice
            .fields
            .iter()
            .map(|f| json!({ "name": f.name, "value": f.value, "inline": true }))
            .collect();
        let body = json!({
            "embeds": [{
                "color": notice.color,
                "description": notice.body,
                "thumbnail": { "url": notice.image_url },
                "fields": fields,
            }]
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SendError::Failed(format!("Request failed: {e}")))?;

        map_status(channel_id, response).await
    }

    /// Reply to a slash-command interaction. Ephemeral replies are
    /// visible only to the invoking user.
    #[instrument(skip(self, token, content))]
    pub async fn create_interaction_response(
        &self,
        interaction_id: &str,
        token: &str,
        content: &str,
        ephemeral: bool,
    ) -> Result<(), SendError> {
        let url = format!("{API_BASE}/interactions/{interaction_id}/{token}/callback");
        let mut data = json!({ "content": content });
        if ephemeral {
            data["flags"] = json!(64);
        }
        let body = json!({ "type": 4, "data": data });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SendError::Failed(format!("Request failed: {e}")))?;

        map_status(interaction_id, response).await
    }

    /// Overwrite the application's global slash commands.
    #[instrument(skip(self, definitions))]
    pub async fn register_commands(
        &self,
        application_id: &str,
        definitions: &serde_json::Value,
    ) -> Result<(), SendError> {
        let url = format!("{API_BASE}/applications/{application_id}/commands");

        let response = self
            .client
            .put(&url)
            .json(definitions)
            .send()
            .await
            .map_err(|e| SendError::Failed(format!("Request failed: {e}")))?;

        map_status(application_id, response).await?;
        debug!("Application commands registered");
        Ok(())
    }

    /// Look up the gateway WebSocket URL for this bot.
    pub async fn get_gateway_url(&self) -> Result<String, SendError> {
        let response = self
            .client
            .get(format!("{API_BASE}/gateway/bot"))
            .send()
            .await
            .map_err(|e| SendError::Failed(format!("Gateway request failed: {e}")))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SendError::Failed(format!("Invalid gateway response: {e}")))?;

        body["url"]
            .as_str()
            .map(|s| format!("{s}/?v=10&encoding=json"))
            .ok_or_else(|| SendError::Failed("No gateway URL in response".to_string()))
    }
}

async fn map_status(resource: &str, response: reqwest::Response) -> Result<(), SendError> {
    let status = response.status();
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::NOT_FOUND => Err(SendError::NotFound(resource.to_string())),
        StatusCode::FORBIDDEN => Err(SendError::Forbidden(resource.to_string())),
        s => {
            let text = response.text().await.unwrap_or_default();
            Err(SendError::Failed(format!("{s}: {text}")))
        }
    }
}

#[async_trait]
impl ChannelSender for DiscordApi {
    async fn send(&self, channel_id: &str, notice: &EventNotice) -> Result<(), SendError> {
        self.send_notice(channel_id, notice).await
    }
}
