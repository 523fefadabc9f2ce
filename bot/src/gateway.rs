// Discord gateway loop: delivers slash-command interactions
//
// Maintains the WebSocket session (hello/identify/heartbeat) and
// dispatches INTERACTION_CREATE events into the command handler.
// Reconnects with capped exponential backoff.

use common::commands::{self, Command, CommandContext};
use common::registry::ChannelRegistry;
use common::transport::DiscordApi;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message as WsMsg;
use tracing::{debug, error, info, warn};

// GUILDS intent: enough for slash commands in guild channels.
const INTENTS: u64 = 1 << 0;

pub async fn run(token: String, api: Arc<DiscordApi>, registry: Arc<ChannelRegistry>) {
    let mut backoff_secs: u64 = 5;

    loop {
        let gateway_url = match api.get_gateway_url().await {
            Ok(url) => url,
            Err(e) => {
                error!(error = %e, backoff_secs, "Failed to get gateway URL, retrying");
                tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                backoff_secs = (backoff_secs * 2).min(60);
                continue;
            }
        };

        let (mut ws, _) = match tokio_tungstenite::connect_async(&gateway_url).await {
            Ok(conn) => conn,
            Err(e) => {
                error!(error = %e, backoff_secs, "Gateway connection failed, retrying");
                tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                backoff_secs = (backoff_secs * 2).min(60);
                continue;
            }
        };

        backoff_secs = 5;
        info!("Gateway connected");

        let mut heartbeat_interval_ms: u64 = 41_250;
        let mut seq: Option<u64> = None;
        let mut identified = false;

        loop {
            tokio::select! {
                msg = ws.next() => {
                    match msg {
                        Some(Ok(WsMsg::Text(text))) => {
                            let payload: serde_json::Value = match serde_json::from_str(&text) {
                                Ok(v) => v,
                                Err(_) => continue,
                            };

                            let op = payload["op"].as_u64().unwrap_or(0);
                            if let Some(s) = payload["s"].as_u64() {
                                seq = Some(s);
                            }

                            match op {
                                // Hello: adopt the heartbeat cadence and identify.
                                10 => {
                                    heartbeat_interval_ms = payload["d"]["heartbeat_interval"]
                                        .as_u64()
                                        .unwrap_or(41_250);

                                    if !identified {
                                        let identify = serde_json::json!({
                                            "op": 2,
                                            "d": {
                                                "token": token,
                                                "intents": INTENTS,
                                                "properties": {
                                                    "os": std::env::consts::OS,
                                                    "browser": "herald",
                                                    "device": "herald"
                                                }
                                            }
                                        });
                                        let _ = ws.send(WsMsg::Text(identify.to_string())).await;
                                        identified = true;
                                    }
                                }
                                // Heartbeat ACK
                                11 => {}
                                // Dispatch
                                0 => {
                                    let event_name = payload["t"].as_str().unwrap_or("");
                                    match event_name {
                                        "READY" => {
                                            let user = payload["d"]["user"]["username"]
                                                .as_str()
                                                .unwrap_or("unknown");
                                            info!(user = %user, "Gateway READY");
                                        }
                                        "INTERACTION_CREATE" => {
                                            handle_interaction(&payload["d"], &api, &registry)
                                                .await;
                                        }
                                        _ => {
                                            debug!(event = %event_name, "Ignoring gateway event");
                                        }
                                    }
                                }
                                // Reconnect request
                                7 => {
                                    warn!("Gateway requested reconnect");
                                    break;
                                }
                                // Invalid session
                                9 => {
                                    warn!("Invalid gateway session, re-identifying");
                                    identified = false;
                                }
                                _ => {}
                            }
                        }
                        Some(Ok(WsMsg::Close(_))) => {
                            warn!("Gateway closed by server");
                            break;
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "Gateway error");
                            break;
                        }
                        None => break,
                        _ => {}
                    }
                }
                _ = tokio::time::sleep(Duration::from_millis(heartbeat_interval_ms)) => {
                    let heartbeat = serde_json::json!({ "op": 1, "d": seq });
                    if ws.send(WsMsg::Text(heartbeat.to_string())).await.is_err() {
                        error!("Heartbeat send failed");
                        break;
                    }
                }
            }
        }

        info!(backoff_secs, "Gateway disconnected, reconnecting");
        tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
        backoff_secs = (backoff_secs * 2).min(60);
    }
}

/// Map one INTERACTION_CREATE dispatch onto the command surface and
/// reply. Failures are logged here; nothing propagates to the loop.
async fn handle_interaction(
    d: &serde_json::Value,
    api: &DiscordApi,
    registry: &ChannelRegistry,
) {
    // Only application commands (type 2) carry a command name.
    if d["type"].as_u64() != Some(2) {
        return;
    }

    let name = d["data"]["name"].as_str().unwrap_or("");
    let command = match Command::parse(name) {
        Some(command) => command,
        None => {
            debug!(command = %name, "Ignoring unknown command");
            return;
        }
    };

    info!(command = %name, "Processing command");
    let ctx = CommandContext {
        guild_id: d["guild_id"].as_str().map(String::from),
        channel_id: d["channel_id"].as_str().map(String::from),
    };
    let reply = commands::handle(command, &ctx, registry).await;

    let interaction_id = d["id"].as_str().unwrap_or("");
    let interaction_token = d["token"].as_str().unwrap_or("");
    if let Err(e) = api
        .create_interaction_response(
            interaction_id,
            interaction_token,
            &reply.content,
            reply.ephemeral,
        )
        .await
    {
        error!(command = %name, error = %e, "Failed to reply to interaction");
    }
}
