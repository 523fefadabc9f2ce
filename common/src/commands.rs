// Slash command surface: `ping` and `channel`

use crate::registry::ChannelRegistry;
use serde_json::{json, Value};
use tracing::{error, info};

/// Recognized slash commands. Anything else is ignored by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Health check, no state change.
    Ping,
    /// Register the invoking channel as the guild's notice destination.
    Channel,
}

impl Command {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "ping" => Some(Command::Ping),
            "channel" => Some(Command::Channel),
            _ => None,
        }
    }
}

/// Where a command was invoked. Guild-less invocations (DMs) carry no
/// guild id and cannot register a channel.
#[derive(Debug, Clone, Default)]
pub struct CommandContext {
    pub guild_id: Option<String>,
    pub channel_id: Option<String>,
}

/// What to send back to the invoking user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    pub content: String,
    pub ephemeral: bool,
}

impl CommandReply {
    fn public(content: &str) -> Self {
        Self {
            content: content.to_string(),
            ephemeral: false,
        }
    }

    fn private(content: &str) -> Self {
        Self {
            content: content.to_string(),
            ephemeral: true,
        }
    }
}

/// Application-command registration payload.
pub fn command_definitions() -> Value {
    json!([
        {
            "name": "ping",
            "description": "Replies with pong!"
        },
        {
            "name": "channel",
            "description": "The horn will sound in the channel where this command is issued"
        }
    ])
}

/// Execute a command against the registry and produce the reply.
pub async fn handle(
    command: Command,
    ctx: &CommandContext,
    registry: &ChannelRegistry,
) -> CommandReply {
    match command {
        Command::Ping => CommandReply::public("pong!"),

        Command::Channel => match (&ctx.guild_id, &ctx.channel_id) {
            (Some(guild_id), Some(channel_id)) => {
                match registry.upsert(guild_id, channel_id).await {
                    Ok(()) => {
                        info!(guild_id = %guild_id, channel_id = %channel_id, "Channel command handled");
                        CommandReply::private("The horn will sound in this channel.")
                    }
                    Err(e) => {
                        error!(
                            guild_id = %guild_id,
                            channel_id = %channel_id,
                            error = %e,
                            "Failed to persist channel registration"
                        );
                        CommandReply::private(
                            "Something went wrong saving this channel, try again later.",
                        )
                    }
                }
            }
            // Invoked outside a guild: reject without mutating anything.
            _ => CommandReply::private("This command can only be used in a server."),
        },
    }
}
