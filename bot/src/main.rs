// Herald bot binary entry point

mod gateway;

use anyhow::Context;
use common::config::Settings;
use common::notify::Notifier;
use common::registry::ChannelRegistry;
use common::scheduler::{EventScheduler, SchedulerConfig};
use common::storage::{validate_data_dir, JsonStore};
use common::transport::DiscordApi;
use common::commands;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bot=info,common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting herald bot");

    // Load configuration
    let settings = Settings::load().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;
    settings
        .validate()
        .map_err(|reason| anyhow::anyhow!("Invalid configuration: {reason}"))?;
    info!(
        timezone = %settings.scheduler.timezone,
        events = settings.events.len(),
        "Configuration loaded"
    );

    // The data directory must exist before any scheduler is armed.
    let data_dir = Path::new(&settings.storage.data_dir);
    validate_data_dir(data_dir).map_err(|e| {
        error!(error = %e, "Cannot start bot without data directory, aborting");
        e
    })?;

    // Open the channel registry
    let store = JsonStore::open(data_dir.join(&settings.storage.registry_file))
        .context("Failed to open registry store")?;
    let registry = Arc::new(ChannelRegistry::open(store));

    // Initialize the Discord REST client
    let api = Arc::new(
        DiscordApi::new(&settings.discord.token).context("Failed to build Discord client")?,
    );

    // Register slash commands; a failure here degrades the command
    // surface but must not keep the schedulers from running.
    if let Err(e) = api
        .register_commands(&settings.discord.application_id, &commands::command_definitions())
        .await
    {
        warn!(error = %e, "Failed to register application commands");
    } else {
        info!("Application commands registered");
    }

    let notifier = Arc::new(Notifier::new(api.clone(), registry.clone()));
    let scheduler = Arc::new(EventScheduler::new(
        SchedulerConfig {
            warning_lead_minutes: settings.scheduler.warning_lead_minutes,
        },
        settings.events.clone(),
        settings.scheduler.timezone,
        notifier,
    ));

    // Set up graceful shutdown
    let scheduler_for_shutdown = scheduler.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        info!("Received Ctrl+C signal, initiating graceful shutdown");
        scheduler_for_shutdown.stop();
    });

    // Gateway loop handles the slash command surface.
    let gateway_task = tokio::spawn(gateway::run(
        settings.discord.token.clone(),
        api.clone(),
        registry.clone(),
    ));

    // Run the event chains until shutdown.
    if let Err(e) = scheduler.start().await {
        error!(error = %e, "Scheduler error");
        return Err(e.into());
    }

    gateway_task.abort();
    info!("Herald bot stopped");
    Ok(())
}
