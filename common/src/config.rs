// Configuration management with layered configuration (file, env)

use crate::models::EventDefinition;
use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::Path;
use std::str::FromStr;

// Helper functions for Tz serialization
fn serialize_tz<S>(tz: &Tz, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&tz.to_string())
}

fn deserialize_tz<'de, D>(deserializer: D) -> Result<Tz, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Tz::from_str(&s).map_err(serde::de::Error::custom)
}

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub discord: DiscordConfig,
    pub storage: StorageConfig,
    pub scheduler: SchedulerSettings,
    pub events: Vec<EventDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Bot token used for both REST calls and the gateway session.
    pub token: String,
    /// Application id used when registering slash commands.
    pub application_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for persisted state. Must exist at startup.
    pub data_dir: String,
    /// Registry file name inside the data directory.
    pub registry_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Process-wide time zone all occurrences and notices render in.
    #[serde(serialize_with = "serialize_tz", deserialize_with = "deserialize_tz")]
    pub timezone: Tz,
    /// Minutes ahead of an occurrence start the warning fires.
    pub warning_lead_minutes: i64,
}

impl Settings {
    /// Load configuration with layered precedence: defaults → file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default configuration
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local configuration (not committed to git)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Add environment-specific configuration
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.discord.token.is_empty() {
            return Err("Discord token cannot be empty".to_string());
        }
        if self.discord.application_id.is_empty() {
            return Err("Discord application_id cannot be empty".to_string());
        }

        if self.storage.data_dir.is_empty() {
            return Err("Storage data_dir cannot be empty".to_string());
        }
        if self.storage.registry_file.is_empty() {
            return Err("Storage registry_file cannot be empty".to_string());
        }

        if self.scheduler.warning_lead_minutes <= 0 {
            return Err("Scheduler warning_lead_minutes must be greater than 0".to_string());
        }

        if self.events.is_empty() {
            return Err("At least one event definition is required".to_string());
        }
        for event in &self.events {
            event
                .validate()
                .map_err(|e| format!("Event '{}': {}", event.name, e))?;
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            discord: DiscordConfig {
                token: String::new(),
                application_id: String::new(),
            },
            storage: StorageConfig {
                data_dir: "data".to_string(),
                registry_file: "channels.json".to_string(),
            },
            scheduler: SchedulerSettings {
                timezone: chrono_tz::America::New_York,
                warning_lead_minutes: 15,
            },
            events: vec![
                EventDefinition {
                    name: "Battle for Ashenvale".to_string(),
                    phase_offset_hours: 1,
                    period_hours: 3,
                    duration_hours: 1.0,
                    region: "Ashenvale".to_string(),
                    color: 0x0099FF,
                },
                EventDefinition {
                    name: "The Blood Moon".to_string(),
                    phase_offset_hours: 0,
                    period_hours: 3,
                    duration_hours: 0.5,
                    region: "Stranglethorn Vale".to_string(),
                    color: 0x8B0000,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_settings() -> Settings {
        Settings {
            discord: DiscordConfig {
                token: "test-token".to_string(),
                application_id: "123456789".to_string(),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_settings_pass_validation() {
        assert!(valid_settings().validate().is_ok());
    }

    #[test]
    fn test_validation_catches_empty_token() {
        let settings = Settings::default();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_catches_empty_events() {
        let mut settings = valid_settings();
        settings.events.clear();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_catches_bad_event_cadence() {
        let mut settings = valid_settings();
        settings.events[0].phase_offset_hours = 5;
        settings.events[0].period_hours = 3;
        let err = settings.validate().unwrap_err();
        assert!(err.contains("Battle for Ashenvale"));
    }

    #[test]
    fn test_validation_catches_zero_warning_lead() {
        let mut settings = valid_settings();
        settings.scheduler.warning_lead_minutes = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_timezone_round_trips_through_serde() {
        let settings = valid_settings();
        let json = serde_json::to_string(&settings).unwrap();
        let parsed: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.scheduler.timezone, settings.scheduler.timezone);
    }
}
