// Error handling framework

use thiserror::Error;

/// Schedule-related errors
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Invalid period: {0} (must be between 1 and 24 hours)")]
    InvalidPeriod(u32),

    #[error("Invalid phase offset {offset} for period {period} (must be in [0, period))")]
    InvalidPhaseOffset { offset: u32, period: u32 },

    #[error("Invalid duration: {0} hours (must be positive)")]
    InvalidDuration(f64),

    #[error("Local time {0} does not exist in the configured time zone")]
    UnrepresentableLocalTime(String),
}

/// Storage errors for the registry backing store
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Data directory does not exist: {0}")]
    MissingDataDir(String),

    #[error("Filesystem error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed registry content in {path}: {reason}")]
    MalformedContent { path: String, reason: String },
}

/// Delivery errors surfaced by the channel send contract
#[derive(Error, Debug)]
pub enum SendError {
    #[error("Channel not found: {0}")]
    NotFound(String),

    #[error("Missing permission to post in channel: {0}")]
    Forbidden(String),

    #[error("Delivery failed: {0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_error_display() {
        let err = ScheduleError::InvalidPhaseOffset {
            offset: 5,
            period: 3,
        };
        assert!(err.to_string().contains("phase offset 5"));
    }

    #[test]
    fn test_storage_error_missing_dir() {
        let err = StorageError::MissingDataDir("/var/lib/herald".to_string());
        assert!(err.to_string().contains("/var/lib/herald"));
    }

    #[test]
    fn test_send_error_distinguishable() {
        let not_found = SendError::NotFound("123".to_string());
        let forbidden = SendError::Forbidden("123".to_string());
        assert!(not_found.to_string().contains("not found"));
        assert!(forbidden.to_string().contains("permission"));
    }
}
