//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::path::Path;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.name is required")]
    MissingServerName,
    #[error("database.path is required")]
    MissingDatabasePath,
    #[error("database.path parent directory does not exist: {0}")]
    DatabasePathInvalid(String),
    #[error("sync.default_timeout_ms ({default}) exceeds sync.max_timeout_ms ({max})")]
    DefaultTimeoutAboveMax { default: u64, max: u64 },
    #[error("sync.timeline_limit must be at least 1")]
    ZeroTimelineLimit,
    #[error("notifier.prune_interval_secs must be at least 1")]
    ZeroPruneInterval,
    #[error("typing.sweep_interval_ms must be at least 1")]
    ZeroSweepInterval,
    #[error("bus.channel_capacity must be at least 1")]
    ZeroChannelCapacity,
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.name.is_empty() {
        errors.push(ValidationError::MissingServerName);
    }

    let db_path = &config.database.path;
    if db_path.is_empty() {
        errors.push(ValidationError::MissingDatabasePath);
    } else if db_path != ":memory:"
        && let Some(parent) = Path::new(db_path).parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        errors.push(ValidationError::DatabasePathInvalid(db_path.clone()));
    }

    if config.sync.default_timeout_ms > config.sync.max_timeout_ms {
        errors.push(ValidationError::DefaultTimeoutAboveMax {
            default: config.sync.default_timeout_ms,
            max: config.sync.max_timeout_ms,
        });
    }
    if config.sync.timeline_limit == 0 {
        errors.push(ValidationError::ZeroTimelineLimit);
    }
    if config.notifier.prune_interval_secs == 0 {
        errors.push(ValidationError::ZeroPruneInterval);
    }
    if config.typing.sweep_interval_ms == 0 {
        errors.push(ValidationError::ZeroSweepInterval);
    }
    if config.bus.channel_capacity == 0 {
        errors.push(ValidationError::ZeroChannelCapacity);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
