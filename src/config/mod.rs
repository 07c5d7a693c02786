//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, ServerConfig, DatabaseConfig)
//! - [`sync`]: Long-poll, notifier, typing and bus tuning
//! - [`defaults`]: serde default value functions
//! - [`validation`]: startup sanity checks

mod defaults;
mod sync;
mod types;
mod validation;

pub use sync::{BusConfig, NotifierConfig, SyncConfig, TypingConfig};
pub use types::{Config, ConfigError, DatabaseConfig, ServerConfig};
pub use validation::{ValidationError, validate};
