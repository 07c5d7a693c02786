//! Long-poll, notifier, typing and bus configuration.

use serde::Deserialize;
use std::time::Duration;

use super::defaults::{
    default_channel_capacity, default_max_sync_timeout_ms, default_prune_interval_secs,
    default_sync_timeout_ms, default_timeline_limit, default_topic_prefix,
    default_typing_sweep_ms, default_typing_timeout_ms,
};

/// Sync request configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Timeout applied when a request does not specify one.
    #[serde(default = "default_sync_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Upper bound for client-requested timeouts.
    #[serde(default = "default_max_sync_timeout_ms")]
    pub max_timeout_ms: u64,
    /// Maximum timeline events returned per room.
    #[serde(default = "default_timeline_limit")]
    pub timeline_limit: usize,
}

impl SyncConfig {
    /// Clamp a requested timeout, falling back to the default when absent.
    pub fn effective_timeout(&self, requested_ms: Option<u64>) -> Duration {
        let ms = requested_ms
            .unwrap_or(self.default_timeout_ms)
            .min(self.max_timeout_ms);
        Duration::from_millis(ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_sync_timeout_ms(),
            max_timeout_ms: default_max_sync_timeout_ms(),
            timeline_limit: default_timeline_limit(),
        }
    }
}

/// Notifier registry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    /// How often idle scope entries are pruned.
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,
}

impl NotifierConfig {
    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs)
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            prune_interval_secs: default_prune_interval_secs(),
        }
    }
}

/// Typing notification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TypingConfig {
    /// Expiry used when a typing message carries no timeout.
    #[serde(default = "default_typing_timeout_ms")]
    pub default_timeout_ms: u64,
    /// How often expired typing entries are swept.
    #[serde(default = "default_typing_sweep_ms")]
    pub sweep_interval_ms: u64,
}

impl TypingConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_typing_timeout_ms(),
            sweep_interval_ms: default_typing_sweep_ms(),
        }
    }
}

/// In-process message bus configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    /// Prefix prepended to every topic name.
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
    /// Bounded capacity of each topic channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            topic_prefix: default_topic_prefix(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requested_timeout_is_clamped() {
        let config = SyncConfig {
            default_timeout_ms: 30_000,
            max_timeout_ms: 60_000,
            timeline_limit: 10,
        };
        assert_eq!(config.effective_timeout(None), Duration::from_secs(30));
        assert_eq!(config.effective_timeout(Some(5)), Duration::from_millis(5));
        assert_eq!(
            config.effective_timeout(Some(10 * 60_000)),
            Duration::from_secs(60)
        );
    }
}
