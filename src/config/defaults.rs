//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

// =============================================================================
// Server Defaults
// =============================================================================

pub fn default_server_name() -> String {
    "localhost".to_string()
}

pub fn default_metrics_port() -> u16 {
    9090
}

pub fn default_database_path() -> String {
    "syncd.db".to_string()
}

// =============================================================================
// Sync Defaults
// =============================================================================

pub fn default_sync_timeout_ms() -> u64 {
    30_000
}

pub fn default_max_sync_timeout_ms() -> u64 {
    120_000
}

pub fn default_timeline_limit() -> usize {
    20
}

pub fn default_prune_interval_secs() -> u64 {
    60
}

// =============================================================================
// Typing Defaults
// =============================================================================

pub fn default_typing_timeout_ms() -> u64 {
    30_000
}

pub fn default_typing_sweep_ms() -> u64 {
    1_000
}

// =============================================================================
// Bus Defaults
// =============================================================================

pub fn default_topic_prefix() -> String {
    "syncd".to_string()
}

pub fn default_channel_capacity() -> usize {
    1024
}
