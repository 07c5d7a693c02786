//! Telemetry utilities for request timing and span construction.

use std::time::Instant;

/// Guard for timing a sync request and recording its latency.
///
/// Records the duration when dropped, whichever way the request ends.
pub struct SyncTimer {
    start: Instant,
}

impl SyncTimer {
    /// Start timing a request.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Drop for SyncTimer {
    fn drop(&mut self) {
        crate::metrics::record_sync_duration(self.start.elapsed().as_secs_f64());
    }
}

/// Standardized span constructors for sync observability.
pub mod spans {
    use tracing::{Span, info_span};

    /// Create a span for one sync request.
    pub fn sync_request(user_id: &str, device_id: Option<&str>, since: &str) -> Span {
        if let Some(device_id) = device_id {
            info_span!("sync", user_id = %user_id, device_id = %device_id, since = %since)
        } else {
            info_span!("sync", user_id = %user_id, since = %since)
        }
    }

    /// Create a span for a bus consumer loop.
    pub fn consumer(topic: &str) -> Span {
        info_span!("consumer", topic = %topic)
    }
}
