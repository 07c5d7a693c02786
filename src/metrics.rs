//! Prometheus metrics collection for syncd-ng.
//!
//! Exposed on an HTTP endpoint (see [`crate::http`]). Tracks stream
//! positions, notifier fan-out, long-poll outcomes and consumer health.
//!
//! - `syncd_stream_position{category}` - current high-water mark per category
//! - `syncd_announcements_total{category}` - announces issued per category
//! - `syncd_wait_outcomes_total{outcome}` - woken / timed_out / canceled
//! - `syncd_active_waiters` - requests currently blocked in the notifier
//! - `syncd_consumer_messages_total{topic, result}` - bus messages handled
//! - `syncd_sync_duration_seconds` - end-to-end sync request latency

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

/// Announcements issued by category.
pub static ANNOUNCEMENTS: OnceLock<IntCounterVec> = OnceLock::new();

/// Notifier wait results by outcome.
pub static WAIT_OUTCOMES: OnceLock<IntCounterVec> = OnceLock::new();

/// Bus messages handled by topic and result.
pub static CONSUMER_MESSAGES: OnceLock<IntCounterVec> = OnceLock::new();

/// Sync requests failed by error code.
pub static SYNC_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges (can increase/decrease)
// ========================================================================

/// Requests currently blocked in the notifier.
pub static ACTIVE_WAITERS: OnceLock<IntGauge> = OnceLock::new();

/// Scope entries held by the notifier registry.
pub static NOTIFIER_SCOPES: OnceLock<IntGauge> = OnceLock::new();

/// Latest position per category.
pub static STREAM_POSITION: OnceLock<IntGaugeVec> = OnceLock::new();

// ========================================================================
// Histograms
// ========================================================================

/// End-to-end sync request latency.
pub static SYNC_DURATION: OnceLock<Histogram> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at server startup before any metrics are recorded.
/// Recording before `init` is a no-op.
pub fn init() {
    let r = registry();

    // Helper macro to register metric
    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(ANNOUNCEMENTS, IntCounterVec::new(Opts::new("syncd_announcements_total", "Notifier announcements by category"), &["category"]));
    register!(WAIT_OUTCOMES, IntCounterVec::new(Opts::new("syncd_wait_outcomes_total", "Notifier wait results by outcome"), &["outcome"]));
    register!(CONSUMER_MESSAGES, IntCounterVec::new(Opts::new("syncd_consumer_messages_total", "Bus messages handled by topic and result"), &["topic", "result"]));
    register!(SYNC_ERRORS, IntCounterVec::new(Opts::new("syncd_sync_errors_total", "Failed sync requests by error code"), &["error"]));
    register!(ACTIVE_WAITERS, IntGauge::new("syncd_active_waiters", "Requests blocked in the notifier"));
    register!(NOTIFIER_SCOPES, IntGauge::new("syncd_notifier_scopes", "Scope entries held by the notifier"));
    register!(STREAM_POSITION, IntGaugeVec::new(Opts::new("syncd_stream_position", "Latest stream position by category"), &["category"]));
    register!(SYNC_DURATION, Histogram::with_opts(
        HistogramOpts::new("syncd_sync_duration_seconds", "Sync request latency including long-poll wait")
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0])));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions for metric updates
// ============================================================================

fn get_counter_vec(metric: &OnceLock<IntCounterVec>) -> Option<&IntCounterVec> {
    metric.get()
}

fn get_gauge(metric: &OnceLock<IntGauge>) -> Option<&IntGauge> {
    metric.get()
}

/// Record an announce for `category`.
#[inline]
pub fn record_announce(category: &str) {
    if let Some(c) = get_counter_vec(&ANNOUNCEMENTS) {
        c.with_label_values(&[category]).inc();
    }
}

/// Record how a notifier wait ended.
#[inline]
pub fn record_wait_outcome(outcome: &str) {
    if let Some(c) = get_counter_vec(&WAIT_OUTCOMES) {
        c.with_label_values(&[outcome]).inc();
    }
}

/// Record the result of handling one bus message.
#[inline]
pub fn record_consumer_message(topic: &str, result: &str) {
    if let Some(c) = get_counter_vec(&CONSUMER_MESSAGES) {
        c.with_label_values(&[topic, result]).inc();
    }
}

/// Record a failed sync request.
#[inline]
pub fn record_sync_error(error: &str) {
    if let Some(c) = get_counter_vec(&SYNC_ERRORS) {
        c.with_label_values(&[error]).inc();
    }
}

/// Record the duration of one sync request.
#[inline]
pub fn record_sync_duration(duration_secs: f64) {
    if let Some(h) = SYNC_DURATION.get() {
        h.observe(duration_secs);
    }
}

/// Adjust the blocked-waiter gauge.
#[inline]
pub fn add_active_waiters(delta: i64) {
    if let Some(g) = get_gauge(&ACTIVE_WAITERS) {
        g.add(delta);
    }
}

/// Set the notifier scope gauge.
#[inline]
pub fn set_notifier_scopes(count: usize) {
    if let Some(g) = get_gauge(&NOTIFIER_SCOPES) {
        g.set(i64::try_from(count).unwrap_or(i64::MAX));
    }
}

/// Set the position gauge for `category`.
#[inline]
pub fn set_stream_position(category: &str, position: u64) {
    if let Some(g) = STREAM_POSITION.get() {
        g.with_label_values(&[category])
            .set(i64::try_from(position).unwrap_or(i64::MAX));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_lifecycle() {
        init();

        record_announce("receipt");
        record_wait_outcome("woken");
        set_stream_position("receipt", 42);

        let output = gather_metrics();
        assert!(output.contains("syncd_announcements_total"));
        assert!(output.contains("syncd_stream_position"));
    }
}
