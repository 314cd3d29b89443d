//! Bridge metrics
//!
//! Thin wrappers over the `metrics` facade so metric names live in one place.
//! Without an installed recorder every call is a no-op.

use metrics::{counter, gauge, histogram};

/// Record a transport message received
///
/// Unlabelled: topics embed device identifiers.
pub fn record_message_received() {
    counter!("telemetry_bridge_messages_received_total").increment(1);
}

/// Record a payload that could not be decoded
pub fn record_decode_failure() {
    counter!("telemetry_bridge_decode_failures_total").increment(1);
}

/// Record the number of tasks waiting in a queue
pub fn record_queue_depth(queue: &str, depth: usize) {
    gauge!(
        "telemetry_bridge_queue_depth",
        "queue" => queue.to_string()
    )
    .set(depth as f64);
}

/// Record a finished task
pub fn record_task_outcome(queue: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "telemetry_bridge_tasks_total",
        "queue" => queue.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record the wall time spent processing one event
pub fn record_event_duration_ms(duration_ms: f64) {
    histogram!("telemetry_bridge_event_duration_ms").record(duration_ms);
}

/// Record a cache lookup for a resource kind (`device` / `sensor`)
pub fn record_cache_lookup(kind: &'static str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!(
        "telemetry_bridge_cache_lookups_total",
        "kind" => kind,
        "result" => result
    )
    .increment(1);
}

/// Record a remote resource creation (`device` / `sensor`)
pub fn record_resource_created(kind: &'static str) {
    counter!("telemetry_bridge_resources_created_total", "kind" => kind).increment(1);
}

/// Record a failed resolution that caused an event or metric to be dropped
pub fn record_resolution_failure(kind: &'static str) {
    counter!("telemetry_bridge_resolution_failures_total", "kind" => kind).increment(1);
}

/// Record an appended sample
pub fn record_sample_appended() {
    counter!("telemetry_bridge_samples_appended_total").increment(1);
}

/// Record a persisted geolocation change
pub fn record_geolocation_update() {
    counter!("telemetry_bridge_geolocation_updates_total").increment(1);
}
