// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for vsl-core.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding agent daemon is responsible for choosing the exporter
//! (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `vsl_core_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `operation`: store, get, remove, sweep
//! - `status`: hit, miss, success, error
//! - `outcome`: insert, replace, hit, expired, miss (replay cache)

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Record a cache operation and its outcome
pub fn record_cache_operation(operation: &str, status: &str) {
    counter!(
        "vsl_core_cache_operations_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record one reclaimer sweep: entries evicted by TTL and by explicit marking
pub fn record_sweep(expired: usize, pending: usize) {
    counter!("vsl_core_sweep_expired_total").increment(expired as u64);
    counter!("vsl_core_sweep_pending_total").increment(pending as u64);
    counter!("vsl_core_sweeps_total").increment(1);
}

/// Set the current number of tracked cache entries
pub fn set_cached_nodes(count: usize) {
    gauge!("vsl_core_cached_nodes").set(count as f64);
}

/// Record one change log append
pub fn record_changelog_append() {
    counter!("vsl_core_changelog_appends_total").increment(1);
}

/// Record a delta query: raw entries in range vs. compacted result size
pub fn record_delta_query(raw: usize, compacted: usize) {
    counter!("vsl_core_delta_queries_total").increment(1);
    histogram!("vsl_core_delta_raw_entries").record(raw as f64);
    histogram!("vsl_core_delta_compacted_entries").record(compacted as f64);
}

/// Record a replay cache event
pub fn record_replay(outcome: &str) {
    counter!(
        "vsl_core_replay_events_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Set the number of live types in the type index
pub fn set_type_index_types(count: usize) {
    gauge!("vsl_core_type_index_types").set(count as f64);
}

/// Record operation latency
pub fn record_latency(operation: &str, duration: Duration) {
    histogram!(
        "vsl_core_operation_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// A timing guard that records latency on drop
pub struct LatencyTimer {
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.operation, self.start.elapsed());
    }
}

/// Convenience macro for timing operations
#[macro_export]
macro_rules! time_operation {
    ($op:expr) => {
        $crate::metrics::LatencyTimer::new($op)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests verify the API compiles and doesn't panic.
    // In production, you'd use metrics-util's Recorder for assertions.

    #[test]
    fn test_record_cache_operation() {
        record_cache_operation("get", "hit");
        record_cache_operation("store", "success");
        record_cache_operation("get", "miss");
    }

    #[test]
    fn test_record_sweep() {
        record_sweep(3, 1);
        record_sweep(0, 0);
    }

    #[test]
    fn test_gauges() {
        set_cached_nodes(42);
        set_type_index_types(7);
    }

    #[test]
    fn test_changelog_metrics() {
        record_changelog_append();
        record_delta_query(10, 4);
    }

    #[test]
    fn test_replay_metrics() {
        record_replay("insert");
        record_replay("expired");
    }

    #[test]
    fn test_latency_timer() {
        {
            let _timer = LatencyTimer::new("get");
            std::thread::sleep(Duration::from_micros(10));
        }
        // Timer recorded on drop
    }
}
