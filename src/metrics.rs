// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the sync layer.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding application is responsible for choosing the exporter.
//!
//! # Metric Naming Convention
//! - `mindtrail_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `kind`: project, task, snapshot
//! - `operation`: create, update, delete, select, insert
//! - `outcome`: confirmed, local_only, rolled_back, noop

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Record the final outcome of a mutation
pub fn record_mutation(kind: &str, operation: &str, outcome: &str) {
    counter!(
        "mindtrail_mutations_total",
        "kind" => kind.to_string(),
        "operation" => operation.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a rollback and how much state it restored
pub fn record_rollback(kind: &str, scope: &str) {
    counter!(
        "mindtrail_rollbacks_total",
        "kind" => kind.to_string(),
        "scope" => scope.to_string()
    )
    .increment(1);
}

/// Record a reconciliation skipped because newer local state exists
pub fn record_stale_reconcile(kind: &str) {
    counter!(
        "mindtrail_stale_reconciles_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record a remote store failure by category
pub fn record_remote_error(target: &str, error_type: &str) {
    counter!(
        "mindtrail_remote_errors_total",
        "target" => target.to_string(),
        "error_type" => error_type.to_string()
    )
    .increment(1);
}

/// Record remote call latency
pub fn record_latency(target: &str, operation: &str, duration: Duration) {
    histogram!(
        "mindtrail_remote_seconds",
        "target" => target.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record where the bootstrap dataset came from
pub fn record_bootstrap(source: &str) {
    counter!(
        "mindtrail_bootstrap_total",
        "source" => source.to_string()
    )
    .increment(1);
}

/// Record a local cache read (hit, miss, malformed, error)
pub fn record_cache_load(outcome: &str) {
    counter!(
        "mindtrail_cache_loads_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a local cache write
pub fn record_cache_save(success: bool) {
    counter!(
        "mindtrail_cache_saves_total",
        "status" => if success { "success" } else { "error" }
    )
    .increment(1);
}

/// Record a repository lookup
pub fn record_repo_lookup(operation: &str, success: bool) {
    counter!(
        "mindtrail_repo_lookups_total",
        "operation" => operation.to_string(),
        "status" => if success { "success" } else { "error" }
    )
    .increment(1);
}

/// Set collection sizes held by the engine
pub fn set_dataset_sizes(projects: usize, tasks: usize, snapshots: usize) {
    gauge!("mindtrail_dataset_items", "kind" => "project").set(projects as f64);
    gauge!("mindtrail_dataset_items", "kind" => "task").set(tasks as f64);
    gauge!("mindtrail_dataset_items", "kind" => "snapshot").set(snapshots as f64);
}

/// Track engine lifecycle state
pub fn set_engine_state(state: &str) {
    gauge!(
        "mindtrail_engine_state",
        "state" => state.to_string()
    )
    .set(1.0);
}

/// A timing guard that records latency on drop
pub struct LatencyTimer {
    target: &'static str,
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(target: &'static str, operation: &'static str) -> Self {
        Self {
            target,
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.target, self.operation, self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    #[test]
    fn test_api_does_not_panic_without_recorder() {
        record_mutation("project", "create", "confirmed");
        record_rollback("task", "collection");
        record_stale_reconcile("task");
        record_remote_error("projects", "transport");
        record_bootstrap("remote");
        record_cache_load("hit");
        record_cache_save(true);
        record_repo_lookup("latest_commit", false);
        set_dataset_sizes(3, 10, 2);
        set_engine_state("Ready");
    }

    #[test]
    fn test_mutation_counter_is_labelled() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_mutation("task", "update", "rolled_back");
            record_mutation("task", "update", "rolled_back");
        });

        let counted = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .find(|(key, _, _, _)| key.key().name() == "mindtrail_mutations_total")
            .map(|(_, _, _, value)| value);
        assert_eq!(counted, Some(DebugValue::Counter(2)));
    }

    #[test]
    fn test_latency_timer() {
        {
            let _timer = LatencyTimer::new("tasks", "select");
            std::thread::sleep(Duration::from_micros(10));
        }
        // Timer recorded on drop
    }
}
