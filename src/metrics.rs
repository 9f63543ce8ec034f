// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for campaign-sync.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding application is responsible for choosing the exporter.
//!
//! # Metric Naming Convention
//! - `campaign_sync_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `level`: campaign, adgroup, lineitem
//! - `mode`: fast, basic
//! - `outcome`: success, rate_limited, timeout, error, skipped

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record the outcome of one hierarchy fetch attempt
pub fn record_fetch(level: &str, mode: &str, outcome: &str) {
    counter!(
        "campaign_sync_fetches_total",
        "level" => level.to_string(),
        "mode" => mode.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record fetch latency
pub fn record_fetch_latency(level: &str, mode: &str, duration: Duration) {
    histogram!(
        "campaign_sync_fetch_seconds",
        "level" => level.to_string(),
        "mode" => mode.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a request suppressed by the cooldown gate
pub fn record_cooldown_rejection(gate: &str) {
    counter!(
        "campaign_sync_cooldown_rejections_total",
        "gate" => gate.to_string()
    )
    .increment(1);
}

/// Record a rate-limit response from the platform
pub fn record_rate_limited(gate: &str) {
    counter!(
        "campaign_sync_rate_limited_total",
        "gate" => gate.to_string()
    )
    .increment(1);
}

/// Record a poll outcome (activity, issue report)
pub fn record_poll(operation: &str, outcome: &str) {
    counter!(
        "campaign_sync_polls_total",
        "operation" => operation.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a cache operation (load/save) outcome: hit, miss, stored, error
pub fn record_cache(operation: &str, outcome: &str) {
    counter!(
        "campaign_sync_cache_operations_total",
        "operation" => operation.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record how long a core preload pass took
pub fn record_preload(duration: Duration, fetched: usize, failed: usize) {
    histogram!("campaign_sync_preload_seconds").record(duration.as_secs_f64());
    counter!("campaign_sync_preload_nodes_total", "outcome" => "fetched").increment(fetched as u64);
    counter!("campaign_sync_preload_nodes_total", "outcome" => "failed").increment(failed as u64);
}

/// Set blended sync percentage (0 - 100)
pub fn set_sync_percent(percent: u8) {
    gauge!("campaign_sync_progress_percent").set(f64::from(percent));
}

/// Record a stale response discarded after a selection change
pub fn record_stale_discard(level: &str) {
    counter!(
        "campaign_sync_stale_discards_total",
        "level" => level.to_string()
    )
    .increment(1);
}

/// Record a recommendation apply outcome
pub fn record_recommendation_apply(category: &str, outcome: &str) {
    counter!(
        "campaign_sync_recommendation_applies_total",
        "category" => category.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record an optimistic mutation rolled back after a remote failure
pub fn record_rollback(level: &str) {
    counter!(
        "campaign_sync_rollbacks_total",
        "level" => level.to_string()
    )
    .increment(1);
}

/// Set number of live issues
pub fn set_issue_count(count: usize) {
    gauge!("campaign_sync_issues").set(count as f64);
}
