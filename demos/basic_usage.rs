// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic campaign-sync usage example.
//!
//! Demonstrates:
//! 1. Selecting an account and date range (with a SQLite warm-start cache)
//! 2. Running the staged background preload and watching progress
//! 3. Expanding a row on demand
//! 4. Reviewing issues and recommendations
//! 5. Applying a recommendation (confirmation flow)
//! 6. Displaying metrics
//!
//! The ads platform is an in-process fake, so no credentials are needed.
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

use campaign_sync::cache::CacheLayer;
use campaign_sync::model::{
    keys, AccountKey, AdGroup, Budget, Campaign, DateRange, Entity, EntityStatus, Level, LineItem,
};
use campaign_sync::{
    ActivityEntry, AdsApi, ApiError, ApplyOutcome, BidUpdate, FetchMode, Issue, NodeKey, SyncConfig,
    SyncOrchestrator,
};

/// Fake ads platform with a little latency.
struct DemoPlatform {
    ad_groups: HashMap<String, Vec<AdGroup>>,
    line_items: HashMap<String, Vec<LineItem>>,
}

impl DemoPlatform {
    fn new() -> Self {
        let mut ad_groups = HashMap::new();
        let mut line_items = HashMap::new();
        for c in 1..=4 {
            let groups: Vec<AdGroup> = (1..=2)
                .map(|g| {
                    let id = format!("g{}{}", c, g);
                    line_items.insert(
                        id.clone(),
                        vec![LineItem::new(
                            Entity::new(format!("l{}{}", c, g), format!("Creative {}.{}", c, g), EntityStatus::Active)
                                .with_metric(keys::SPEND, 25.0 * g as f64)
                                .with_metric(keys::IMPRESSIONS, 8_000.0)
                                .with_metric(keys::CLICKS, 20.0)
                                .with_metric(keys::QUALITY_RANKING, if g == 2 { 4.0 } else { 1.0 }),
                        )],
                    );
                    AdGroup::new(Entity::new(id, format!("Audience {}.{}", c, g), EntityStatus::Active))
                })
                .collect();
            ad_groups.insert(format!("c{}", c), groups);
        }
        Self { ad_groups, line_items }
    }

    async fn latency(&self) {
        tokio::time::sleep(Duration::from_millis(40)).await;
    }
}

#[async_trait]
impl AdsApi for DemoPlatform {
    async fn ad_groups(&self, campaign_id: &str, _range: &DateRange, _mode: FetchMode) -> Result<Vec<AdGroup>, ApiError> {
        self.latency().await;
        Ok(self.ad_groups.get(campaign_id).cloned().unwrap_or_default())
    }

    async fn line_items(&self, ad_group_id: &str, _range: &DateRange, _mode: FetchMode) -> Result<Vec<LineItem>, ApiError> {
        self.latency().await;
        Ok(self.line_items.get(ad_group_id).cloned().unwrap_or_default())
    }

    async fn recent_activity(&self, _account: &AccountKey, _window_days: u32, _limit: usize) -> Result<Vec<ActivityEntry>, ApiError> {
        self.latency().await;
        Ok(vec![ActivityEntry {
            id: "evt-1".into(),
            level: Level::Campaign,
            entity_id: "c2".into(),
            summary: "Daily budget changed from 80.00 to 100.00".into(),
            occurred_at: Utc::now(),
        }])
    }

    async fn issue_report(&self, _account: &AccountKey, _range: &DateRange) -> Result<Vec<Issue>, ApiError> {
        self.latency().await;
        Ok(Vec::new())
    }

    async fn update_status(&self, _level: Level, _id: &str, _status: EntityStatus) -> Result<(), ApiError> {
        self.latency().await;
        Ok(())
    }

    async fn update_budget(&self, _level: Level, _id: &str, _daily_budget: f64) -> Result<(), ApiError> {
        self.latency().await;
        Ok(())
    }

    async fn update_bid(&self, _level: Level, _id: &str, _bid: &BidUpdate) -> Result<(), ApiError> {
        self.latency().await;
        Ok(())
    }
}

fn campaigns() -> Vec<Campaign> {
    vec![
        Campaign::new(
            Entity::new("c1", "Brand search", EntityStatus::Active)
                .with_budget(Budget::daily(120.0))
                .with_metric(keys::SPEND, 600.0)
                .with_metric(keys::CONVERSIONS, 40.0)
                .with_metric(keys::REVENUE, 2_400.0),
        ),
        Campaign::new(
            Entity::new("c2", "Summer promo", EntityStatus::Active)
                .with_budget(Budget::daily(100.0))
                .with_metric(keys::SPEND, 500.0)
                .with_metric(keys::CONVERSIONS, 5.0)
                .with_metric(keys::REVENUE, 250.0),
        ),
        Campaign::new(
            Entity::new("c3", "Broad prospecting", EntityStatus::Active)
                .with_metric(keys::SPEND, 180.0)
                .with_metric(keys::CONVERSIONS, 0.0),
        ),
        Campaign::new(
            Entity::new("c4", "Retargeting", EntityStatus::Active)
                .with_effective_status("WITH_ISSUES")
                .with_metric(keys::SPEND, 90.0)
                .with_metric(keys::CONVERSIONS, 6.0)
                .with_metric(keys::REVENUE, 300.0),
        ),
        Campaign::new(Entity::new("c5", "Winter archive", EntityStatus::Paused)),
    ]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install()?;

    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║           campaign-sync: Basic Usage Example                  ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Configure and select
    // ─────────────────────────────────────────────────────────────────────────
    let cache_path = std::env::temp_dir().join("campaign_sync_demo.db");
    let config = SyncConfig {
        cache_path: Some(cache_path.to_string_lossy().into_owned()),
        // Shorter pauses for the demo
        sibling_pause_min_ms: 60,
        sibling_pause_max_ms: 90,
        ..Default::default()
    };
    let cache = CacheLayer::from_config(&config).await;
    let sync = Arc::new(SyncOrchestrator::new(config, Arc::new(DemoPlatform::new()), cache));

    let week = DateRange::new(
        NaiveDate::from_ymd_opt(2026, 6, 1).ok_or("bad date")?,
        NaiveDate::from_ymd_opt(2026, 6, 7).ok_or("bad date")?,
    );
    println!("📦 Selecting act_demo for {}...", week);
    sync.select(AccountKey::new("act_demo"), week, campaigns()).await;
    println!("   └─ Cached ad groups for c1: {:?}", sync.store().ad_group_ids("c1"));

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Background preload with progress
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🚀 Preloading...");
    let mut progress = sync.state_receiver();
    let watcher = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let state = *progress.borrow();
            println!("   └─ {}", state);
            if state.percent == 100 {
                break;
            }
        }
    });

    let start = std::time::Instant::now();
    let report = sync.run_preload().await.ok_or("nothing selected")?;
    let _ = watcher.await;
    println!(
        "   ✅ {} campaigns, {} nodes loaded, {} failed in {:?}",
        report.campaigns,
        report.fetched,
        report.failed,
        start.elapsed()
    );
    for entry in sync.recent_activity() {
        println!("   └─ Activity: {} ({})", entry.summary, entry.entity_id);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Expand rows
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🔍 Expanding rows...");
    let node = NodeKey::campaign("c1");
    println!("   └─ c1 (preloaded): {:?}", sync.expand(&node, false).await?);
    println!("   └─ c1 (forced):    {:?}", sync.expand(&node, true).await?);
    sync.expand(&NodeKey::ad_group("c1", "g11"), false).await?;
    println!("   └─ Visible rows: {:?}", sync.visible_ids());

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Issues and recommendations
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🩺 Issue review...");
    sync.open_issue_review().await?;
    for issue in sync.issues() {
        println!("   └─ [{:?}] {} {}: {}", issue.severity, issue.level, issue.entity_name, issue.reason);
    }
    sync.close_issue_review();

    println!("\n💡 Recommendations (est. savings {:.2}/month)...", sync.recommendations().estimated_savings());
    for rec in sync.recommendations().pending() {
        println!("   └─ [{:?}/{}] {}", rec.severity, rec.category, rec.title);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Apply one (two clicks for non-critical)
    // ─────────────────────────────────────────────────────────────────────────
    if let Some(rec) = sync.recommendations().pending().into_iter().last() {
        println!("\n✍️  Applying {}...", rec.id);
        match sync.apply_recommendation(&rec.id).await? {
            ApplyOutcome::AwaitingConfirmation { .. } => {
                println!("   └─ Confirm within 3s...");
                if let ApplyOutcome::Applied { summary } = sync.apply_recommendation(&rec.id).await? {
                    println!("   ✅ {}", summary);
                }
            }
            ApplyOutcome::Applied { summary } => println!("   ✅ {}", summary),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 6. Metrics
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📈 Raw Metrics:");
    dump_metrics(&snapshotter);

    let _ = std::fs::remove_file(&cache_path);

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║                    Example complete!                          ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    Ok(())
}

/// Dump all captured metrics grouped by kind.
fn dump_metrics(snapshotter: &Snapshotter) {
    let snapshot = snapshotter.snapshot();

    let mut counters: Vec<_> = vec![];
    let mut gauges: Vec<_> = vec![];
    let mut histograms: Vec<_> = vec![];

    for (composite_key, _, _, value) in snapshot.into_vec() {
        let (_, key) = composite_key.into_parts();
        let name = key.name().to_string();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let label_str = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };

        match value {
            DebugValue::Counter(v) => counters.push((name, label_str, v)),
            DebugValue::Gauge(v) => gauges.push((name, label_str, v.into_inner())),
            DebugValue::Histogram(samples) => {
                let count = samples.len();
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                let avg = if count > 0 { sum / count as f64 } else { 0.0 };
                histograms.push((name, label_str, count, avg));
            }
        }
    }

    counters.sort_by(|a, b| a.0.cmp(&b.0));
    gauges.sort_by(|a, b| a.0.cmp(&b.0));
    histograms.sort_by(|a, b| a.0.cmp(&b.0));

    if !counters.is_empty() {
        println!("   ┌─ Counters");
        for (name, labels, value) in &counters {
            println!("   │  └─ {}{} = {}", name, labels, value);
        }
    }
    if !gauges.is_empty() {
        println!("   ├─ Gauges");
        for (name, labels, value) in &gauges {
            println!("   │  └─ {}{} = {:.2}", name, labels, value);
        }
    }
    if !histograms.is_empty() {
        println!("   └─ Histograms");
        for (name, labels, count, avg) in &histograms {
            println!("   │  └─ {}{} count={} avg={:.4}", name, labels, count, avg);
        }
    }
    if counters.is_empty() && gauges.is_empty() && histograms.is_empty() {
        println!("   └─ (no metrics recorded)");
    }
}
