// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Background preload: the `core` and `actions` stages.

use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::hierarchy::{NodeKey, SkipReason};
use crate::model::SelectionKey;
use crate::scheduler::{FetchError, FetchOutcome};

use super::{PreloadReport, Stage, StageState, SyncOrchestrator};

impl SyncOrchestrator {
    /// Preload the current selection, then fetch recent activity.
    ///
    /// Returns `None` when nothing is selected. A report with `cancelled` set
    /// means the selection changed mid-pass; nothing after that point was
    /// written.
    #[instrument(skip(self))]
    pub async fn run_preload(&self) -> Option<PreloadReport> {
        let ctx = self.context()?;
        let report = self.run_core(&ctx.key, &ctx.token).await;
        if report.cancelled {
            info!(fetched = report.fetched, "Preload superseded");
            return Some(report);
        }

        self.cache.save(&ctx.key, &self.store.snapshot()).await;
        let live = self.regenerate();
        debug!(recommendations = live, "Recommendations refreshed after preload");

        self.run_actions(&ctx.key, &ctx.token).await;
        Some(report)
    }

    /// Staged, spaced preload of the first active campaigns and their first
    /// ad groups. A failing node is recorded and the pass moves on.
    pub(super) async fn run_core(&self, key: &SelectionKey, token: &CancellationToken) -> PreloadReport {
        self.set_stage(token, Stage::Core, StageState::Loading);
        let start = Instant::now();

        let targets: Vec<String> = self
            .store
            .snapshot()
            .iter()
            .filter(|c| c.entity.status.is_active())
            .take(self.config.preload_campaign_limit)
            .map(|c| c.entity.id.clone())
            .collect();

        let mut report = PreloadReport { campaigns: targets.len(), ..Default::default() };
        let mut first = true;

        'campaigns: for campaign_id in targets {
            let node = NodeKey::campaign(&campaign_id);
            if !self.preload_node(&node, key, token, &mut first, &mut report).await {
                break;
            }

            let groups = self.store.ad_group_ids(&campaign_id);
            for ad_group_id in groups.into_iter().take(self.config.preload_adgroup_limit) {
                let node = NodeKey::ad_group(&campaign_id, ad_group_id);
                if !self.preload_node(&node, key, token, &mut first, &mut report).await {
                    break 'campaigns;
                }
            }
        }

        report.elapsed = start.elapsed();
        crate::metrics::record_preload(report.elapsed, report.fetched, report.failed);
        if !report.cancelled {
            self.set_stage(token, Stage::Core, StageState::Done);
        }
        info!(
            campaigns = report.campaigns,
            fetched = report.fetched,
            skipped = report.skipped,
            failed = report.failed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Core preload finished"
        );
        report
    }

    /// Pause (except before the first request), then fetch one node.
    /// Returns `false` once the selection has been superseded.
    async fn preload_node(
        &self,
        node: &NodeKey,
        key: &SelectionKey,
        token: &CancellationToken,
        first: &mut bool,
        report: &mut PreloadReport,
    ) -> bool {
        if token.is_cancelled() {
            report.cancelled = true;
            return false;
        }
        if let Some(reason) = self.store.would_skip(node, false) {
            debug!(node = %node, reason = %reason, "Preload skipped node");
            report.skipped += 1;
            return true;
        }

        if !std::mem::replace(first, false) && !self.sibling_pause(token).await {
            report.cancelled = true;
            return false;
        }

        match self.scheduler.fetch(node, &key.range, false, token).await {
            Ok(FetchOutcome::Loaded { .. }) => report.fetched += 1,
            Ok(FetchOutcome::Skipped(SkipReason::Superseded)) => {
                report.cancelled = true;
                return false;
            }
            Ok(FetchOutcome::Skipped(_)) => report.skipped += 1,
            Err(FetchError::CoolingDown { remaining }) => {
                debug!(node = %node, remaining_ms = remaining.as_millis() as u64, "Preload node held by cooldown");
                report.failed += 1;
            }
            Err(e) => {
                warn!(node = %node, error = %e, "Preload fetch failed, continuing");
                report.failed += 1;
            }
        }
        !token.is_cancelled()
    }

    /// Random delay between sibling requests. `false` if cancelled meanwhile.
    async fn sibling_pause(&self, token: &CancellationToken) -> bool {
        let millis = rand::thread_rng().gen_range(self.config.sibling_pause_range());
        tokio::select! {
            _ = token.cancelled() => false,
            _ = tokio::time::sleep(Duration::from_millis(millis)) => true,
        }
    }

    /// One recent-activity poll. The stage ends `Done` whether or not it
    /// succeeded.
    pub(super) async fn run_actions(&self, key: &SelectionKey, token: &CancellationToken) {
        self.set_stage(token, Stage::Actions, StageState::Loading);

        let api = self.scheduler.api().clone();
        let account = key.account.clone();
        let window_days = self.config.activity_window_days;
        let limit = self.config.activity_limit;
        let result = self
            .scheduler
            .poll("recent_activity", move || async move {
                api.recent_activity(&account, window_days, limit).await
            })
            .await;

        if token.is_cancelled() {
            return;
        }
        match result {
            Ok(entries) => {
                debug!(entries = entries.len(), "Recent activity loaded");
                *self.recent_activity.write() = entries;
            }
            Err(e) => warn!(error = %e, "Recent activity unavailable"),
        }
        self.set_stage(token, Stage::Actions, StageState::Done);
    }
}
