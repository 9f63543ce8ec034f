// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sync orchestrator.
//!
//! The [`SyncOrchestrator`] ties the components together:
//! - [`HierarchyStore`]: the campaign tree for the current selection
//! - [`FetchScheduler`]: every platform read, cooldown and fallback included
//! - [`CacheLayer`]: warm start from the last session
//! - [`RecommendationEngine`]: rule output and its apply lifecycle
//!
//! # Selection lifecycle
//!
//! ```text
//! select(account, range, campaigns)
//!   cancel previous token ─► reset store ─► install batch ─► warm from cache ─► regenerate
//!
//! run_preload()
//!   core:    Idle → Loading → Done      (staged, spaced fetches)
//!   actions: Idle → Loading → Done      (one recent-activity poll, after core)
//!
//! open_issue_review()
//!   errors:  Idle → Loading → Done      (server issue report, on demand)
//! ```
//!
//! Every background effect holds the [`CancellationToken`] of the selection
//! it started under. Changing account or date range cancels it, and late
//! results are dropped instead of written.
//!
//! # Example
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use campaign_sync::{AdsApi, SyncConfig, SyncOrchestrator};
//! # use campaign_sync::cache::CacheLayer;
//! # use campaign_sync::model::{AccountKey, DateRange};
//! # async fn demo(api: Arc<dyn AdsApi>, range: DateRange) {
//! let orchestrator = SyncOrchestrator::new(SyncConfig::default(), api, CacheLayer::memory());
//! orchestrator.select(AccountKey::new("act_1"), range, Vec::new()).await;
//! orchestrator.run_preload().await;
//! assert_eq!(orchestrator.percentage(), 100);
//! # }
//! ```

mod actions;
mod preload;
pub mod progress;
mod review;
mod types;

pub use types::{BatchResult, PreloadReport, Stage, StageState, SyncState};

use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::api::{ActivityEntry, AdsApi};
use crate::cache::CacheLayer;
use crate::config::SyncConfig;
use crate::hierarchy::{HierarchyStore, Selection};
use crate::issues::Issue;
use crate::model::{AccountKey, Campaign, DateRange, SelectionKey};
use crate::recommendations::{
    ActionExecutor, HourlyBreakdown, RecommendationEngine, RuleGenerator, ThresholdRules,
};
use crate::scheduler::{FetchScheduler, SyncNotice};

/// The selection currently owning the tree.
#[derive(Clone)]
pub(super) struct SelectionContext {
    pub(super) key: SelectionKey,
    pub(super) token: CancellationToken,
}

/// Coordinates loading, caching and derived views for one selection at a time.
///
/// All methods take `&self`; share it behind an `Arc` to run the background
/// preload alongside user actions.
pub struct SyncOrchestrator {
    pub(super) config: SyncConfig,
    pub(super) store: Arc<HierarchyStore>,
    pub(super) scheduler: Arc<FetchScheduler>,
    pub(super) cache: CacheLayer,

    /// Direct mutations from user actions (status toggles)
    pub(super) actions: ActionExecutor,
    pub(super) recommendations: RecommendationEngine,

    /// Stage state (broadcast to watchers)
    pub(super) state: watch::Sender<SyncState>,
    pub(super) state_rx: watch::Receiver<SyncState>,

    pub(super) context: RwLock<Option<SelectionContext>>,

    // Per-selection views, cleared by select()
    pub(super) server_issues: RwLock<Vec<Issue>>,
    pub(super) recent_activity: RwLock<Vec<ActivityEntry>>,
    pub(super) hourly: RwLock<Option<HourlyBreakdown>>,
    pub(super) expanded: RwLock<HashSet<String>>,
    pub(super) selection: Mutex<Selection>,
    pub(super) review_open: AtomicBool,
}

impl SyncOrchestrator {
    /// Create an orchestrator with the bundled threshold rules.
    pub fn new(config: SyncConfig, api: Arc<dyn AdsApi>, cache: CacheLayer) -> Self {
        Self::with_rules(config, api, cache, Box::new(ThresholdRules::default()))
    }

    pub fn with_rules(
        config: SyncConfig,
        api: Arc<dyn AdsApi>,
        cache: CacheLayer,
        rules: Box<dyn RuleGenerator>,
    ) -> Self {
        let store = Arc::new(HierarchyStore::new());
        let scheduler = Arc::new(FetchScheduler::new(api.clone(), store.clone(), &config));
        let recommendations = RecommendationEngine::new(
            rules,
            ActionExecutor::new(api.clone(), store.clone()),
            config.confirm_window(),
        );
        let (state_tx, state_rx) = watch::channel(SyncState::default());

        Self {
            actions: ActionExecutor::new(api, store.clone()),
            config,
            store,
            scheduler,
            cache,
            recommendations,
            state: state_tx,
            state_rx,
            context: RwLock::new(None),
            server_issues: RwLock::new(Vec::new()),
            recent_activity: RwLock::new(Vec::new()),
            hourly: RwLock::new(None),
            expanded: RwLock::new(HashSet::new()),
            selection: Mutex::new(Selection::new()),
            review_open: AtomicBool::new(false),
        }
    }

    /// Switch to a new account / date range.
    ///
    /// Cancels every background effect of the previous selection, discards
    /// the tree with all fetch markers, installs `campaigns` and applies any
    /// cached ad groups. Cached children are shown but not marked fetched, so
    /// expanding them still asks the platform.
    #[instrument(skip(self, campaigns), fields(account = %account, range = %range, campaigns = campaigns.len()))]
    pub async fn select(&self, account: AccountKey, range: DateRange, campaigns: Vec<Campaign>) {
        let key = SelectionKey::new(account, range);
        let token = CancellationToken::new();

        let selection_changed = {
            let mut ctx = self.context.write();
            let changed = match ctx.take() {
                Some(previous) => {
                    previous.token.cancel();
                    previous.key != key
                }
                None => true,
            };
            *ctx = Some(SelectionContext { key: key.clone(), token: token.clone() });
            changed
        };
        if selection_changed {
            self.scheduler.reset();
        }

        self.store.install(campaigns);
        self.server_issues.write().clear();
        self.recent_activity.write().clear();
        self.expanded.write().clear();
        self.selection.lock().clear();
        self.recommendations.reset();
        self.state.send_replace(SyncState::default());
        crate::metrics::set_sync_percent(0);

        if let Some(entry) = self.cache.load(&key).await {
            if token.is_cancelled() {
                return;
            }
            let mut warmed = 0;
            for (campaign_id, cached) in entry.campaigns {
                if self.store.replace_ad_groups(&campaign_id, cached.ad_groups) {
                    warmed += 1;
                }
            }
            debug!(warmed, "Applied cached ad groups");
        }

        self.regenerate();
        info!(selection_changed, "Selection installed");
    }

    /// Key and token of the current selection.
    pub(super) fn context(&self) -> Option<SelectionContext> {
        self.context.read().clone()
    }

    #[must_use]
    pub fn current_selection(&self) -> Option<SelectionKey> {
        self.context.read().as_ref().map(|ctx| ctx.key.clone())
    }

    /// Update one stage unless `token` has been superseded.
    pub(super) fn set_stage(&self, token: &CancellationToken, stage: Stage, state: StageState) {
        if token.is_cancelled() {
            return;
        }
        self.state.send_modify(|current| *current = current.with(stage, state));
        let percent = self.state_rx.borrow().percent;
        crate::metrics::set_sync_percent(percent);
        debug!(stage = %stage, state = %state, percent, "Stage updated");
    }

    /// Re-run the rule generator over the current tree.
    pub(super) fn regenerate(&self) -> usize {
        let snapshot = self.store.snapshot();
        let hourly = self.hourly.read().clone();
        self.recommendations.regenerate(&snapshot, hourly.as_ref())
    }

    /// Provide (or clear) the account's hourly breakdown; regenerates.
    pub fn set_hourly_breakdown(&self, hourly: Option<HourlyBreakdown>) {
        *self.hourly.write() = hourly;
        self.regenerate();
    }

    #[must_use]
    pub fn state(&self) -> SyncState {
        *self.state_rx.borrow()
    }

    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<SyncState> {
        self.state_rx.clone()
    }

    /// Blended 0 - 100 progress.
    #[must_use]
    pub fn percentage(&self) -> u8 {
        self.state().percent
    }

    /// User-facing notices (rate limits, failed mutations).
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncNotice> {
        self.scheduler.subscribe()
    }

    #[must_use]
    pub fn store(&self) -> &Arc<HierarchyStore> {
        &self.store
    }

    #[must_use]
    pub fn scheduler(&self) -> &Arc<FetchScheduler> {
        &self.scheduler
    }

    #[must_use]
    pub fn recommendations(&self) -> &RecommendationEngine {
        &self.recommendations
    }

    #[must_use]
    pub fn recent_activity(&self) -> Vec<ActivityEntry> {
        self.recent_activity.read().clone()
    }
}
