// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Fetch scheduler: every read of the ads platform goes through here.
//!
//! # Hierarchy fetches
//!
//! ```text
//! fetch(node, force)
//!   │
//!   ├─ Fetched / Loading (and !force) ──► Skipped
//!   ├─ cooldown active (and !force) ────► Err(CoolingDown)   no network call
//!   │
//!   ├─ fast mode (12s) ─ ok ────────────► merge, Loaded { mode: Fast }
//!   │     ├─ rate limited ──────────────► trip cooldown, Err(RateLimited)
//!   │     └─ timeout / other ─┐
//!   │                         ▼
//!   └─ basic mode (10s) ─ ok ───────────► merge, Loaded { mode: Basic }
//!                        └─ error ──────► node Errored, Err(..)
//! ```
//!
//! A rate-limit answer on the fast path is not retried in basic mode: the
//! platform has told us to back off.
//!
//! # Polls
//!
//! Lightweight reads (recent activity, issue report) go through [`FetchScheduler::poll`]:
//! one attempt under the poll timeout, subject to the same cooldown gate.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{AdsApi, ApiError, FetchMode};
use crate::config::SyncConfig;
use crate::hierarchy::{Children, HierarchyStore, NodeKey, SkipReason};
use crate::model::{DateRange, Level};
use crate::resilience::{CooldownGate, GateState};

const NOTICE_CAPACITY: usize = 64;

/// User-facing notices raised by the sync core.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncNotice {
    /// The platform rate-limited us; requests are paused for `cooldown`
    RateLimited { cooldown: Duration },
    /// A remote mutation failed and the local change was rolled back
    MutationFailed { level: Level, id: String, error: String },
    /// A recommendation could not be applied
    ApplyFailed { recommendation_id: String, error: String },
}

/// Errors surfaced by [`FetchScheduler`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("cooling down after rate limit, {remaining:?} remaining")]
    CoolingDown { remaining: Duration },

    #[error("rate limited by ads platform")]
    RateLimited,

    #[error("request timed out")]
    Timeout,

    #[error("{0}")]
    Generic(String),
}

impl From<ApiError> for FetchError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::RateLimited => Self::RateLimited,
            ApiError::Timeout => Self::Timeout,
            ApiError::Other(msg) => Self::Generic(msg),
        }
    }
}

/// Result of a fetch that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Children merged into the store
    Loaded { count: usize, mode: FetchMode },
    /// No request was made, or its result was discarded
    Skipped(SkipReason),
}

impl FetchOutcome {
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded { .. })
    }
}

pub struct FetchScheduler {
    api: Arc<dyn AdsApi>,
    store: Arc<HierarchyStore>,
    gate: CooldownGate,
    fast_timeout: Duration,
    basic_timeout: Duration,
    poll_timeout: Duration,
    cooldown: Duration,
    notices: broadcast::Sender<SyncNotice>,
}

impl FetchScheduler {
    pub fn new(api: Arc<dyn AdsApi>, store: Arc<HierarchyStore>, config: &SyncConfig) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            api,
            store,
            gate: CooldownGate::new(
                "ads_api",
                config.rate_limit_cooldown(),
                config.rate_limit_notice_interval(),
            ),
            fast_timeout: config.fast_timeout(),
            basic_timeout: config.basic_timeout(),
            poll_timeout: config.poll_timeout(),
            cooldown: config.rate_limit_cooldown(),
            notices,
        }
    }

    #[must_use]
    pub fn api(&self) -> &Arc<dyn AdsApi> {
        &self.api
    }

    #[must_use]
    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    #[must_use]
    pub fn gate(&self) -> &CooldownGate {
        &self.gate
    }

    /// Clear the cooldown (account or date range switch).
    pub fn reset(&self) {
        self.gate.reset();
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncNotice> {
        self.notices.subscribe()
    }

    /// Publish a notice to every subscriber; dropped if nobody listens.
    pub fn notify(&self, notice: SyncNotice) {
        let _ = self.notices.send(notice);
    }

    /// Fetch the children of `node` and merge them into the store.
    ///
    /// `token` belongs to the selection the request was issued for. If it is
    /// cancelled before the response lands, the response is dropped.
    pub async fn fetch(
        &self,
        node: &NodeKey,
        range: &DateRange,
        force: bool,
        token: &CancellationToken,
    ) -> Result<FetchOutcome, FetchError> {
        if !force {
            if let Some(reason) = self.store.would_skip(node, false) {
                debug!(node = %node, reason = %reason, "Fetch skipped");
                crate::metrics::record_fetch(node.child_level().as_str(), "none", "skipped");
                return Ok(FetchOutcome::Skipped(reason));
            }
            if let Err(remaining) = self.gate.check() {
                return Err(FetchError::CoolingDown { remaining });
            }
        }

        let ticket = match self.store.begin_fetch(node, force) {
            Ok(ticket) => ticket,
            Err(reason) => return Ok(FetchOutcome::Skipped(reason)),
        };

        let result = tokio::select! {
            _ = token.cancelled() => {
                self.store.abandon(ticket);
                crate::metrics::record_stale_discard(node.child_level().as_str());
                return Ok(FetchOutcome::Skipped(SkipReason::Superseded));
            }
            result = self.fetch_with_fallback(node, range) => result,
        };

        match result {
            Ok((children, mode)) => {
                if token.is_cancelled() {
                    self.store.abandon(ticket);
                    crate::metrics::record_stale_discard(node.child_level().as_str());
                    return Ok(FetchOutcome::Skipped(SkipReason::Superseded));
                }
                let count = children.len();
                if !self.store.complete_fetch(ticket, children) {
                    crate::metrics::record_stale_discard(node.child_level().as_str());
                    return Ok(FetchOutcome::Skipped(SkipReason::Superseded));
                }
                debug!(node = %node, count, mode = mode.as_str(), "Children loaded");
                Ok(FetchOutcome::Loaded { count, mode })
            }
            Err(err) => {
                if err == ApiError::RateLimited {
                    self.trip();
                }
                let err = FetchError::from(err);
                self.store.fail_fetch(ticket, err.to_string());
                Err(err)
            }
        }
    }

    async fn fetch_with_fallback(
        &self,
        node: &NodeKey,
        range: &DateRange,
    ) -> Result<(Children, FetchMode), ApiError> {
        match self.request(node, range, FetchMode::Fast).await {
            Ok(children) => Ok((children, FetchMode::Fast)),
            Err(ApiError::RateLimited) => Err(ApiError::RateLimited),
            Err(err) => {
                warn!(node = %node, error = %err, "Fast fetch failed, retrying with basic fields");
                let children = self.request(node, range, FetchMode::Basic).await?;
                Ok((children, FetchMode::Basic))
            }
        }
    }

    async fn request(
        &self,
        node: &NodeKey,
        range: &DateRange,
        mode: FetchMode,
    ) -> Result<Children, ApiError> {
        let limit = match mode {
            FetchMode::Fast => self.fast_timeout,
            FetchMode::Basic => self.basic_timeout,
        };
        let level = node.child_level().as_str();
        let start = Instant::now();

        let call = async {
            match node {
                NodeKey::Campaign { campaign_id } => self
                    .api
                    .ad_groups(campaign_id, range, mode)
                    .await
                    .map(Children::AdGroups),
                NodeKey::AdGroup { ad_group_id, .. } => self
                    .api
                    .line_items(ad_group_id, range, mode)
                    .await
                    .map(Children::LineItems),
            }
        };
        let result = match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout),
        };

        crate::metrics::record_fetch_latency(level, mode.as_str(), start.elapsed());
        let outcome = match &result {
            Ok(_) => "success",
            Err(ApiError::RateLimited) => "rate_limited",
            Err(ApiError::Timeout) => "timeout",
            Err(ApiError::Other(_)) => "error",
        };
        crate::metrics::record_fetch(level, mode.as_str(), outcome);
        result
    }

    /// Single-attempt lightweight read under the poll timeout.
    pub async fn poll<T, F, Fut>(&self, operation: &str, call: F) -> Result<T, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        if let Err(remaining) = self.gate.check() {
            crate::metrics::record_poll(operation, "cooling_down");
            return Err(FetchError::CoolingDown { remaining });
        }

        let result = match tokio::time::timeout(self.poll_timeout, call()).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(ApiError::RateLimited)) => {
                self.trip();
                Err(FetchError::RateLimited)
            }
            Ok(Err(err)) => Err(FetchError::from(err)),
            Err(_) => Err(FetchError::Timeout),
        };

        let outcome = match &result {
            Ok(_) => "success",
            Err(FetchError::RateLimited) => "rate_limited",
            Err(FetchError::Timeout) => "timeout",
            Err(_) => "error",
        };
        crate::metrics::record_poll(operation, outcome);
        result
    }

    fn trip(&self) {
        let trip = self.gate.trip();
        if trip.notify {
            info!(cooldown_secs = self.cooldown.as_secs(), "Notifying rate limit");
            self.notify(SyncNotice::RateLimited { cooldown: self.cooldown });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockApi;
    use crate::hierarchy::FetchStatus;
    use crate::model::{AdGroup, Campaign, Entity, EntityStatus, LineItem};
    use chrono::NaiveDate;

    fn range() -> DateRange {
        let day = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        DateRange::new(day, day)
    }

    fn entity(id: &str) -> Entity {
        Entity::new(id, id, EntityStatus::Active)
    }

    fn setup(api: MockApi) -> (Arc<MockApi>, Arc<HierarchyStore>, FetchScheduler) {
        let api = Arc::new(api);
        let store = Arc::new(HierarchyStore::new());
        store.install(vec![
            Campaign::new(entity("c1")),
            Campaign::new(entity("c2")).with_ad_groups(vec![AdGroup::new(entity("g1"))]),
        ]);
        let scheduler = FetchScheduler::new(api.clone(), store.clone(), &SyncConfig::default());
        (api, store, scheduler)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_loads_and_skips_second_time() {
        let (api, store, scheduler) =
            setup(MockApi::default().with_ad_groups("c1", vec![AdGroup::new(entity("g7"))]));
        let token = CancellationToken::new();
        let node = NodeKey::campaign("c1");

        let outcome = scheduler.fetch(&node, &range(), false, &token).await.unwrap();
        assert_eq!(outcome, FetchOutcome::Loaded { count: 1, mode: FetchMode::Fast });
        assert_eq!(store.ad_group_ids("c1"), vec!["g7"]);

        let outcome = scheduler.fetch(&node, &range(), false, &token).await.unwrap();
        assert_eq!(outcome, FetchOutcome::Skipped(SkipReason::AlreadyFetched));
        assert_eq!(api.call_count(), 1);

        let outcome = scheduler.fetch(&node, &range(), true, &token).await.unwrap();
        assert!(outcome.is_loaded());
        assert_eq!(api.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_error_falls_back_to_basic() {
        let (api, _store, scheduler) = setup(
            MockApi::default().with_line_items("g1", vec![LineItem::new(entity("l1"))]),
        );
        api.fail("line_items:g1:fast", ApiError::Other("field not available".into()));

        let outcome = scheduler
            .fetch(&NodeKey::ad_group("c2", "g1"), &range(), false, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, FetchOutcome::Loaded { count: 1, mode: FetchMode::Basic });
        assert_eq!(*api.calls.lock(), vec!["line_items:g1:fast", "line_items:g1:basic"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_both_modes_time_out() {
        let (api, store, scheduler) = setup(MockApi::default());
        *api.delay.lock() = Some(Duration::from_secs(30));
        let node = NodeKey::campaign("c1");
        let start = Instant::now();

        let err = scheduler.fetch(&node, &range(), false, &CancellationToken::new()).await.unwrap_err();

        assert_eq!(err, FetchError::Timeout);
        assert_eq!(start.elapsed(), Duration::from_secs(22));
        assert_eq!(store.node_state(&node).status, FetchStatus::Errored);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_trips_cooldown_without_fallback() {
        let (api, _store, scheduler) = setup(MockApi::default());
        let mut notices = scheduler.subscribe();
        api.fail("ad_groups:c1", ApiError::RateLimited);
        let token = CancellationToken::new();

        let err = scheduler.fetch(&NodeKey::campaign("c1"), &range(), false, &token).await.unwrap_err();
        assert_eq!(err, FetchError::RateLimited);
        assert_eq!(api.call_count(), 1, "no basic fallback after rate limit");
        assert_eq!(
            notices.try_recv().unwrap(),
            SyncNotice::RateLimited { cooldown: Duration::from_secs(60) }
        );

        // Any non-forced fetch now fails locally
        let err = scheduler.fetch(&NodeKey::campaign("c2"), &range(), false, &token).await.unwrap_err();
        assert!(matches!(err, FetchError::CoolingDown { .. }));
        assert_eq!(api.call_count(), 1);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(scheduler.fetch(&NodeKey::campaign("c2"), &range(), false, &token).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_fetch_ignores_cooldown() {
        let (api, _store, scheduler) = setup(MockApi::default());
        api.fail("ad_groups:c1", ApiError::RateLimited);
        let token = CancellationToken::new();
        let _ = scheduler.fetch(&NodeKey::campaign("c1"), &range(), false, &token).await;

        let outcome = scheduler.fetch(&NodeKey::campaign("c1"), &range(), true, &token).await;
        assert!(outcome.unwrap().is_loaded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_response_is_discarded() {
        let (api, store, scheduler) =
            setup(MockApi::default().with_ad_groups("c1", vec![AdGroup::new(entity("late"))]));
        *api.delay.lock() = Some(Duration::from_secs(2));
        let token = CancellationToken::new();
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancel.cancel();
        });

        let outcome = scheduler.fetch(&NodeKey::campaign("c1"), &range(), false, &token).await.unwrap();

        assert_eq!(outcome, FetchOutcome::Skipped(SkipReason::Superseded));
        assert!(store.ad_group_ids("c1").is_empty());
        assert_eq!(store.node_state(&NodeKey::campaign("c1")).status, FetchStatus::Unfetched);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_single_attempt_with_timeout() {
        let (api, _store, scheduler) = setup(MockApi::default());
        *api.delay.lock() = Some(Duration::from_secs(9));
        let account = crate::model::AccountKey::new("act_1");
        let api_ref = api.clone();

        let err = scheduler
            .poll("recent_activity", || async move { api_ref.recent_activity(&account, 3, 25).await })
            .await
            .unwrap_err();

        assert_eq!(err, FetchError::Timeout);
        assert_eq!(api.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_respects_cooldown() {
        let (api, _store, scheduler) = setup(MockApi::default());
        scheduler.gate().trip();
        let account = crate::model::AccountKey::new("act_1");
        let api_ref = api.clone();

        let err = scheduler
            .poll("issue_report", || async move { api_ref.issue_report(&account, &range()).await })
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::CoolingDown { .. }));
        assert_eq!(api.call_count(), 0);

        scheduler.reset();
        assert_eq!(scheduler.gate_state(), GateState::Open);
    }
}
