// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Ads platform collaborator contract.
//!
//! The core never talks HTTP itself. It consumes an [`AdsApi`] implementation
//! supplied by the embedding application and treats it as a black box: the
//! only things it branches on are the returned entities and the
//! [`ApiError`] classification.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::issues::Issue;
use crate::model::{AccountKey, AdGroup, DateRange, EntityStatus, Level, LineItem};

/// Field-set profile for hierarchy reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// Full field set, insights included
    Fast,
    /// Reduced field set, used as a fallback when `Fast` fails
    Basic,
}

impl FetchMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Basic => "basic",
        }
    }
}

/// Errors reported by the ads platform client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("rate limited by ads platform")]
    RateLimited,
    #[error("request timed out")]
    Timeout,
    #[error("{0}")]
    Other(String),
}

/// A recent change on the account (activity log entry).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub id: String,
    pub level: Level,
    pub entity_id: String,
    pub summary: String,
    pub occurred_at: DateTime<Utc>,
}

/// New bidding configuration for an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidUpdate {
    pub strategy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

/// Read and mutation endpoints of the ads platform.
///
/// Mutations take an id and a new value and either succeed or fail as a
/// whole; there is no partial success.
#[async_trait]
pub trait AdsApi: Send + Sync {
    /// Ad groups of a campaign with insights for `range`.
    async fn ad_groups(
        &self,
        campaign_id: &str,
        range: &DateRange,
        mode: FetchMode,
    ) -> Result<Vec<AdGroup>, ApiError>;

    /// Line items of an ad group with insights for `range`.
    async fn line_items(
        &self,
        ad_group_id: &str,
        range: &DateRange,
        mode: FetchMode,
    ) -> Result<Vec<LineItem>, ApiError>;

    /// Most recent account activity, newest first, capped at `limit`.
    async fn recent_activity(
        &self,
        account: &AccountKey,
        window_days: u32,
        limit: usize,
    ) -> Result<Vec<ActivityEntry>, ApiError>;

    /// Server-side issue report for the account.
    async fn issue_report(
        &self,
        account: &AccountKey,
        range: &DateRange,
    ) -> Result<Vec<Issue>, ApiError>;

    async fn update_status(
        &self,
        level: Level,
        id: &str,
        status: EntityStatus,
    ) -> Result<(), ApiError>;

    async fn update_budget(&self, level: Level, id: &str, daily_budget: f64)
        -> Result<(), ApiError>;

    async fn update_bid(&self, level: Level, id: &str, bid: &BidUpdate) -> Result<(), ApiError>;
}

/// Scripted in-process [`AdsApi`] for unit tests.
#[cfg(test)]
pub(crate) mod mock {
    use std::collections::{HashMap, VecDeque};
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;

    /// Records every call as `"<endpoint>:<id>:<mode>"`.
    #[derive(Default)]
    pub struct MockApi {
        pub ad_groups: Mutex<HashMap<String, Vec<AdGroup>>>,
        pub line_items: Mutex<HashMap<String, Vec<LineItem>>>,
        /// Queued failures per endpoint key, consumed front to back
        pub failures: Mutex<HashMap<String, VecDeque<ApiError>>>,
        pub delay: Mutex<Option<Duration>>,
        pub calls: Mutex<Vec<String>>,
        pub call_times: Mutex<Vec<(String, tokio::time::Instant)>>,
        pub activity: Mutex<Vec<ActivityEntry>>,
        pub issues: Mutex<Vec<Issue>>,
    }

    impl MockApi {
        pub fn with_ad_groups(self, campaign_id: &str, groups: Vec<AdGroup>) -> Self {
            self.ad_groups.lock().insert(campaign_id.to_string(), groups);
            self
        }

        pub fn with_line_items(self, ad_group_id: &str, items: Vec<LineItem>) -> Self {
            self.line_items.lock().insert(ad_group_id.to_string(), items);
            self
        }

        pub fn fail(&self, key: &str, error: ApiError) {
            self.failures.lock().entry(key.to_string()).or_default().push_back(error);
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().len()
        }

        pub fn calls_matching(&self, prefix: &str) -> usize {
            self.calls.lock().iter().filter(|c| c.starts_with(prefix)).count()
        }

        async fn enter(&self, key: String) -> Result<(), ApiError> {
            self.calls.lock().push(key.clone());
            self.call_times.lock().push((key.clone(), tokio::time::Instant::now()));
            let delay = *self.delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let endpoint = key.split(':').take(2).collect::<Vec<_>>().join(":");
            let mut failures = self.failures.lock();
            for candidate in [key.as_str(), endpoint.as_str()] {
                if let Some(queue) = failures.get_mut(candidate) {
                    if let Some(err) = queue.pop_front() {
                        return Err(err);
                    }
                }
            }
            Ok(())
        }
    }

    #[async_trait]
    impl AdsApi for MockApi {
        async fn ad_groups(
            &self,
            campaign_id: &str,
            _range: &DateRange,
            mode: FetchMode,
        ) -> Result<Vec<AdGroup>, ApiError> {
            self.enter(format!("ad_groups:{}:{}", campaign_id, mode.as_str())).await?;
            Ok(self.ad_groups.lock().get(campaign_id).cloned().unwrap_or_default())
        }

        async fn line_items(
            &self,
            ad_group_id: &str,
            _range: &DateRange,
            mode: FetchMode,
        ) -> Result<Vec<LineItem>, ApiError> {
            self.enter(format!("line_items:{}:{}", ad_group_id, mode.as_str())).await?;
            Ok(self.line_items.lock().get(ad_group_id).cloned().unwrap_or_default())
        }

        async fn recent_activity(
            &self,
            account: &AccountKey,
            _window_days: u32,
            limit: usize,
        ) -> Result<Vec<ActivityEntry>, ApiError> {
            self.enter(format!("recent_activity:{}", account)).await?;
            Ok(self.activity.lock().iter().take(limit).cloned().collect())
        }

        async fn issue_report(
            &self,
            account: &AccountKey,
            _range: &DateRange,
        ) -> Result<Vec<Issue>, ApiError> {
            self.enter(format!("issue_report:{}", account)).await?;
            Ok(self.issues.lock().clone())
        }

        async fn update_status(
            &self,
            _level: Level,
            id: &str,
            status: EntityStatus,
        ) -> Result<(), ApiError> {
            self.enter(format!("update_status:{}:{}", id, status)).await
        }

        async fn update_budget(
            &self,
            _level: Level,
            id: &str,
            daily_budget: f64,
        ) -> Result<(), ApiError> {
            self.enter(format!("update_budget:{}:{}", id, daily_budget)).await
        }

        async fn update_bid(&self, _level: Level, id: &str, bid: &BidUpdate) -> Result<(), ApiError> {
            self.enter(format!("update_bid:{}:{}", id, bid.strategy)).await
        }
    }
}
