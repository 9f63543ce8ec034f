//! Shared fixtures for the integration, chaos and fuzz suites.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;

use campaign_sync::model::{
    keys, AccountKey, AdGroup, Budget, Campaign, DateRange, Entity, EntityStatus, Level, LineItem,
};
use campaign_sync::{ActivityEntry, AdsApi, ApiError, BidUpdate, FetchMode, Issue};

/// In-process ads platform with scripted data and failures.
///
/// Calls are logged as `"<endpoint>:<id>[:<detail>]"`; failures are queued
/// per key (or per `"<endpoint>:<id>"` prefix) and consumed front to back.
#[derive(Default)]
pub struct ScriptedApi {
    ad_groups: Mutex<HashMap<String, Vec<AdGroup>>>,
    line_items: Mutex<HashMap<String, Vec<LineItem>>>,
    failures: Mutex<HashMap<String, VecDeque<ApiError>>>,
    delay: Mutex<Option<Duration>>,
    calls: Mutex<Vec<(String, tokio::time::Instant)>>,
    activity: Mutex<Vec<ActivityEntry>>,
    issues: Mutex<Vec<Issue>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ad_groups(self, campaign_id: &str, groups: Vec<AdGroup>) -> Self {
        self.ad_groups.lock().insert(campaign_id.to_string(), groups);
        self
    }

    pub fn line_items(self, ad_group_id: &str, items: Vec<LineItem>) -> Self {
        self.line_items.lock().insert(ad_group_id.to_string(), items);
        self
    }

    pub fn delay(self, delay: Duration) -> Self {
        *self.delay.lock() = Some(delay);
        self
    }

    pub fn fail(&self, key: &str, error: ApiError) {
        self.failures.lock().entry(key.to_string()).or_default().push_back(error);
    }

    pub fn fail_times(&self, key: &str, error: ApiError, times: usize) {
        for _ in 0..times {
            self.fail(key, error.clone());
        }
    }

    pub fn push_issue(&self, issue: Issue) {
        self.issues.lock().push(issue);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(call, _)| call.clone()).collect()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls.lock().iter().filter(|(call, _)| call.starts_with(prefix)).count()
    }

    /// Start times of hierarchy reads, in call order.
    pub fn fetch_times(&self) -> Vec<tokio::time::Instant> {
        self.calls
            .lock()
            .iter()
            .filter(|(call, _)| call.starts_with("ad_groups") || call.starts_with("line_items"))
            .map(|(_, at)| *at)
            .collect()
    }

    async fn enter(&self, key: String) -> Result<(), ApiError> {
        self.calls.lock().push((key.clone(), tokio::time::Instant::now()));
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let endpoint = key.split(':').take(2).collect::<Vec<_>>().join(":");
        let mut failures = self.failures.lock();
        for candidate in [key.as_str(), endpoint.as_str()] {
            if let Some(err) = failures.get_mut(candidate).and_then(VecDeque::pop_front) {
                return Err(err);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AdsApi for ScriptedApi {
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

    async fn issue_report(&self, account: &AccountKey, _range: &DateRange) -> Result<Vec<Issue>, ApiError> {
        self.enter(format!("issue_report:{}", account)).await?;
        Ok(self.issues.lock().clone())
    }

    async fn update_status(&self, _level: Level, id: &str, status: EntityStatus) -> Result<(), ApiError> {
        self.enter(format!("update_status:{}:{}", id, status)).await
    }

    async fn update_budget(&self, _level: Level, id: &str, daily_budget: f64) -> Result<(), ApiError> {
        self.enter(format!("update_budget:{}:{}", id, daily_budget)).await
    }

    async fn update_bid(&self, _level: Level, id: &str, bid: &BidUpdate) -> Result<(), ApiError> {
        self.enter(format!("update_bid:{}:{}", id, bid.strategy)).await
    }
}

pub fn day(d: u32) -> DateRange {
    let date = NaiveDate::from_ymd_opt(2026, 7, d).unwrap_or_default();
    DateRange::new(date, date)
}

pub fn campaign(id: &str) -> Campaign {
    Campaign::new(Entity::new(id, format!("Campaign {}", id), EntityStatus::Active))
}

pub fn paused_campaign(id: &str) -> Campaign {
    Campaign::new(Entity::new(id, format!("Campaign {}", id), EntityStatus::Paused))
}

pub fn ad_group(id: &str) -> AdGroup {
    AdGroup::new(Entity::new(id, format!("Ad group {}", id), EntityStatus::Active))
}

pub fn line_item(id: &str) -> LineItem {
    LineItem::new(Entity::new(id, format!("Ad {}", id), EntityStatus::Active))
}

/// Spends with no conversions: produces a critical pause recommendation.
pub fn wasteful_campaign(id: &str) -> Campaign {
    Campaign::new(
        Entity::new(id, format!("Campaign {}", id), EntityStatus::Active)
            .with_metric(keys::SPEND, 400.0)
            .with_metric(keys::CONVERSIONS, 0.0),
    )
}

/// Healthy spend, poor return: produces a warning budget cut.
pub fn low_roas_campaign(id: &str) -> Campaign {
    Campaign::new(
        Entity::new(id, format!("Campaign {}", id), EntityStatus::Active)
            .with_budget(Budget::daily(100.0))
            .with_metric(keys::SPEND, 300.0)
            .with_metric(keys::CONVERSIONS, 3.0)
            .with_metric(keys::REVENUE, 150.0),
    )
}
