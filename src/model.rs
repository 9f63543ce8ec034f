// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Entity data model.
//!
//! The hierarchy is three levels deep: [`Campaign`] → [`AdGroup`] → [`LineItem`].
//! Every level shares the same [`Entity`] core (id, name, status, budget,
//! metrics bag, policy info). Child lists are always present, possibly empty,
//! both in memory and on the wire.
//!
//! # Example
//!
//! ```
//! use campaign_sync::model::{Campaign, Entity, EntityStatus};
//!
//! let campaign = Campaign::new(
//!     Entity::new("c-1", "Spring Sale", EntityStatus::Active)
//!         .with_metric("spend", 120.0)
//!         .with_metric("revenue", 480.0),
//! );
//!
//! assert!(campaign.ad_groups.is_empty());
//! assert_eq!(campaign.entity.metrics.roas(), 4.0);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Configured delivery status of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityStatus {
    Active,
    Paused,
}

impl EntityStatus {
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Paused => "PAUSED",
        }
    }
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hierarchy level of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    #[serde(rename = "campaign")]
    Campaign,
    #[serde(rename = "adgroup")]
    AdGroup,
    #[serde(rename = "lineitem")]
    LineItem,
}

impl Level {
    /// Human-readable label used in action labels ("Pause Ad Group").
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Campaign => "Campaign",
            Self::AdGroup => "Ad Group",
            Self::LineItem => "Line Item",
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Campaign => "campaign",
            Self::AdGroup => "adgroup",
            Self::LineItem => "lineitem",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional daily / lifetime budget, in account currency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifetime: Option<f64>,
}

impl Budget {
    #[must_use]
    pub fn daily(amount: f64) -> Self {
        Self { daily: Some(amount), lifetime: None }
    }

    /// Budget used for sorting and reallocation: daily first, then lifetime.
    #[must_use]
    pub fn effective(&self) -> Option<f64> {
        self.daily.or(self.lifetime)
    }
}

/// Well-known metric keys.
pub mod keys {
    pub const SPEND: &str = "spend";
    pub const IMPRESSIONS: &str = "impressions";
    pub const CLICKS: &str = "clicks";
    pub const CONVERSIONS: &str = "conversions";
    pub const REVENUE: &str = "revenue";
    pub const QUALITY_RANKING: &str = "quality_ranking";
}

/// Mapping of metric name → number.
///
/// Ratio helpers never produce NaN or infinity: with zero spend (or a zero
/// denominator) they return `0.0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricBag(BTreeMap<String, f64>);

impl MetricBag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of `key`, or `0.0` when absent or non-finite.
    #[must_use]
    pub fn get(&self, key: &str) -> f64 {
        self.0.get(key).copied().filter(|v| v.is_finite()).unwrap_or(0.0)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        self.0.insert(key.into(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }

    #[must_use]
    pub fn spend(&self) -> f64 {
        self.get(keys::SPEND)
    }

    /// Return on ad spend (revenue / spend).
    #[must_use]
    pub fn roas(&self) -> f64 {
        self.ratio(keys::REVENUE, keys::SPEND, 1.0)
    }

    /// Click-through rate in percent.
    #[must_use]
    pub fn ctr(&self) -> f64 {
        self.ratio(keys::CLICKS, keys::IMPRESSIONS, 100.0)
    }

    /// Cost per acquisition.
    #[must_use]
    pub fn cpa(&self) -> f64 {
        self.ratio(keys::SPEND, keys::CONVERSIONS, 1.0)
    }

    /// Cost per thousand impressions.
    #[must_use]
    pub fn cpm(&self) -> f64 {
        self.ratio(keys::SPEND, keys::IMPRESSIONS, 1000.0)
    }

    fn ratio(&self, numerator: &str, denominator: &str, scale: f64) -> f64 {
        let denom = self.get(denominator);
        if self.spend() <= 0.0 || denom <= 0.0 {
            return 0.0;
        }
        let value = self.get(numerator) / denom * scale;
        if value.is_finite() { value } else { 0.0 }
    }
}

impl FromIterator<(String, f64)> for MetricBag {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One entry of the platform's issues-info list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueInfo {
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Policy / review information reported by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_feedback: Option<String>,
    #[serde(default)]
    pub issues_info: Vec<IssueInfo>,
}

/// Fields shared by every level of the hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub status: EntityStatus,
    #[serde(default)]
    pub budget: Budget,
    #[serde(default)]
    pub metrics: MetricBag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicyInfo>,
}

impl Entity {
    pub fn new(id: impl Into<String>, name: impl Into<String>, status: EntityStatus) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status,
            budget: Budget::default(),
            metrics: MetricBag::new(),
            policy: None,
        }
    }

    #[must_use]
    pub fn with_metric(mut self, key: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(key, value);
        self
    }

    #[must_use]
    pub fn with_budget(mut self, budget: Budget) -> Self {
        self.budget = budget;
        self
    }

    #[must_use]
    pub fn with_effective_status(mut self, status: impl Into<String>) -> Self {
        self.policy.get_or_insert_with(PolicyInfo::default).effective_status = Some(status.into());
        self
    }

    #[must_use]
    pub fn with_review_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.policy.get_or_insert_with(PolicyInfo::default).review_feedback = Some(feedback.into());
        self
    }

    #[must_use]
    pub fn with_issue_info(mut self, info: IssueInfo) -> Self {
        self.policy.get_or_insert_with(PolicyInfo::default).issues_info.push(info);
        self
    }

    /// Effective status string, if the platform reported one.
    #[must_use]
    pub fn effective_status(&self) -> Option<&str> {
        self.policy.as_ref().and_then(|p| p.effective_status.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    #[serde(flatten)]
    pub entity: Entity,
    #[serde(default)]
    pub ad_groups: Vec<AdGroup>,
}

impl Campaign {
    #[must_use]
    pub fn new(entity: Entity) -> Self {
        Self { entity, ad_groups: Vec::new() }
    }

    #[must_use]
    pub fn with_ad_groups(mut self, ad_groups: Vec<AdGroup>) -> Self {
        self.ad_groups = ad_groups;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdGroup {
    #[serde(flatten)]
    pub entity: Entity,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

impl AdGroup {
    #[must_use]
    pub fn new(entity: Entity) -> Self {
        Self { entity, line_items: Vec::new() }
    }

    #[must_use]
    pub fn with_line_items(mut self, line_items: Vec<LineItem>) -> Self {
        self.line_items = line_items;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(flatten)]
    pub entity: Entity,
}

impl LineItem {
    #[must_use]
    pub fn new(entity: Entity) -> Self {
        Self { entity }
    }
}

impl AsRef<Entity> for Entity {
    fn as_ref(&self) -> &Entity {
        self
    }
}

impl AsRef<Entity> for Campaign {
    fn as_ref(&self) -> &Entity {
        &self.entity
    }
}

impl AsRef<Entity> for AdGroup {
    fn as_ref(&self) -> &Entity {
        &self.entity
    }
}

impl AsRef<Entity> for LineItem {
    fn as_ref(&self) -> &Entity {
        &self.entity
    }
}

/// Ads account identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountKey(pub String);

impl AccountKey {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inclusive reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub since: NaiveDate,
    pub until: NaiveDate,
}

impl DateRange {
    /// Build a range, swapping the bounds if they arrive reversed.
    #[must_use]
    pub fn new(since: NaiveDate, until: NaiveDate) -> Self {
        if since <= until {
            Self { since, until }
        } else {
            Self { since: until, until: since }
        }
    }

    #[must_use]
    pub fn days(&self) -> i64 {
        (self.until - self.since).num_days() + 1
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.since, self.until)
    }
}

/// Account + date range: the unit that owns a tree and a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectionKey {
    pub account: AccountKey,
    pub range: DateRange,
}

impl SelectionKey {
    #[must_use]
    pub fn new(account: AccountKey, range: DateRange) -> Self {
        Self { account, range }
    }

    /// Stable string form used as the persisted cache key.
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!("{}:{}:{}", self.account, self.range.since, self.range.until)
    }
}
