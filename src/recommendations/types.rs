// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{Entity, Level};

/// Severity of a recommendation. Sort order is the declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecSeverity {
    Critical,
    Warning,
    Opportunity,
}

impl RecSeverity {
    /// Fixed sort rank: critical(0) < warning(1) < opportunity(2).
    #[must_use]
    pub fn rank(&self) -> u8 {
        match self {
            Self::Critical => 0,
            Self::Warning => 1,
            Self::Opportunity => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecStatus {
    Pending,
    Applied,
    Dismissed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecCategory {
    /// Spend with nothing to show for it
    Waste,
    Budget,
    Bidding,
    Creative,
    Targeting,
    Delivery,
    Scheduling,
}

impl RecCategory {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waste => "waste",
            Self::Budget => "budget",
            Self::Bidding => "bidding",
            Self::Creative => "creative",
            Self::Targeting => "targeting",
            Self::Delivery => "delivery",
            Self::Scheduling => "scheduling",
        }
    }
}

impl fmt::Display for RecCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The entity an action targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    pub level: Level,
    pub id: String,
    pub name: String,
}

impl EntityRef {
    #[must_use]
    pub fn of(level: Level, entity: &Entity) -> Self {
        Self { level, id: entity.id.clone(), name: entity.name.clone() }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} \"{}\"", self.level.label(), self.name)
    }
}

/// Side effect a recommendation performs when applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecommendationAction {
    PauseEntity { target: EntityRef },
    EnableEntity { target: EntityRef },
    IncreaseBudget { target: EntityRef, percent: f64 },
    DecreaseBudget { target: EntityRef, percent: f64 },
    ScaleBudget { target: EntityRef, factor: f64 },
    /// Move `amount` of daily budget from one entity to another
    ReallocateBudget { from: EntityRef, to: EntityRef, amount: f64 },
    ChangeBidStrategy {
        target: EntityRef,
        strategy: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bid_amount: Option<f64>,
    },
    RefreshCreative { target: EntityRef },
    AdjustTargeting { target: EntityRef, note: String },
    AdjustDayparting { target: EntityRef, active_hours: Vec<u8> },
}

impl RecommendationAction {
    #[must_use]
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::PauseEntity { .. } => "pause_entity",
            Self::EnableEntity { .. } => "enable_entity",
            Self::IncreaseBudget { .. } => "increase_budget",
            Self::DecreaseBudget { .. } => "decrease_budget",
            Self::ScaleBudget { .. } => "scale_budget",
            Self::ReallocateBudget { .. } => "reallocate_budget",
            Self::ChangeBidStrategy { .. } => "change_bid_strategy",
            Self::RefreshCreative { .. } => "refresh_creative",
            Self::AdjustTargeting { .. } => "adjust_targeting",
            Self::AdjustDayparting { .. } => "adjust_dayparting",
        }
    }

    /// Primary entity touched by the action (the source for reallocations).
    #[must_use]
    pub fn target(&self) -> &EntityRef {
        match self {
            Self::PauseEntity { target }
            | Self::EnableEntity { target }
            | Self::IncreaseBudget { target, .. }
            | Self::DecreaseBudget { target, .. }
            | Self::ScaleBudget { target, .. }
            | Self::ChangeBidStrategy { target, .. }
            | Self::RefreshCreative { target }
            | Self::AdjustTargeting { target, .. }
            | Self::AdjustDayparting { target, .. } => target,
            Self::ReallocateBudget { from, .. } => from,
        }
    }
}

/// Estimated effect of applying a recommendation, per month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Impact {
    #[serde(default)]
    pub monthly_savings: f64,
    #[serde(default)]
    pub revenue_lift: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub id: String,
    pub category: RecCategory,
    pub severity: RecSeverity,
    pub status: RecStatus,
    pub action: RecommendationAction,
    pub title: String,
    pub analysis: String,
    #[serde(default)]
    pub impact: Impact,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_summary: Option<String>,
}

/// Spend and conversions for one hour of the day, account-wide.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyStat {
    pub hour: u8,
    pub spend: f64,
    pub conversions: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlyBreakdown {
    pub hours: Vec<HourlyStat>,
}
