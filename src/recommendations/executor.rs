// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Applies recommendation actions.
//!
//! Every handler follows the same two-phase shape: write the new value into
//! the [`HierarchyStore`] tentatively, call the platform, and restore the
//! previous value if the call fails.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::api::{AdsApi, ApiError, BidUpdate};
use crate::hierarchy::HierarchyStore;
use crate::model::{EntityStatus, Level};

use super::types::{EntityRef, RecommendationAction};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ActionError {
    #[error("{level} {id} is not in the current hierarchy")]
    NotFound { level: Level, id: String },

    #[error("{0} has no daily budget")]
    NoBudget(String),

    #[error("ads platform rejected the change: {0}")]
    Api(#[from] ApiError),
}

pub struct ActionExecutor {
    api: Arc<dyn AdsApi>,
    store: Arc<HierarchyStore>,
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

impl ActionExecutor {
    pub fn new(api: Arc<dyn AdsApi>, store: Arc<HierarchyStore>) -> Self {
        Self { api, store }
    }

    /// Run `action`; returns a human-readable summary of what changed.
    pub async fn execute(&self, action: &RecommendationAction) -> Result<String, ActionError> {
        debug!(action = action.type_tag(), target = %action.target().id, "Executing action");
        match action {
            RecommendationAction::PauseEntity { target } => {
                self.set_status(target, EntityStatus::Paused).await?;
                Ok(format!("Paused {}", target))
            }
            RecommendationAction::EnableEntity { target } => {
                self.set_status(target, EntityStatus::Active).await?;
                Ok(format!("Enabled {}", target))
            }
            RecommendationAction::IncreaseBudget { target, percent } => {
                let current = self.daily_budget(target)?;
                let next = round_cents(current * (1.0 + percent / 100.0));
                self.set_budget(target, next).await?;
                Ok(format!("Raised daily budget of {} from {:.2} to {:.2}", target, current, next))
            }
            RecommendationAction::DecreaseBudget { target, percent } => {
                let current = self.daily_budget(target)?;
                let next = round_cents((current * (1.0 - percent / 100.0)).max(0.0));
                self.set_budget(target, next).await?;
                Ok(format!("Cut daily budget of {} from {:.2} to {:.2}", target, current, next))
            }
            RecommendationAction::ScaleBudget { target, factor } => {
                let current = self.daily_budget(target)?;
                let next = round_cents((current * factor).max(0.0));
                self.set_budget(target, next).await?;
                Ok(format!("Scaled daily budget of {} from {:.2} to {:.2}", target, current, next))
            }
            RecommendationAction::ReallocateBudget { from, to, amount } => {
                self.reallocate(from, to, *amount).await
            }
            RecommendationAction::ChangeBidStrategy { target, strategy, bid_amount } => {
                let bid = BidUpdate { strategy: strategy.clone(), amount: *bid_amount };
                self.api.update_bid(target.level, &target.id, &bid).await?;
                Ok(match bid_amount {
                    Some(amount) => format!("Switched {} to {} at {:.2}", target, strategy, amount),
                    None => format!("Switched {} to {}", target, strategy),
                })
            }
            RecommendationAction::RefreshCreative { target } => {
                Ok(format!("Creative refresh for {} queued for manual follow-up", target))
            }
            RecommendationAction::AdjustTargeting { target, note } => {
                Ok(format!("Targeting review for {} queued for manual follow-up: {}", target, note))
            }
            RecommendationAction::AdjustDayparting { target, active_hours } => Ok(format!(
                "Schedule for {} queued for manual follow-up ({} active hours)",
                target,
                active_hours.len()
            )),
        }
    }

    fn daily_budget(&self, target: &EntityRef) -> Result<f64, ActionError> {
        let entity = self.store.entity(target.level, &target.id).ok_or_else(|| ActionError::NotFound {
            level: target.level,
            id: target.id.clone(),
        })?;
        entity.budget.daily.ok_or_else(|| ActionError::NoBudget(target.to_string()))
    }

    /// Tentative status write, remote call, rollback on failure.
    pub async fn set_status(&self, target: &EntityRef, status: EntityStatus) -> Result<(), ActionError> {
        let previous = self
            .store
            .set_status(target.level, &target.id, status)
            .ok_or_else(|| ActionError::NotFound { level: target.level, id: target.id.clone() })?;

        if let Err(err) = self.api.update_status(target.level, &target.id, status).await {
            self.store.set_status(target.level, &target.id, previous);
            crate::metrics::record_rollback(target.level.as_str());
            warn!(target = %target.id, status = %status, error = %err, "Status update failed, rolled back");
            return Err(err.into());
        }
        Ok(())
    }

    async fn set_budget(&self, target: &EntityRef, daily: f64) -> Result<(), ActionError> {
        let previous = self
            .store
            .set_daily_budget(target.level, &target.id, Some(daily))
            .ok_or_else(|| ActionError::NotFound { level: target.level, id: target.id.clone() })?;

        if let Err(err) = self.api.update_budget(target.level, &target.id, daily).await {
            self.store.set_daily_budget(target.level, &target.id, previous);
            crate::metrics::record_rollback(target.level.as_str());
            warn!(target = %target.id, daily, error = %err, "Budget update failed, rolled back");
            return Err(err.into());
        }
        Ok(())
    }

    async fn reallocate(&self, from: &EntityRef, to: &EntityRef, amount: f64) -> Result<String, ActionError> {
        let source = self.daily_budget(from)?;
        let destination = self.daily_budget(to)?;
        let moved = round_cents(amount.min(source).max(0.0));

        self.set_budget(from, round_cents(source - moved)).await?;
        if let Err(err) = self.set_budget(to, round_cents(destination + moved)).await {
            // Second leg failed: put the source budget back remotely and locally.
            match self.set_budget(from, source).await {
                Ok(()) => debug!(source = %from.id, "Reallocation compensated"),
                Err(restore) => {
                    warn!(source = %from.id, error = %restore, "Could not restore source budget")
                }
            }
            return Err(err);
        }
        Ok(format!("Moved {:.2}/day from {} to {}", moved, from, to))
    }
}
