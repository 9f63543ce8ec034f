// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Threshold-based recommendations and their apply/dismiss lifecycle.

pub mod engine;
pub mod executor;
pub mod rules;
pub mod types;

pub use engine::{ApplyAllReport, ApplyError, ApplyOutcome, Phase, RecommendationEngine};
pub use executor::{ActionError, ActionExecutor};
pub use rules::{RuleGenerator, ThresholdRules};
pub use types::{
    EntityRef, HourlyBreakdown, HourlyStat, Impact, RecCategory, RecSeverity, RecStatus,
    Recommendation, RecommendationAction,
};
