// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Blended sync percentage.
//!
//! A coarse heuristic, not a count of completed requests: each stage
//! contributes a fixed weight per state and the sum is capped at 100.
//!
//! | Stage   | Idle | Loading | Done |
//! |---------|------|---------|------|
//! | core    | 0    | 40      | 70   |
//! | actions | 0    | 15      | 30   |
//!
//! The `errors` stage runs on demand and does not count.
//!
//! # Example
//!
//! ```
//! use campaign_sync::sync::{progress::blended_percent, StageState};
//!
//! assert_eq!(blended_percent(StageState::Idle, StageState::Idle), 0);
//! assert_eq!(blended_percent(StageState::Done, StageState::Loading), 85);
//! assert_eq!(blended_percent(StageState::Done, StageState::Done), 100);
//! ```

use super::types::StageState;

const MAX_PERCENT: u8 = 100;

#[must_use]
pub fn core_weight(state: StageState) -> u8 {
    match state {
        StageState::Idle => 0,
        StageState::Loading => 40,
        StageState::Done => 70,
    }
}

#[must_use]
pub fn actions_weight(state: StageState) -> u8 {
    match state {
        StageState::Idle => 0,
        StageState::Loading => 15,
        StageState::Done => 30,
    }
}

#[must_use]
pub fn blended_percent(core: StageState, actions: StageState) -> u8 {
    core_weight(core).saturating_add(actions_weight(actions)).min(MAX_PERCENT)
}
