// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the sync orchestrator.

use std::time::Duration;

/// Progress of one background stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StageState {
    #[default]
    Idle,
    Loading,
    Done,
}

impl std::fmt::Display for StageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Loading => write!(f, "Loading"),
            Self::Done => write!(f, "Done"),
        }
    }
}

/// The three independently tracked background stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Staged hierarchy preload
    Core,
    /// Recent-activity fetch, after `Core`
    Actions,
    /// Server issue report, only while issue review is open
    Errors,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Core => write!(f, "core"),
            Self::Actions => write!(f, "actions"),
            Self::Errors => write!(f, "errors"),
        }
    }
}

/// Snapshot of the background stages plus the blended percentage.
///
/// Use [`super::SyncOrchestrator::state()`] for the current value or
/// [`super::SyncOrchestrator::state_receiver()`] to watch for changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncState {
    pub core: StageState,
    pub actions: StageState,
    pub errors: StageState,
    /// 0 - 100, see [`super::progress::blended_percent`]
    pub percent: u8,
}

impl SyncState {
    /// Copy with one stage changed and the percentage recomputed.
    #[must_use]
    pub fn with(mut self, stage: Stage, state: StageState) -> Self {
        match stage {
            Stage::Core => self.core = state,
            Stage::Actions => self.actions = state,
            Stage::Errors => self.errors = state,
        }
        self.percent = super::progress::blended_percent(self.core, self.actions);
        self
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "core={} actions={} errors={} ({}%)",
            self.core, self.actions, self.errors, self.percent
        )
    }
}

/// Outcome of one core preload pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreloadReport {
    /// ACTIVE campaigns visited
    pub campaigns: usize,
    /// Nodes whose children were loaded
    pub fetched: usize,
    /// Nodes skipped (already loaded, in flight, or superseded)
    pub skipped: usize,
    /// Nodes whose fetch failed; the pass carried on
    pub failed: usize,
    /// The selection changed mid-pass
    pub cancelled: bool,
    pub elapsed: Duration,
}

/// Result of a bulk operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    /// Total items in the batch
    pub total: usize,
    /// Successfully processed items
    pub succeeded: usize,
    /// Failed items
    pub failed: usize,
}

impl BatchResult {
    /// Check if all items succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}
