// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Column sorting for hierarchy levels.
//!
//! Clicking the active column cycles none → ascending → descending → none;
//! clicking a different column starts ascending on it.

use std::cmp::Ordering;

use crate::model::Entity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Status,
    Budget,
    /// Any key of the metrics bag
    Metric(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Current sort column and direction; `None` keeps platform order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortState {
    active: Option<(SortKey, SortDirection)>,
}

impl SortState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn active(&self) -> Option<(&SortKey, SortDirection)> {
        self.active.as_ref().map(|(key, dir)| (key, *dir))
    }

    /// Advance the sort cycle for `key`.
    pub fn toggle(&mut self, key: SortKey) {
        self.active = match self.active.take() {
            Some((current, SortDirection::Ascending)) if current == key => {
                Some((current, SortDirection::Descending))
            }
            Some((current, SortDirection::Descending)) if current == key => None,
            _ => Some((key, SortDirection::Ascending)),
        };
    }

    /// Stable in-place sort of one level's rows.
    pub fn sort<T: AsRef<Entity>>(&self, rows: &mut [T]) {
        let Some((key, direction)) = &self.active else {
            return;
        };
        rows.sort_by(|a, b| {
            let ord = compare_entities(a.as_ref(), b.as_ref(), key);
            match direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            }
        });
    }
}

/// Compare two entities on `key`.
///
/// Strings compare lexicographically, numbers numerically; a missing budget
/// or metric counts as zero.
#[must_use]
pub fn compare_entities(a: &Entity, b: &Entity, key: &SortKey) -> Ordering {
    match key {
        SortKey::Name => a.name.cmp(&b.name),
        SortKey::Status => a.status.as_str().cmp(b.status.as_str()),
        SortKey::Budget => {
            let left = a.budget.effective().unwrap_or(0.0);
            let right = b.budget.effective().unwrap_or(0.0);
            left.total_cmp(&right)
        }
        SortKey::Metric(name) => a.metrics.get(name).total_cmp(&b.metrics.get(name)),
    }
}
