// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! User-driven operations: expanding rows, selection and status changes,
//! and applying recommendations.

use tracing::{debug, info, instrument, warn};

use crate::hierarchy::{NodeKey, Selection};
use crate::model::{EntityStatus, Level};
use crate::recommendations::{ActionError, ApplyAllReport, ApplyError, ApplyOutcome, EntityRef};
use crate::scheduler::{FetchError, FetchOutcome, SyncNotice};

use super::{BatchResult, SyncOrchestrator};

impl SyncOrchestrator {
    /// Expand a campaign or ad group row, loading its children if needed.
    ///
    /// `force` re-fetches a node that is already loaded.
    #[instrument(skip(self), fields(node = %node))]
    pub async fn expand(&self, node: &NodeKey, force: bool) -> Result<FetchOutcome, FetchError> {
        let ctx = self
            .context()
            .ok_or_else(|| FetchError::Generic("no account selected".to_string()))?;
        self.expanded.write().insert(node.id().to_string());

        let outcome = self.scheduler.fetch(node, &ctx.key.range, force, &ctx.token).await?;
        if outcome.is_loaded() {
            self.regenerate();
        }
        Ok(outcome)
    }

    pub fn collapse(&self, node: &NodeKey) {
        self.expanded.write().remove(node.id());
    }

    /// Ids of the rows currently shown, depth-first.
    #[must_use]
    pub fn visible_ids(&self) -> Vec<String> {
        let expanded = self.expanded.read();
        self.store.visible_ids(&expanded)
    }

    /// Toggle one row; returns whether it is now selected.
    pub fn toggle_selected(&self, id: &str) -> bool {
        self.selection.lock().toggle(id)
    }

    pub fn select_all_visible(&self) {
        let visible = self.visible_ids();
        self.selection.lock().select_all(visible);
    }

    pub fn clear_selection(&self) {
        self.selection.lock().clear();
    }

    #[must_use]
    pub fn selection(&self) -> Selection {
        self.selection.lock().clone()
    }

    /// Pause or enable one entity.
    ///
    /// The change is visible immediately and reverted if the platform
    /// rejects it, in which case a [`SyncNotice::MutationFailed`] is sent.
    pub async fn set_entity_status(
        &self,
        level: Level,
        id: &str,
        status: EntityStatus,
    ) -> Result<(), ActionError> {
        let entity = self
            .store
            .entity(level, id)
            .ok_or_else(|| ActionError::NotFound { level, id: id.to_string() })?;
        if entity.status == status {
            debug!(id, status = %status, "Status unchanged");
            return Ok(());
        }

        let target = EntityRef::of(level, &entity);
        match self.actions.set_status(&target, status).await {
            Ok(()) => {
                self.regenerate();
                Ok(())
            }
            Err(err) => {
                self.scheduler.notify(SyncNotice::MutationFailed {
                    level,
                    id: id.to_string(),
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Apply `status` to every selected row, one request at a time.
    #[instrument(skip(self))]
    pub async fn bulk_set_status(&self, status: EntityStatus) -> BatchResult {
        let ids = self.selection.lock().ids();
        let mut result = BatchResult { total: ids.len(), succeeded: 0, failed: 0 };

        for id in &ids {
            let Some(level) = self.store.level_of(id) else {
                warn!(id = %id, "Selected row no longer in hierarchy");
                result.failed += 1;
                continue;
            };
            match self.set_entity_status(level, id, status).await {
                Ok(()) => result.succeeded += 1,
                Err(_) => result.failed += 1,
            }
        }

        info!(
            total = result.total,
            succeeded = result.succeeded,
            failed = result.failed,
            "Bulk status change finished"
        );
        result
    }

    pub fn dismiss_recommendation(&self, id: &str) -> Result<(), ApplyError> {
        self.recommendations.dismiss(id)
    }

    /// One click on a recommendation's apply button.
    pub async fn apply_recommendation(&self, id: &str) -> Result<ApplyOutcome, ApplyError> {
        let result = self.recommendations.apply(id).await;
        if let Err(ApplyError::Mutation { source, .. }) = &result {
            self.scheduler.notify(SyncNotice::ApplyFailed {
                recommendation_id: id.to_string(),
                error: source.to_string(),
            });
        }
        result
    }

    /// Apply every pending recommendation, stopping at the first failure.
    #[instrument(skip(self))]
    pub async fn apply_all_recommendations(&self) -> Result<ApplyAllReport, ApplyError> {
        let report = self.recommendations.apply_all().await?;
        if let Some((id, error)) = &report.failed {
            self.scheduler.notify(SyncNotice::ApplyFailed {
                recommendation_id: id.clone(),
                error: error.clone(),
            });
        }
        Ok(report)
    }
}
