// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Issue review: the on-demand `errors` stage.

use std::sync::atomic::Ordering;

use tracing::{debug, instrument, warn};

use crate::issues::{extract_issues, merge_issues, Issue};
use crate::scheduler::FetchError;

use super::{Stage, StageState, SyncOrchestrator};

impl SyncOrchestrator {
    /// Open the issue review and scan the account once.
    pub async fn open_issue_review(&self) -> Result<usize, FetchError> {
        self.review_open.store(true, Ordering::Release);
        self.scan_errors().await
    }

    pub fn close_issue_review(&self) {
        self.review_open.store(false, Ordering::Release);
        if let Some(ctx) = self.context() {
            self.set_stage(&ctx.token, Stage::Errors, StageState::Idle);
        }
    }

    #[must_use]
    pub fn is_issue_review_open(&self) -> bool {
        self.review_open.load(Ordering::Acquire)
    }

    /// Fetch the server issue report. Does nothing while the review is
    /// closed. Returns the number of merged issues.
    #[instrument(skip(self))]
    pub async fn scan_errors(&self) -> Result<usize, FetchError> {
        if !self.is_issue_review_open() {
            debug!("Issue review closed, not scanning");
            return Ok(0);
        }
        let Some(ctx) = self.context() else {
            return Ok(0);
        };
        self.set_stage(&ctx.token, Stage::Errors, StageState::Loading);

        let api = self.scheduler.api().clone();
        let account = ctx.key.account.clone();
        let range = ctx.key.range;
        let result = self
            .scheduler
            .poll("issue_report", move || async move { api.issue_report(&account, &range).await })
            .await;

        if ctx.token.is_cancelled() {
            return Ok(0);
        }
        if !self.is_issue_review_open() {
            debug!("Issue review closed during scan, discarding report");
            return Ok(0);
        }
        self.set_stage(&ctx.token, Stage::Errors, StageState::Done);
        match result {
            Ok(server) => {
                debug!(server = server.len(), "Server issue report loaded");
                *self.server_issues.write() = server;
                Ok(self.issues().len())
            }
            Err(e) => {
                warn!(error = %e, "Issue report unavailable");
                Err(e)
            }
        }
    }

    /// Server issues merged with issues derived from the loaded tree.
    /// Server entries win on conflict.
    #[must_use]
    pub fn issues(&self) -> Vec<Issue> {
        let server = self.server_issues.read().clone();
        let merged = merge_issues(server, extract_issues(&self.store.snapshot()));
        crate::metrics::set_issue_count(merged.len());
        merged
    }
}
