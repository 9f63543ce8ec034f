// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Policy and delivery issue detection.
//!
//! [`extract_issues`] is a pure function over the campaign tree. Entities are
//! walked depth-first in tree order and the detection rules are evaluated in
//! this order for each one:
//!
//! | Condition                                                   | Kind            | Severity |
//! |-------------------------------------------------------------|-----------------|----------|
//! | effective status contains `DISAPPROVED` or `REJECTED`       | policy_rejected | critical |
//! | contains `WITH_ISSUES`, review feedback or issues-info       | with_issues     | critical |
//! | line item: effective status contains `LEARNING_LIMITED`     | learning_limited| warning  |
//! | line item: quality ranking ≥ 3 and spend ≥ 20               | low_quality     | warning  |
//!
//! Status matching is a case-insensitive substring test. The first two rules
//! are exclusive: a rejected entity is not also reported as "with issues".
//!
//! [`merge_issues`] combines the server-side report with local detection.
//! Server issues come first and win on identity-key collisions.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::model::{keys, Campaign, Entity, Level};

/// Quality ranking at or above which a line item is flagged (1 = best).
pub const LOW_QUALITY_RANKING: f64 = 3.0;

/// Minimum spend before a low quality ranking is worth reporting.
pub const LOW_QUALITY_MIN_SPEND: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    PolicyRejected,
    WithIssues,
    LearningLimited,
    LowQuality,
}

impl IssueKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PolicyRejected => "policy_rejected",
            Self::WithIssues => "with_issues",
            Self::LearningLimited => "learning_limited",
            Self::LowQuality => "low_quality",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Critical,
    Warning,
}

/// A policy or delivery problem on one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub kind: IssueKind,
    pub severity: IssueSeverity,
    pub level: Level,
    pub campaign_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_item_id: Option<String>,
    pub entity_name: String,
    pub reason: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub suggestion: String,
    #[serde(default)]
    pub action_label: String,
}

/// Cross-source identity of an issue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IssueKey {
    pub level: Level,
    pub campaign_id: String,
    pub ad_group_id: Option<String>,
    pub line_item_id: Option<String>,
    pub kind: IssueKind,
    pub reason: String,
}

impl Issue {
    #[must_use]
    pub fn key(&self) -> IssueKey {
        IssueKey {
            level: self.level,
            campaign_id: self.campaign_id.clone(),
            ad_group_id: self.ad_group_id.clone(),
            line_item_id: self.line_item_id.clone(),
            kind: self.kind,
            reason: self.reason.clone(),
        }
    }

    /// Id of the entity the issue is attached to.
    #[must_use]
    pub fn entity_id(&self) -> &str {
        match self.level {
            Level::Campaign => &self.campaign_id,
            Level::AdGroup => self.ad_group_id.as_deref().unwrap_or(&self.campaign_id),
            Level::LineItem => self
                .line_item_id
                .as_deref()
                .or(self.ad_group_id.as_deref())
                .unwrap_or(&self.campaign_id),
        }
    }
}

/// Position of an entity in the tree.
struct Location<'a> {
    level: Level,
    campaign_id: &'a str,
    ad_group_id: Option<&'a str>,
    line_item_id: Option<&'a str>,
}

/// Derive issues from the tree, depth-first.
#[must_use]
pub fn extract_issues(campaigns: &[Campaign]) -> Vec<Issue> {
    let mut issues = Vec::new();
    for campaign in campaigns {
        let cid = campaign.entity.id.as_str();
        detect(
            &campaign.entity,
            Location { level: Level::Campaign, campaign_id: cid, ad_group_id: None, line_item_id: None },
            &mut issues,
        );
        for group in &campaign.ad_groups {
            let gid = group.entity.id.as_str();
            detect(
                &group.entity,
                Location { level: Level::AdGroup, campaign_id: cid, ad_group_id: Some(gid), line_item_id: None },
                &mut issues,
            );
            for item in &group.line_items {
                detect(
                    &item.entity,
                    Location {
                        level: Level::LineItem,
                        campaign_id: cid,
                        ad_group_id: Some(gid),
                        line_item_id: Some(item.entity.id.as_str()),
                    },
                    &mut issues,
                );
            }
        }
    }
    issues
}

/// Server issues first, then local; the first occurrence of each key wins.
#[must_use]
pub fn merge_issues(server: Vec<Issue>, local: Vec<Issue>) -> Vec<Issue> {
    let mut seen = HashSet::new();
    server
        .into_iter()
        .chain(local)
        .filter(|issue| seen.insert(issue.key()))
        .collect()
}

fn detect(entity: &Entity, at: Location<'_>, out: &mut Vec<Issue>) {
    let status = entity.effective_status().unwrap_or_default().to_ascii_uppercase();
    let policy = entity.policy.as_ref();
    let feedback = policy
        .and_then(|p| p.review_feedback.as_deref())
        .map(str::trim)
        .filter(|f| !f.is_empty());
    let issues_info = policy.map(|p| p.issues_info.as_slice()).unwrap_or_default();

    if status.contains("DISAPPROVED") || status.contains("REJECTED") {
        out.push(issue(
            entity,
            &at,
            IssueKind::PolicyRejected,
            IssueSeverity::Critical,
            "Policy rejected",
            feedback.map(str::to_string).unwrap_or_else(|| format!("Effective status {}", status)),
        ));
    } else if status.contains("WITH_ISSUES") || feedback.is_some() || !issues_info.is_empty() {
        let details = issues_info
            .iter()
            .map(|info| match &info.message {
                Some(message) if !message.is_empty() => format!("{}: {}", info.summary, message),
                _ => info.summary.clone(),
            })
            .chain(feedback.map(str::to_string))
            .collect::<Vec<_>>()
            .join("; ");
        out.push(issue(
            entity,
            &at,
            IssueKind::WithIssues,
            IssueSeverity::Critical,
            "Delivery issues",
            details,
        ));
    }

    if at.level != Level::LineItem {
        return;
    }

    if status.contains("LEARNING_LIMITED") {
        out.push(issue(
            entity,
            &at,
            IssueKind::LearningLimited,
            IssueSeverity::Warning,
            "Learning limited",
            "Not enough optimization events to exit the learning phase".to_string(),
        ));
    }

    let ranking = entity.metrics.get(keys::QUALITY_RANKING);
    let spend = entity.metrics.spend();
    if ranking >= LOW_QUALITY_RANKING && spend >= LOW_QUALITY_MIN_SPEND {
        out.push(issue(
            entity,
            &at,
            IssueKind::LowQuality,
            IssueSeverity::Warning,
            "Low quality ranking",
            format!("Quality ranking {} after {:.2} spend", ranking, spend),
        ));
    }
}

/// Suggestion text and action label for `kind`, given the entity's status.
fn remedy(entity: &Entity, level: Level, kind: IssueKind) -> (&'static str, String) {
    let active = entity.status.is_active();
    let toggle = if active {
        format!("Pause {}", level.label())
    } else {
        format!("Enable {}", level.label())
    };
    match (kind, active) {
        (IssueKind::PolicyRejected, true) => (
            "Pause it while the creative is edited to comply with advertising policy, then request a new review",
            toggle,
        ),
        (IssueKind::PolicyRejected, false) => (
            "Edit the creative to comply with advertising policy and request a new review before re-enabling",
            toggle,
        ),
        (IssueKind::WithIssues, true) => ("Resolve the reported delivery issues; pause it if spend is being wasted", toggle),
        (IssueKind::WithIssues, false) => ("Resolve the reported delivery issues, then re-enable it", toggle),
        (IssueKind::LearningLimited, true) => {
            ("Raise the budget so delivery can gather enough conversions", "Boost Budget +20%".to_string())
        }
        (IssueKind::LearningLimited, false) => {
            ("Re-enable it with a higher budget so delivery can gather enough conversions", "Boost Budget +20%".to_string())
        }
        (IssueKind::LowQuality, true) => ("Refresh the creative or pause it in favour of stronger siblings", toggle),
        (IssueKind::LowQuality, false) => ("Refresh the creative before re-enabling it", toggle),
    }
}

fn issue(
    entity: &Entity,
    at: &Location<'_>,
    kind: IssueKind,
    severity: IssueSeverity,
    reason: &str,
    details: String,
) -> Issue {
    let (suggestion, action_label) = remedy(entity, at.level, kind);
    Issue {
        kind,
        severity,
        level: at.level,
        campaign_id: at.campaign_id.to_string(),
        ad_group_id: at.ad_group_id.map(str::to_string),
        line_item_id: at.line_item_id.map(str::to_string),
        entity_name: entity.name.clone(),
        reason: reason.to_string(),
        details,
        suggestion: suggestion.to_string(),
        action_label,
    }
}
