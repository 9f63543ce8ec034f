// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Recommendation lifecycle.
//!
//! ```text
//!   Pending ──dismiss──► Dismissed
//!      │
//!      ├─ apply (critical) ───────────────────────► Applying ──ok──► Applied
//!      │                                                │
//!      └─ apply ──► Confirming ──apply within 3s──► ────┘   err ──► Pending
//!                       │
//!                       └─ 3s elapse ──► Pending
//! ```
//!
//! The confirmation window expires lazily: a `Confirming` entry whose
//! deadline has passed reads as `Pending` everywhere.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::model::Campaign;

use super::executor::{ActionError, ActionExecutor};
use super::rules::RuleGenerator;
use super::types::{HourlyBreakdown, RecCategory, RecSeverity, RecStatus, Recommendation};

/// Lifecycle phase of one recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pending,
    Confirming { until: Instant },
    Applying,
    Applied,
    Dismissed,
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirming { .. } => "confirming",
            Self::Applying => "applying",
            Self::Applied => "applied",
            Self::Dismissed => "dismissed",
        }
    }

    fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirming { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// First click on a non-critical recommendation
    AwaitingConfirmation { until: Instant },
    Applied { summary: String },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApplyError {
    #[error("recommendation {0} not found")]
    NotFound(String),

    #[error("recommendation {id} is {phase}")]
    NotPending { id: String, phase: &'static str },

    #[error("apply all is already running")]
    Busy,

    #[error("applying {id} failed: {source}")]
    Mutation { id: String, source: ActionError },
}

/// Result of [`RecommendationEngine::apply_all`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyAllReport {
    pub applied: Vec<String>,
    /// First failure; the loop stops there
    pub failed: Option<(String, String)>,
    /// Pending ids that were never attempted
    pub remaining: Vec<String>,
}

impl ApplyAllReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_none() && self.remaining.is_empty()
    }
}

struct Tracked {
    rec: Recommendation,
    phase: Phase,
}

#[derive(Default)]
struct Book {
    items: Vec<Tracked>,
    dismissed: HashSet<String>,
    /// Applied id → summary
    applied: HashMap<String, String>,
}

impl Book {
    fn get_mut(&mut self, id: &str) -> Option<&mut Tracked> {
        let now = Instant::now();
        let tracked = self.items.iter_mut().find(|t| t.rec.id == id)?;
        expire(tracked, now);
        Some(tracked)
    }
}

fn expire(tracked: &mut Tracked, now: Instant) {
    if let Phase::Confirming { until } = tracked.phase {
        if now >= until {
            tracked.phase = Phase::Pending;
        }
    }
}

/// Clears the apply-all flag however the loop exits.
struct ApplyingAll<'a>(&'a AtomicBool);

impl Drop for ApplyingAll<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct RecommendationEngine {
    generator: Box<dyn RuleGenerator>,
    executor: ActionExecutor,
    confirm_window: Duration,
    book: Mutex<Book>,
    applying_all: AtomicBool,
}

impl RecommendationEngine {
    pub fn new(generator: Box<dyn RuleGenerator>, executor: ActionExecutor, confirm_window: Duration) -> Self {
        Self {
            generator,
            executor,
            confirm_window,
            book: Mutex::new(Book::default()),
            applying_all: AtomicBool::new(false),
        }
    }

    /// Replace the list from the current tree. Dismissed and applied ids keep
    /// their terminal phase, and an apply in flight stays `Applying`.
    pub fn regenerate(&self, campaigns: &[Campaign], hourly: Option<&HourlyBreakdown>) -> usize {
        let recs = self.generator.generate(campaigns, hourly);
        let mut book = self.book.lock();
        let in_flight: HashSet<String> = book
            .items
            .iter()
            .filter(|t| t.phase == Phase::Applying)
            .map(|t| t.rec.id.clone())
            .collect();
        let items: Vec<Tracked> = recs
            .into_iter()
            .map(|mut rec| {
                let phase = if book.dismissed.contains(&rec.id) {
                    rec.status = RecStatus::Dismissed;
                    Phase::Dismissed
                } else if let Some(summary) = book.applied.get(&rec.id) {
                    rec.status = RecStatus::Applied;
                    rec.applied_summary = Some(summary.clone());
                    Phase::Applied
                } else if in_flight.contains(&rec.id) {
                    Phase::Applying
                } else {
                    Phase::Pending
                };
                Tracked { rec, phase }
            })
            .collect();
        let live = items.iter().filter(|t| t.phase.is_open()).count();
        book.items = items;
        live
    }

    /// Forget everything, dismissals and applied ids included (selection
    /// change).
    pub fn reset(&self) {
        *self.book.lock() = Book::default();
    }

    #[must_use]
    pub fn phase(&self, id: &str) -> Option<Phase> {
        self.book.lock().get_mut(id).map(|t| t.phase)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Recommendation> {
        self.book.lock().items.iter().find(|t| t.rec.id == id).map(|t| t.rec.clone())
    }

    #[must_use]
    pub fn is_applying_all(&self) -> bool {
        self.applying_all.load(Ordering::Acquire)
    }

    /// Non-dismissed recommendations, optionally narrowed to one category,
    /// ordered critical → warning → opportunity (stable within a severity).
    #[must_use]
    pub fn list(&self, category: Option<RecCategory>) -> Vec<Recommendation> {
        let book = self.book.lock();
        let mut recs: Vec<Recommendation> = book
            .items
            .iter()
            .filter(|t| t.phase != Phase::Dismissed)
            .filter(|t| category.map_or(true, |c| t.rec.category == c))
            .map(|t| t.rec.clone())
            .collect();
        recs.sort_by_key(|r| r.severity.rank());
        recs
    }

    /// Recommendations still awaiting a decision, in severity order.
    #[must_use]
    pub fn pending(&self) -> Vec<Recommendation> {
        let mut book = self.book.lock();
        let now = Instant::now();
        let mut recs: Vec<Recommendation> = book
            .items
            .iter_mut()
            .filter_map(|t| {
                expire(t, now);
                t.phase.is_open().then(|| t.rec.clone())
            })
            .collect();
        recs.sort_by_key(|r| r.severity.rank());
        recs
    }

    #[must_use]
    pub fn estimated_savings(&self) -> f64 {
        self.generator.estimate_savings(&self.pending())
    }

    pub fn dismiss(&self, id: &str) -> Result<(), ApplyError> {
        let mut book = self.book.lock();
        let tracked = book.get_mut(id).ok_or_else(|| ApplyError::NotFound(id.to_string()))?;
        if !tracked.phase.is_open() {
            return Err(ApplyError::NotPending { id: id.to_string(), phase: tracked.phase.name() });
        }
        tracked.phase = Phase::Dismissed;
        tracked.rec.status = RecStatus::Dismissed;
        book.dismissed.insert(id.to_string());
        Ok(())
    }

    /// One click on "apply".
    ///
    /// Critical recommendations apply immediately. Others need a second click
    /// inside the confirmation window.
    pub async fn apply(&self, id: &str) -> Result<ApplyOutcome, ApplyError> {
        {
            let mut book = self.book.lock();
            let tracked = book.get_mut(id).ok_or_else(|| ApplyError::NotFound(id.to_string()))?;
            match tracked.phase {
                Phase::Pending if tracked.rec.severity != RecSeverity::Critical => {
                    let until = Instant::now() + self.confirm_window;
                    tracked.phase = Phase::Confirming { until };
                    return Ok(ApplyOutcome::AwaitingConfirmation { until });
                }
                Phase::Pending | Phase::Confirming { .. } => tracked.phase = Phase::Applying,
                other => {
                    return Err(ApplyError::NotPending { id: id.to_string(), phase: other.name() });
                }
            }
        }
        self.run(id).await.map(|summary| ApplyOutcome::Applied { summary })
    }

    /// Apply every pending recommendation, one at a time, without asking for
    /// confirmation. Stops at the first failure.
    pub async fn apply_all(&self) -> Result<ApplyAllReport, ApplyError> {
        if self.applying_all.swap(true, Ordering::AcqRel) {
            return Err(ApplyError::Busy);
        }
        let _guard = ApplyingAll(&self.applying_all);

        let ids: Vec<String> = self.pending().into_iter().map(|r| r.id).collect();
        let mut report = ApplyAllReport::default();

        for (index, id) in ids.iter().enumerate() {
            let claimed = {
                let mut book = self.book.lock();
                match book.get_mut(id) {
                    Some(tracked) if tracked.phase.is_open() => {
                        tracked.phase = Phase::Applying;
                        true
                    }
                    _ => false,
                }
            };
            if !claimed {
                continue;
            }
            match self.run(id).await {
                Ok(_) => report.applied.push(id.clone()),
                Err(err) => {
                    report.failed = Some((id.clone(), err.to_string()));
                    report.remaining = ids[index + 1..].to_vec();
                    break;
                }
            }
        }

        info!(
            applied = report.applied.len(),
            failed = report.failed.is_some(),
            remaining = report.remaining.len(),
            "Apply all finished"
        );
        Ok(report)
    }

    /// Execute a recommendation already moved to `Applying`.
    async fn run(&self, id: &str) -> Result<String, ApplyError> {
        let (action, category) = {
            let book = self.book.lock();
            let tracked = book
                .items
                .iter()
                .find(|t| t.rec.id == id)
                .ok_or_else(|| ApplyError::NotFound(id.to_string()))?;
            (tracked.rec.action.clone(), tracked.rec.category)
        };

        let result = self.executor.execute(&action).await;

        let mut book = self.book.lock();
        let tracked = book.items.iter_mut().find(|t| t.rec.id == id);
        match result {
            Ok(summary) => {
                if let Some(tracked) = tracked {
                    tracked.phase = Phase::Applied;
                    tracked.rec.status = RecStatus::Applied;
                    tracked.rec.applied_summary = Some(summary.clone());
                }
                book.applied.insert(id.to_string(), summary.clone());
                crate::metrics::record_recommendation_apply(category.as_str(), "applied");
                info!(recommendation = id, summary = %summary, "Recommendation applied");
                Ok(summary)
            }
            Err(source) => {
                if let Some(tracked) = tracked {
                    tracked.phase = Phase::Pending;
                }
                crate::metrics::record_recommendation_apply(category.as_str(), "failed");
                warn!(recommendation = id, error = %source, "Recommendation apply failed");
                Err(ApplyError::Mutation { id: id.to_string(), source })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::api::mock::MockApi;
    use crate::api::ApiError;
    use crate::hierarchy::HierarchyStore;
    use crate::model::{Budget, Entity, EntityStatus, Level};
    use crate::recommendations::types::{EntityRef, Impact, RecommendationAction};

    /// Emits a fixed list regardless of input.
    struct Fixed(Vec<Recommendation>);

    impl RuleGenerator for Fixed {
        fn generate(&self, _: &[Campaign], _: Option<&HourlyBreakdown>) -> Vec<Recommendation> {
            self.0.clone()
        }
    }

    fn rec(id: &str, severity: RecSeverity, category: RecCategory) -> Recommendation {
        Recommendation {
            id: id.to_string(),
            category,
            severity,
            status: RecStatus::Pending,
            action: RecommendationAction::PauseEntity {
                target: EntityRef { level: Level::Campaign, id: id.to_string(), name: id.to_string() },
            },
            title: id.to_string(),
            analysis: String::new(),
            impact: Impact { monthly_savings: 10.0, revenue_lift: 0.0 },
            applied_summary: None,
        }
    }

    fn engine(recs: Vec<Recommendation>) -> (Arc<MockApi>, RecommendationEngine) {
        let api = Arc::new(MockApi::default());
        let store = Arc::new(HierarchyStore::new());
        store.install(
            recs.iter()
                .map(|r| {
                    Campaign::new(
                        Entity::new(r.id.clone(), r.id.clone(), EntityStatus::Active)
                            .with_budget(Budget::daily(10.0)),
                    )
                })
                .collect(),
        );
        let engine = RecommendationEngine::new(
            Box::new(Fixed(recs)),
            ActionExecutor::new(api.clone(), store),
            Duration::from_millis(3000),
        );
        engine.regenerate(&[], None);
        (api, engine)
    }

    #[tokio::test(start_paused = true)]
    async fn test_critical_applies_on_first_click() {
        let (api, engine) = engine(vec![rec("c1", RecSeverity::Critical, RecCategory::Waste)]);

        let outcome = engine.apply("c1").await.unwrap();

        assert!(matches!(outcome, ApplyOutcome::Applied { .. }));
        assert_eq!(engine.phase("c1"), Some(Phase::Applied));
        assert_eq!(engine.get("c1").unwrap().status, RecStatus::Applied);
        assert!(engine.get("c1").unwrap().applied_summary.is_some());
        assert_eq!(api.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_warning_needs_second_click_within_window() {
        let (api, engine) = engine(vec![rec("w1", RecSeverity::Warning, RecCategory::Budget)]);

        let outcome = engine.apply("w1").await.unwrap();
        assert!(matches!(outcome, ApplyOutcome::AwaitingConfirmation { .. }));
        assert!(matches!(engine.phase("w1"), Some(Phase::Confirming { .. })));
        assert_eq!(api.call_count(), 0);

        tokio::time::advance(Duration::from_millis(2999)).await;
        let outcome = engine.apply("w1").await.unwrap();
        assert!(matches!(outcome, ApplyOutcome::Applied { .. }));
        assert_eq!(api.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_expires_back_to_pending() {
        let (api, engine) = engine(vec![rec("w1", RecSeverity::Warning, RecCategory::Budget)]);
        engine.apply("w1").await.unwrap();

        tokio::time::advance(Duration::from_millis(3000)).await;
        assert_eq!(engine.phase("w1"), Some(Phase::Pending));

        // The next click starts a fresh confirmation instead of applying
        let outcome = engine.apply("w1").await.unwrap();
        assert!(matches!(outcome, ApplyOutcome::AwaitingConfirmation { .. }));
        assert_eq!(api.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_apply_is_rethrown_and_reverts() {
        let (api, engine) = engine(vec![rec("c1", RecSeverity::Critical, RecCategory::Waste)]);
        api.fail("update_status:c1", ApiError::RateLimited);

        let err = engine.apply("c1").await.unwrap_err();

        assert!(matches!(err, ApplyError::Mutation { ref id, .. } if id == "c1"));
        assert_eq!(engine.phase("c1"), Some(Phase::Pending));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismissed_is_terminal_and_survives_regenerate() {
        let (_api, engine) = engine(vec![
            rec("a", RecSeverity::Warning, RecCategory::Budget),
            rec("b", RecSeverity::Opportunity, RecCategory::Budget),
        ]);
        engine.dismiss("a").unwrap();
        assert!(matches!(engine.apply("a").await, Err(ApplyError::NotPending { .. })));

        assert_eq!(engine.regenerate(&[], None), 1);
        assert_eq!(engine.phase("a"), Some(Phase::Dismissed));
        assert_eq!(engine.list(None).len(), 1);

        engine.reset();
        assert_eq!(engine.regenerate(&[], None), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_applied_is_terminal_and_survives_regenerate() {
        let (api, engine) = engine(vec![
            rec("a", RecSeverity::Critical, RecCategory::Waste),
            rec("b", RecSeverity::Warning, RecCategory::Budget),
        ]);
        engine.apply("a").await.unwrap();
        let summary = engine.get("a").unwrap().applied_summary;

        assert_eq!(engine.regenerate(&[], None), 1);
        assert_eq!(engine.phase("a"), Some(Phase::Applied));
        assert_eq!(engine.get("a").unwrap().status, RecStatus::Applied);
        assert_eq!(engine.get("a").unwrap().applied_summary, summary);
        assert!(engine.pending().iter().all(|r| r.id != "a"));

        let report = engine.apply_all().await.unwrap();
        assert!(report.applied.iter().all(|id| id != "a"));
        assert_eq!(api.calls_matching("update_status:a"), 1);

        engine.reset();
        engine.regenerate(&[], None);
        assert_eq!(engine.phase("a"), Some(Phase::Pending));
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_sorted_by_severity_and_filtered() {
        let (_api, engine) = engine(vec![
            rec("o", RecSeverity::Opportunity, RecCategory::Budget),
            rec("w", RecSeverity::Warning, RecCategory::Creative),
            rec("c", RecSeverity::Critical, RecCategory::Waste),
            rec("w2", RecSeverity::Warning, RecCategory::Budget),
        ]);

        let ids: Vec<_> = engine.list(None).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["c", "w", "w2", "o"]);

        let ids: Vec<_> = engine.list(Some(RecCategory::Budget)).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["w2", "o"]);
        assert_eq!(engine.estimated_savings(), 40.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_all_is_sequential_and_stops_on_failure() {
        let (api, engine) = engine(vec![
            rec("a", RecSeverity::Critical, RecCategory::Waste),
            rec("b", RecSeverity::Warning, RecCategory::Waste),
            rec("c", RecSeverity::Opportunity, RecCategory::Waste),
        ]);
        api.fail("update_status:b", ApiError::Other("nope".into()));

        let report = engine.apply_all().await.unwrap();

        assert_eq!(report.applied, vec!["a"]);
        assert_eq!(report.failed.as_ref().map(|(id, _)| id.as_str()), Some("b"));
        assert_eq!(report.remaining, vec!["c"]);
        assert!(!report.is_complete());
        assert!(!engine.is_applying_all());
        assert_eq!(*api.calls.lock(), vec!["update_status:a:PAUSED", "update_status:b:PAUSED"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_all_skips_confirmation() {
        let (_api, engine) = engine(vec![
            rec("w1", RecSeverity::Warning, RecCategory::Budget),
            rec("w2", RecSeverity::Warning, RecCategory::Budget),
        ]);
        let report = engine.apply_all().await.unwrap();
        assert!(report.is_complete());
        assert_eq!(engine.pending().len(), 0);
    }
}
