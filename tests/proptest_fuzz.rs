//! Property-based tests (fuzzing) for the sync core.
//!
//! Uses proptest to generate random inputs and verify the pure building
//! blocks never panic and keep their ordering and dedup guarantees.
//!
//! Run with: `cargo test --test proptest_fuzz`

use std::cmp::Ordering;
use std::collections::HashSet;

use proptest::prelude::*;

use campaign_sync::cache::codec;
use campaign_sync::hierarchy::{compare_entities, SortKey, SortState};
use campaign_sync::issues::{extract_issues, merge_issues};
use campaign_sync::model::{keys, Budget, Campaign, Entity, EntityStatus, Level, MetricBag};
use campaign_sync::sync::progress::blended_percent;
use campaign_sync::{Issue, IssueKind, IssueSeverity, StageState};

// =============================================================================
// Strategies for generating test data
// =============================================================================

fn status_strategy() -> impl Strategy<Value = EntityStatus> {
    prop_oneof![Just(EntityStatus::Active), Just(EntityStatus::Paused)]
}

fn metric_value() -> impl Strategy<Value = f64> {
    prop_oneof![
        Just(0.0),
        0.0..10_000.0f64,
        any::<f64>(),
    ]
}

fn entity_strategy() -> impl Strategy<Value = Entity> {
    (
        "[a-z0-9]{1,6}",
        "[A-Za-z ]{0,12}",
        status_strategy(),
        prop::option::of(0.0..1_000.0f64),
        metric_value(),
        metric_value(),
        prop::option::of(prop_oneof![
            Just("ACTIVE"),
            Just("DISAPPROVED"),
            Just("WITH_ISSUES"),
            Just("LEARNING_LIMITED"),
        ]),
    )
        .prop_map(|(id, name, status, daily, spend, revenue, effective)| {
            let mut entity = Entity::new(id, name, status)
                .with_metric(keys::SPEND, spend)
                .with_metric(keys::REVENUE, revenue);
            if let Some(daily) = daily {
                entity = entity.with_budget(Budget::daily(daily));
            }
            if let Some(effective) = effective {
                entity = entity.with_effective_status(effective);
            }
            entity
        })
}

fn issue_strategy() -> impl Strategy<Value = Issue> {
    (
        prop_oneof![
            Just(IssueKind::PolicyRejected),
            Just(IssueKind::WithIssues),
            Just(IssueKind::LearningLimited),
            Just(IssueKind::LowQuality),
        ],
        prop_oneof![Just(Level::Campaign), Just(Level::AdGroup), Just(Level::LineItem)],
        "c[0-3]",
        prop::option::of("g[0-3]"),
        "[a-z ]{0,10}",
    )
        .prop_map(|(kind, level, campaign_id, ad_group_id, details)| Issue {
            kind,
            severity: IssueSeverity::Warning,
            level,
            campaign_id,
            ad_group_id,
            line_item_id: None,
            entity_name: "fuzz".into(),
            reason: kind.as_str().to_string(),
            details,
            suggestion: String::new(),
            action_label: String::new(),
        })
}

fn sort_key_strategy() -> impl Strategy<Value = SortKey> {
    prop_oneof![
        Just(SortKey::Name),
        Just(SortKey::Status),
        Just(SortKey::Budget),
        Just(SortKey::Metric(keys::SPEND.to_string())),
        Just(SortKey::Metric("missing".to_string())),
    ]
}

fn stage_strategy() -> impl Strategy<Value = StageState> {
    prop_oneof![Just(StageState::Idle), Just(StageState::Loading), Just(StageState::Done)]
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Merged issues have unique identity keys and keep every server issue.
    #[test]
    fn merge_dedupes_and_prefers_server(
        server in prop::collection::vec(issue_strategy(), 0..20),
        local in prop::collection::vec(issue_strategy(), 0..20),
    ) {
        let merged = merge_issues(server.clone(), local.clone());

        let keys: Vec<_> = merged.iter().map(Issue::key).collect();
        let unique: HashSet<_> = keys.iter().cloned().collect();
        prop_assert_eq!(keys.len(), unique.len());

        let server_keys: HashSet<_> = server.iter().map(Issue::key).collect();
        for key in &server_keys {
            let winner = merged.iter().find(|i| &i.key() == key).unwrap();
            let first_server = server.iter().find(|i| &i.key() == key).unwrap();
            prop_assert_eq!(winner, first_server);
        }

        let all_keys: HashSet<_> = server.iter().chain(local.iter()).map(Issue::key).collect();
        prop_assert_eq!(merged.len(), all_keys.len());
    }

    /// Local detection never panics and only flags line items for
    /// line-item-only kinds.
    #[test]
    fn extract_issues_is_total(entities in prop::collection::vec(entity_strategy(), 0..12)) {
        let campaigns: Vec<Campaign> = entities.into_iter().map(Campaign::new).collect();
        let issues = extract_issues(&campaigns);
        for issue in &issues {
            prop_assert_eq!(issue.level, Level::Campaign);
            prop_assert!(matches!(issue.kind, IssueKind::PolicyRejected | IssueKind::WithIssues));
        }
    }

    /// Every ratio is finite for any metric values.
    #[test]
    fn ratios_are_always_finite(
        spend in metric_value(),
        revenue in metric_value(),
        clicks in metric_value(),
        impressions in metric_value(),
        conversions in metric_value(),
    ) {
        let mut bag = MetricBag::new();
        bag.insert(keys::SPEND, spend);
        bag.insert(keys::REVENUE, revenue);
        bag.insert(keys::CLICKS, clicks);
        bag.insert(keys::IMPRESSIONS, impressions);
        bag.insert(keys::CONVERSIONS, conversions);

        for ratio in [bag.roas(), bag.ctr(), bag.cpa(), bag.cpm()] {
            prop_assert!(ratio.is_finite());
        }
    }

    /// The comparator is antisymmetric and sorting respects it.
    #[test]
    fn sort_is_consistent(
        mut rows in prop::collection::vec(entity_strategy(), 0..20),
        key in sort_key_strategy(),
    ) {
        for a in &rows {
            for b in &rows {
                prop_assert_eq!(compare_entities(a, b, &key), compare_entities(b, a, &key).reverse());
            }
        }

        let mut state = SortState::new();
        state.toggle(key.clone());
        state.sort(&mut rows);
        for pair in rows.windows(2) {
            prop_assert_ne!(compare_entities(&pair[0], &pair[1], &key), Ordering::Greater);
        }

        state.toggle(key.clone());
        state.sort(&mut rows);
        for pair in rows.windows(2) {
            prop_assert_ne!(compare_entities(&pair[0], &pair[1], &key), Ordering::Less);
        }
    }

    /// Progress never exceeds 100 and never drops when a stage advances.
    #[test]
    fn progress_is_bounded_and_monotonic(core in stage_strategy(), actions in stage_strategy()) {
        let percent = blended_percent(core, actions);
        prop_assert!(percent <= 100);
        prop_assert!(blended_percent(StageState::Done, actions) >= percent);
        prop_assert!(blended_percent(core, StageState::Done) >= percent);
    }

    /// Arbitrary bytes never panic the cache decoder.
    #[test]
    fn decode_garbage_never_panics(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = codec::decode(&data);
    }

    /// A valid zstd frame with a garbage payload is a clean error.
    #[test]
    fn decode_compressed_garbage_is_error(data in prop::collection::vec(any::<u8>(), 1..256)) {
        let compressed = zstd::encode_all(data.as_slice(), 1).unwrap();
        if serde_json::from_slice::<serde_json::Value>(&data).is_err() {
            prop_assert!(codec::decode(&compressed).is_err());
        }
    }
}
