// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Recommendation generators.
//!
//! [`RuleGenerator`] is the seam for plugging in a different rule set (or a
//! remote one). [`ThresholdRules`] is the bundled threshold-based default.
//!
//! Recommendation ids are `"{action type}:{level}:{entity id}"`, so the same
//! finding keeps the same id across regenerations. Dismissals rely on this.

use crate::model::{Campaign, Entity, Level};

use super::types::{
    EntityRef, HourlyBreakdown, Impact, RecCategory, RecSeverity, RecStatus, Recommendation,
    RecommendationAction,
};

/// Days used to turn a reporting-window figure into a monthly estimate.
const DAYS_PER_MONTH: f64 = 30.0;

/// Produces recommendations from the current tree.
pub trait RuleGenerator: Send + Sync {
    fn generate(&self, campaigns: &[Campaign], hourly: Option<&HourlyBreakdown>) -> Vec<Recommendation>;

    /// Total monthly savings of `recommendations`.
    fn estimate_savings(&self, recommendations: &[Recommendation]) -> f64 {
        recommendations.iter().map(|r| r.impact.monthly_savings.max(0.0)).sum()
    }
}

/// Threshold configuration for [`ThresholdRules`].
#[derive(Debug, Clone)]
pub struct ThresholdRules {
    /// Spend with zero conversions at which pausing is recommended
    pub wasted_spend: f64,
    /// Minimum spend before ROAS-based rules fire
    pub roas_min_spend: f64,
    pub low_roas: f64,
    pub high_roas: f64,
    pub budget_cut_percent: f64,
    pub budget_scale_factor: f64,
    pub low_ctr_percent: f64,
    pub ctr_min_impressions: f64,
    pub learning_boost_percent: f64,
    /// CPA above `high_cpa_ratio` × account CPA triggers a bid strategy change
    pub high_cpa_ratio: f64,
    /// CPM above `high_cpm_ratio` × account CPM triggers a targeting review
    pub high_cpm_ratio: f64,
    /// Share of daily budget moved by a reallocation
    pub reallocate_share: f64,
    /// Share of total spend in zero-conversion hours that triggers dayparting
    pub dead_hour_spend_share: f64,
    /// Reporting window length, for monthly extrapolation
    pub window_days: f64,
}

impl Default for ThresholdRules {
    fn default() -> Self {
        Self {
            wasted_spend: 50.0,
            roas_min_spend: 30.0,
            low_roas: 1.0,
            high_roas: 3.0,
            budget_cut_percent: 20.0,
            budget_scale_factor: 1.3,
            low_ctr_percent: 0.5,
            ctr_min_impressions: 1_000.0,
            learning_boost_percent: 20.0,
            high_cpa_ratio: 2.0,
            high_cpm_ratio: 2.5,
            reallocate_share: 0.2,
            dead_hour_spend_share: 0.1,
            window_days: 7.0,
        }
    }
}

struct Draft {
    category: RecCategory,
    severity: RecSeverity,
    action: RecommendationAction,
    title: String,
    analysis: String,
    impact: Impact,
}

impl Draft {
    fn finish(self) -> Recommendation {
        let target = self.action.target();
        Recommendation {
            id: format!("{}:{}:{}", self.action.type_tag(), target.level, target.id),
            category: self.category,
            severity: self.severity,
            status: RecStatus::Pending,
            action: self.action,
            title: self.title,
            analysis: self.analysis,
            impact: self.impact,
            applied_summary: None,
        }
    }
}

/// Account-level averages the relative rules compare against.
#[derive(Default)]
struct Baseline {
    cpa: f64,
    cpm: f64,
}

impl ThresholdRules {
    fn monthly(&self, amount: f64) -> f64 {
        if self.window_days <= 0.0 {
            return 0.0;
        }
        amount / self.window_days * DAYS_PER_MONTH
    }

    fn baseline(campaigns: &[Campaign]) -> Baseline {
        let (mut spend, mut conversions, mut impressions) = (0.0, 0.0, 0.0);
        for campaign in campaigns {
            let m = &campaign.entity.metrics;
            spend += m.spend();
            conversions += m.get(crate::model::keys::CONVERSIONS);
            impressions += m.get(crate::model::keys::IMPRESSIONS);
        }
        Baseline {
            cpa: if conversions > 0.0 { spend / conversions } else { 0.0 },
            cpm: if impressions > 0.0 { spend / impressions * 1000.0 } else { 0.0 },
        }
    }

    fn entity_rules(&self, level: Level, entity: &Entity, baseline: &Baseline, out: &mut Vec<Draft>) {
        if !entity.status.is_active() {
            return;
        }
        let m = &entity.metrics;
        let spend = m.spend();
        let conversions = m.get(crate::model::keys::CONVERSIONS);
        let revenue = m.get(crate::model::keys::REVENUE);
        let target = EntityRef::of(level, entity);

        if spend >= self.wasted_spend && conversions <= 0.0 && revenue <= 0.0 {
            out.push(Draft {
                category: RecCategory::Waste,
                severity: RecSeverity::Critical,
                title: format!("Pause {}", target),
                analysis: format!("Spent {:.2} with no conversions in the selected window.", spend),
                impact: Impact { monthly_savings: self.monthly(spend), revenue_lift: 0.0 },
                action: RecommendationAction::PauseEntity { target },
            });
            return;
        }

        if level == Level::LineItem {
            let impressions = m.get(crate::model::keys::IMPRESSIONS);
            if impressions >= self.ctr_min_impressions && m.ctr() < self.low_ctr_percent {
                out.push(Draft {
                    category: RecCategory::Creative,
                    severity: RecSeverity::Warning,
                    title: format!("Refresh creative on {}", target),
                    analysis: format!(
                        "CTR is {:.2}% over {} impressions, below the {:.2}% floor.",
                        m.ctr(),
                        impressions,
                        self.low_ctr_percent
                    ),
                    impact: Impact::default(),
                    action: RecommendationAction::RefreshCreative { target },
                });
            }
            return;
        }

        let roas = m.roas();
        let daily = entity.budget.daily;
        if spend >= self.roas_min_spend && daily.is_some() {
            if roas < self.low_roas {
                let cut = spend * self.budget_cut_percent / 100.0;
                out.push(Draft {
                    category: RecCategory::Budget,
                    severity: RecSeverity::Warning,
                    title: format!("Reduce budget on {}", target),
                    analysis: format!("ROAS {:.2} is below {:.2}.", roas, self.low_roas),
                    impact: Impact { monthly_savings: self.monthly(cut), revenue_lift: 0.0 },
                    action: RecommendationAction::DecreaseBudget {
                        target: target.clone(),
                        percent: self.budget_cut_percent,
                    },
                });
            } else if roas >= self.high_roas {
                let extra_spend = spend * (self.budget_scale_factor - 1.0);
                out.push(Draft {
                    category: RecCategory::Budget,
                    severity: RecSeverity::Opportunity,
                    title: format!("Scale {}", target),
                    analysis: format!("ROAS {:.2} leaves room to grow spend.", roas),
                    impact: Impact { monthly_savings: 0.0, revenue_lift: self.monthly(extra_spend * roas) },
                    action: RecommendationAction::ScaleBudget {
                        target: target.clone(),
                        factor: self.budget_scale_factor,
                    },
                });
            }
        }

        let cpa = m.cpa();
        if baseline.cpa > 0.0 && cpa > baseline.cpa * self.high_cpa_ratio {
            out.push(Draft {
                category: RecCategory::Bidding,
                severity: RecSeverity::Warning,
                title: format!("Cap cost per result on {}", target),
                analysis: format!("CPA {:.2} against an account average of {:.2}.", cpa, baseline.cpa),
                impact: Impact {
                    monthly_savings: self.monthly((cpa - baseline.cpa) * conversions),
                    revenue_lift: 0.0,
                },
                action: RecommendationAction::ChangeBidStrategy {
                    target: target.clone(),
                    strategy: "COST_CAP".to_string(),
                    bid_amount: Some((baseline.cpa * 100.0).round() / 100.0),
                },
            });
        }

        let cpm = m.cpm();
        if baseline.cpm > 0.0 && cpm > baseline.cpm * self.high_cpm_ratio {
            out.push(Draft {
                category: RecCategory::Targeting,
                severity: RecSeverity::Warning,
                title: format!("Review audience for {}", target),
                analysis: format!("CPM {:.2} against an account average of {:.2}.", cpm, baseline.cpm),
                impact: Impact::default(),
                action: RecommendationAction::AdjustTargeting {
                    target,
                    note: "Broaden the audience or drop expensive placements".to_string(),
                },
            });
        }
    }

    fn reallocation(&self, campaigns: &[Campaign]) -> Option<Draft> {
        let eligible = |c: &&Campaign| {
            c.entity.status.is_active()
                && c.entity.budget.daily.is_some()
                && c.entity.metrics.spend() >= self.roas_min_spend
        };
        let worst = campaigns
            .iter()
            .filter(eligible)
            .filter(|c| c.entity.metrics.roas() < self.low_roas)
            .min_by(|a, b| a.entity.metrics.roas().total_cmp(&b.entity.metrics.roas()))?;
        let best = campaigns
            .iter()
            .filter(eligible)
            .filter(|c| c.entity.metrics.roas() >= self.high_roas)
            .max_by(|a, b| a.entity.metrics.roas().total_cmp(&b.entity.metrics.roas()))?;

        let amount = (worst.entity.budget.daily? * self.reallocate_share * 100.0).round() / 100.0;
        if amount <= 0.0 {
            return None;
        }
        let gain = amount * (best.entity.metrics.roas() - worst.entity.metrics.roas());
        Some(Draft {
            category: RecCategory::Budget,
            severity: RecSeverity::Opportunity,
            title: format!("Move {:.2}/day from {} to {}", amount, worst.entity.name, best.entity.name),
            analysis: format!(
                "ROAS {:.2} vs {:.2}; shifting budget follows the better return.",
                worst.entity.metrics.roas(),
                best.entity.metrics.roas()
            ),
            impact: Impact { monthly_savings: 0.0, revenue_lift: gain * DAYS_PER_MONTH },
            action: RecommendationAction::ReallocateBudget {
                from: EntityRef::of(Level::Campaign, &worst.entity),
                to: EntityRef::of(Level::Campaign, &best.entity),
                amount,
            },
        })
    }

    fn dayparting(&self, campaigns: &[Campaign], hourly: &HourlyBreakdown) -> Option<Draft> {
        let total: f64 = hourly.hours.iter().map(|h| h.spend.max(0.0)).sum();
        if total <= 0.0 {
            return None;
        }
        let dead: f64 = hourly
            .hours
            .iter()
            .filter(|h| h.spend > 0.0 && h.conversions <= 0.0)
            .map(|h| h.spend)
            .sum();
        if dead / total < self.dead_hour_spend_share {
            return None;
        }
        let mut active_hours: Vec<u8> = hourly
            .hours
            .iter()
            .filter(|h| h.conversions > 0.0 || h.spend <= 0.0)
            .map(|h| h.hour)
            .filter(|hour| *hour < 24)
            .collect();
        active_hours.sort_unstable();
        active_hours.dedup();
        if active_hours.is_empty() {
            return None;
        }

        let top = campaigns
            .iter()
            .filter(|c| c.entity.status.is_active())
            .max_by(|a, b| a.entity.metrics.spend().total_cmp(&b.entity.metrics.spend()))?;

        Some(Draft {
            category: RecCategory::Scheduling,
            severity: RecSeverity::Opportunity,
            title: format!("Limit delivery hours on {}", top.entity.name),
            analysis: format!(
                "{:.0}% of spend lands in hours without conversions.",
                dead / total * 100.0
            ),
            impact: Impact { monthly_savings: self.monthly(dead), revenue_lift: 0.0 },
            action: RecommendationAction::AdjustDayparting {
                target: EntityRef::of(Level::Campaign, &top.entity),
                active_hours,
            },
        })
    }
}

impl RuleGenerator for ThresholdRules {
    fn generate(&self, campaigns: &[Campaign], hourly: Option<&HourlyBreakdown>) -> Vec<Recommendation> {
        let baseline = Self::baseline(campaigns);
        let mut drafts = Vec::new();

        for campaign in campaigns {
            self.entity_rules(Level::Campaign, &campaign.entity, &baseline, &mut drafts);
            for group in &campaign.ad_groups {
                self.entity_rules(Level::AdGroup, &group.entity, &baseline, &mut drafts);
                for item in &group.line_items {
                    self.entity_rules(Level::LineItem, &item.entity, &baseline, &mut drafts);

                    let limited = item
                        .entity
                        .effective_status()
                        .is_some_and(|s| s.to_ascii_uppercase().contains("LEARNING_LIMITED"));
                    if limited && item.entity.status.is_active() {
                        drafts.push(Draft {
                            category: RecCategory::Delivery,
                            severity: RecSeverity::Warning,
                            title: format!("Boost budget for {}", group.entity.name),
                            analysis: format!(
                                "Line item \"{}\" is learning limited; more budget helps it exit learning.",
                                item.entity.name
                            ),
                            impact: Impact::default(),
                            action: RecommendationAction::IncreaseBudget {
                                target: EntityRef::of(Level::AdGroup, &group.entity),
                                percent: self.learning_boost_percent,
                            },
                        });
                    }
                }
            }
        }

        drafts.extend(self.reallocation(campaigns));
        if let Some(hourly) = hourly {
            drafts.extend(self.dayparting(campaigns, hourly));
        }

        // Several learning-limited line items under one ad group map to the same id.
        let mut seen = std::collections::HashSet::new();
        drafts
            .into_iter()
            .map(Draft::finish)
            .filter(|rec| seen.insert(rec.id.clone()))
            .collect()
    }
}
