// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{AdGroup, Campaign};

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),
    #[error("Cache codec error: {0}")]
    Codec(String),
    #[error("Cache corruption detected for '{key}': expected hash {expected}, got {actual}")]
    Corruption {
        key: String,
        expected: String,
        actual: String,
    },
}

/// Ad groups remembered for one campaign.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedCampaign {
    #[serde(default)]
    pub ad_groups: Vec<AdGroup>,
}

/// Persisted warm-start snapshot for one account + date range.
///
/// Wire shape: `{ "campaigns": { "<id>": { "adGroups": [...] } } }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    #[serde(default)]
    pub campaigns: BTreeMap<String, CachedCampaign>,
}

impl CacheEntry {
    /// Snapshot of ACTIVE campaigns that have at least one loaded ad group.
    #[must_use]
    pub fn from_campaigns(campaigns: &[Campaign]) -> Self {
        let campaigns = campaigns
            .iter()
            .filter(|c| c.entity.status.is_active() && !c.ad_groups.is_empty())
            .map(|c| (c.entity.id.clone(), CachedCampaign { ad_groups: c.ad_groups.clone() }))
            .collect();
        Self { campaigns }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.campaigns.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.campaigns.len()
    }
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;
    async fn put(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entity, EntityStatus};
    use serde_json::json;

    fn group(id: &str) -> AdGroup {
        AdGroup::new(Entity::new(id, id, EntityStatus::Active))
    }

    #[test]
    fn test_from_campaigns_keeps_active_with_children() {
        let campaigns = vec![
            Campaign::new(Entity::new("c1", "a", EntityStatus::Active)).with_ad_groups(vec![group("g1")]),
            Campaign::new(Entity::new("c2", "b", EntityStatus::Active)),
            Campaign::new(Entity::new("c3", "c", EntityStatus::Paused)).with_ad_groups(vec![group("g3")]),
        ];
        let entry = CacheEntry::from_campaigns(&campaigns);
        assert_eq!(entry.len(), 1);
        assert_eq!(entry.campaigns["c1"].ad_groups[0].entity.id, "g1");
    }

    #[test]
    fn test_wire_shape() {
        let entry = CacheEntry::from_campaigns(&[Campaign::new(Entity::new("c1", "a", EntityStatus::Active))
            .with_ad_groups(vec![group("g1")])]);
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["campaigns"]["c1"]["adGroups"][0]["id"], "g1");

        let parsed: CacheEntry = serde_json::from_value(json!({"campaigns": {"c9": {}}})).unwrap();
        assert!(parsed.campaigns["c9"].ad_groups.is_empty());
    }
}
