// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-memory campaign hierarchy.
//!
//! [`HierarchyStore`] owns the campaign → ad-group → line-item tree for the
//! currently selected account and date range, together with the per-node
//! fetch bookkeeping ([`FetchStatus`]).
//!
//! # Branch replacement
//!
//! Every mutation replaces one branch keyed by node id (a campaign's ad-group
//! list, an ad group's line-item list, a single entity's status). Siblings
//! are never rebuilt, so a manual expansion and the background preload can
//! write different branches without clobbering each other.
//!
//! # Generations
//!
//! Each reset bumps a generation counter. A [`FetchTicket`] remembers the
//! generation it was issued under; completing a ticket from an older
//! generation is a no-op. This is what keeps a late response for the previous
//! account or date range out of the new tree.

mod selection;
mod sort;

pub use selection::Selection;
pub use sort::{compare_entities, SortDirection, SortKey, SortState};

use std::collections::{HashMap, HashSet};
use std::fmt;

use parking_lot::RwLock;
use tracing::debug;

use crate::model::{AdGroup, Campaign, Entity, EntityStatus, Level, LineItem};

/// Address of an expandable node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKey {
    /// A campaign; its children are ad groups
    Campaign { campaign_id: String },
    /// An ad group; its children are line items
    AdGroup { campaign_id: String, ad_group_id: String },
}

impl NodeKey {
    pub fn campaign(campaign_id: impl Into<String>) -> Self {
        Self::Campaign { campaign_id: campaign_id.into() }
    }

    pub fn ad_group(campaign_id: impl Into<String>, ad_group_id: impl Into<String>) -> Self {
        Self::AdGroup { campaign_id: campaign_id.into(), ad_group_id: ad_group_id.into() }
    }

    /// Id of the node itself.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Campaign { campaign_id } => campaign_id,
            Self::AdGroup { ad_group_id, .. } => ad_group_id,
        }
    }

    #[must_use]
    pub fn campaign_id(&self) -> &str {
        match self {
            Self::Campaign { campaign_id } | Self::AdGroup { campaign_id, .. } => campaign_id,
        }
    }

    #[must_use]
    pub fn level(&self) -> Level {
        match self {
            Self::Campaign { .. } => Level::Campaign,
            Self::AdGroup { .. } => Level::AdGroup,
        }
    }

    /// Level of the entities a fetch for this node returns.
    #[must_use]
    pub fn child_level(&self) -> Level {
        match self {
            Self::Campaign { .. } => Level::AdGroup,
            Self::AdGroup { .. } => Level::LineItem,
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Campaign { campaign_id } => write!(f, "campaign:{}", campaign_id),
            Self::AdGroup { campaign_id, ad_group_id } => {
                write!(f, "adgroup:{}/{}", campaign_id, ad_group_id)
            }
        }
    }
}

/// Fetch progress of a node's children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchStatus {
    #[default]
    Unfetched,
    Loading,
    Fetched,
    Errored,
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unfetched => write!(f, "unfetched"),
            Self::Loading => write!(f, "loading"),
            Self::Fetched => write!(f, "fetched"),
            Self::Errored => write!(f, "errored"),
        }
    }
}

/// Fetch status plus the last error recorded on the node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeState {
    pub status: FetchStatus,
    pub error: Option<String>,
}

/// Why a fetch was not issued (or its result not written).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Children already loaded and no force flag
    AlreadyFetched,
    /// Another fetch for the same node is running
    InFlight,
    /// The node is not part of the current tree
    UnknownNode,
    /// The selection changed while the request was in flight
    Superseded,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyFetched => write!(f, "already_fetched"),
            Self::InFlight => write!(f, "in_flight"),
            Self::UnknownNode => write!(f, "unknown_node"),
            Self::Superseded => write!(f, "superseded"),
        }
    }
}

/// Permission to fetch one node, stamped with the store generation.
#[derive(Debug)]
pub struct FetchTicket {
    node: NodeKey,
    generation: u64,
}

impl FetchTicket {
    #[must_use]
    pub fn node(&self) -> &NodeKey {
        &self.node
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Children returned by a node fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum Children {
    AdGroups(Vec<AdGroup>),
    LineItems(Vec<LineItem>),
}

impl Children {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::AdGroups(groups) => groups.len(),
            Self::LineItems(items) => items.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
struct Tree {
    campaigns: Vec<Campaign>,
    nodes: HashMap<NodeKey, NodeState>,
    generation: u64,
}

impl Tree {
    fn contains(&self, node: &NodeKey) -> bool {
        let Some(campaign) = self.campaigns.iter().find(|c| c.entity.id == node.campaign_id())
        else {
            return false;
        };
        match node {
            NodeKey::Campaign { .. } => true,
            NodeKey::AdGroup { ad_group_id, .. } => {
                campaign.ad_groups.iter().any(|g| &g.entity.id == ad_group_id)
            }
        }
    }

    fn entity_mut(&mut self, level: Level, id: &str) -> Option<&mut Entity> {
        for campaign in &mut self.campaigns {
            match level {
                Level::Campaign if campaign.entity.id == id => return Some(&mut campaign.entity),
                Level::Campaign => continue,
                Level::AdGroup | Level::LineItem => {}
            }
            for group in &mut campaign.ad_groups {
                if level == Level::AdGroup {
                    if group.entity.id == id {
                        return Some(&mut group.entity);
                    }
                    continue;
                }
                if let Some(item) = group.line_items.iter_mut().find(|i| i.entity.id == id) {
                    return Some(&mut item.entity);
                }
            }
        }
        None
    }

    fn replace_ad_groups(&mut self, campaign_id: &str, mut groups: Vec<AdGroup>) -> bool {
        let Some(campaign) = self.campaigns.iter_mut().find(|c| c.entity.id == campaign_id) else {
            return false;
        };

        // Keep already-loaded line items for ad groups that survive the refresh.
        let mut previous: HashMap<String, Vec<LineItem>> = campaign
            .ad_groups
            .drain(..)
            .map(|g| (g.entity.id, g.line_items))
            .collect();
        for group in &mut groups {
            if group.line_items.is_empty() {
                if let Some(items) = previous.remove(&group.entity.id) {
                    group.line_items = items;
                }
            }
        }
        let surviving: HashSet<String> = groups.iter().map(|g| g.entity.id.clone()).collect();
        campaign.ad_groups = groups;

        self.nodes.retain(|key, _| match key {
            NodeKey::AdGroup { campaign_id: cid, ad_group_id } if cid == campaign_id => {
                surviving.contains(ad_group_id)
            }
            _ => true,
        });
        true
    }

    fn replace_line_items(&mut self, campaign_id: &str, ad_group_id: &str, items: Vec<LineItem>) -> bool {
        let group = self
            .campaigns
            .iter_mut()
            .find(|c| c.entity.id == campaign_id)
            .and_then(|c| c.ad_groups.iter_mut().find(|g| g.entity.id == ad_group_id));
        match group {
            Some(group) => {
                group.line_items = items;
                true
            }
            None => false,
        }
    }
}

/// Shared, lock-protected campaign tree.
#[derive(Default)]
pub struct HierarchyStore {
    tree: RwLock<Tree>,
}

impl HierarchyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole tree with a fresh batch; all fetch markers are dropped.
    pub fn install(&self, campaigns: Vec<Campaign>) -> u64 {
        let mut tree = self.tree.write();
        tree.generation += 1;
        tree.nodes.clear();
        tree.campaigns = campaigns;
        debug!(generation = tree.generation, campaigns = tree.campaigns.len(), "Hierarchy installed");
        tree.generation
    }

    /// Discard the tree and every fetch marker.
    pub fn reset(&self) -> u64 {
        self.install(Vec::new())
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.tree.read().generation
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.read().campaigns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.read().campaigns.is_empty()
    }

    /// Clone of the current tree, for read-only consumers.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Campaign> {
        self.tree.read().campaigns.clone()
    }

    #[must_use]
    pub fn campaign(&self, campaign_id: &str) -> Option<Campaign> {
        self.tree.read().campaigns.iter().find(|c| c.entity.id == campaign_id).cloned()
    }

    #[must_use]
    pub fn ad_group_ids(&self, campaign_id: &str) -> Vec<String> {
        self.tree
            .read()
            .campaigns
            .iter()
            .find(|c| c.entity.id == campaign_id)
            .map(|c| c.ad_groups.iter().map(|g| g.entity.id.clone()).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn node_state(&self, node: &NodeKey) -> NodeState {
        self.tree.read().nodes.get(node).cloned().unwrap_or_default()
    }

    /// Nodes whose last fetch failed, with the recorded error.
    #[must_use]
    pub fn errored_nodes(&self) -> Vec<(NodeKey, String)> {
        self.tree
            .read()
            .nodes
            .iter()
            .filter(|(_, state)| state.status == FetchStatus::Errored)
            .map(|(key, state)| (key.clone(), state.error.clone().unwrap_or_default()))
            .collect()
    }

    /// Non-mutating check for whether a fetch would be skipped.
    #[must_use]
    pub fn would_skip(&self, node: &NodeKey, force: bool) -> Option<SkipReason> {
        let tree = self.tree.read();
        if !tree.contains(node) {
            return Some(SkipReason::UnknownNode);
        }
        match tree.nodes.get(node).map(|s| s.status) {
            Some(FetchStatus::Loading) => Some(SkipReason::InFlight),
            Some(FetchStatus::Fetched) if !force => Some(SkipReason::AlreadyFetched),
            _ => None,
        }
    }

    /// Atomically move a node to `Loading`.
    ///
    /// `force` only bypasses the `Fetched` marker; an in-flight node is never
    /// requested twice.
    pub fn begin_fetch(&self, node: &NodeKey, force: bool) -> Result<FetchTicket, SkipReason> {
        let mut tree = self.tree.write();
        if !tree.contains(node) {
            return Err(SkipReason::UnknownNode);
        }
        let generation = tree.generation;
        let state = tree.nodes.entry(node.clone()).or_default();
        match state.status {
            FetchStatus::Loading => return Err(SkipReason::InFlight),
            FetchStatus::Fetched if !force => return Err(SkipReason::AlreadyFetched),
            _ => {}
        }
        state.status = FetchStatus::Loading;
        Ok(FetchTicket { node: node.clone(), generation })
    }

    /// Merge fetched children into the tree and mark the node `Fetched`.
    ///
    /// Returns `false` (and writes nothing) when the ticket is stale.
    pub fn complete_fetch(&self, ticket: FetchTicket, children: Children) -> bool {
        let mut tree = self.tree.write();
        if tree.generation != ticket.generation {
            debug!(node = %ticket.node, "Discarding stale fetch result");
            return false;
        }
        let merged = match (&ticket.node, children) {
            (NodeKey::Campaign { campaign_id }, Children::AdGroups(groups)) => {
                tree.replace_ad_groups(campaign_id, groups)
            }
            (NodeKey::AdGroup { campaign_id, ad_group_id }, Children::LineItems(items)) => {
                tree.replace_line_items(campaign_id, ad_group_id, items)
            }
            (node, _) => {
                debug!(node = %node, "Children do not match node level");
                false
            }
        };
        let state = tree.nodes.entry(ticket.node).or_default();
        if merged {
            state.status = FetchStatus::Fetched;
            state.error = None;
        } else {
            state.status = FetchStatus::Unfetched;
        }
        merged
    }

    /// Record a failed fetch on the node.
    pub fn fail_fetch(&self, ticket: FetchTicket, error: impl Into<String>) -> bool {
        let mut tree = self.tree.write();
        if tree.generation != ticket.generation {
            return false;
        }
        let state = tree.nodes.entry(ticket.node).or_default();
        state.status = FetchStatus::Errored;
        state.error = Some(error.into());
        true
    }

    /// Release a ticket without a result (superseded request).
    pub fn abandon(&self, ticket: FetchTicket) {
        let mut tree = self.tree.write();
        if tree.generation != ticket.generation {
            return;
        }
        if let Some(state) = tree.nodes.get_mut(&ticket.node) {
            if state.status == FetchStatus::Loading {
                state.status = FetchStatus::Unfetched;
            }
        }
    }

    /// Replace a campaign's ad-group list, leaving every other branch alone.
    pub fn replace_ad_groups(&self, campaign_id: &str, groups: Vec<AdGroup>) -> bool {
        self.tree.write().replace_ad_groups(campaign_id, groups)
    }

    /// Replace an ad group's line-item list, leaving every other branch alone.
    pub fn replace_line_items(&self, campaign_id: &str, ad_group_id: &str, items: Vec<LineItem>) -> bool {
        self.tree.write().replace_line_items(campaign_id, ad_group_id, items)
    }

    #[must_use]
    pub fn entity(&self, level: Level, id: &str) -> Option<Entity> {
        let tree = self.tree.read();
        for campaign in &tree.campaigns {
            if level == Level::Campaign {
                if campaign.entity.id == id {
                    return Some(campaign.entity.clone());
                }
                continue;
            }
            for group in &campaign.ad_groups {
                if level == Level::AdGroup && group.entity.id == id {
                    return Some(group.entity.clone());
                }
                if level == Level::LineItem {
                    if let Some(item) = group.line_items.iter().find(|i| i.entity.id == id) {
                        return Some(item.entity.clone());
                    }
                }
            }
        }
        None
    }

    /// Level of the first entity with this id (campaigns first).
    #[must_use]
    pub fn level_of(&self, id: &str) -> Option<Level> {
        let tree = self.tree.read();
        for campaign in &tree.campaigns {
            if campaign.entity.id == id {
                return Some(Level::Campaign);
            }
        }
        for campaign in &tree.campaigns {
            for group in &campaign.ad_groups {
                if group.entity.id == id {
                    return Some(Level::AdGroup);
                }
                if group.line_items.iter().any(|i| i.entity.id == id) {
                    return Some(Level::LineItem);
                }
            }
        }
        None
    }

    /// Tentatively set an entity's status; returns the previous status so the
    /// caller can roll back.
    pub fn set_status(&self, level: Level, id: &str, status: EntityStatus) -> Option<EntityStatus> {
        let mut tree = self.tree.write();
        let entity = tree.entity_mut(level, id)?;
        Some(std::mem::replace(&mut entity.status, status))
    }

    /// Tentatively set an entity's daily budget; returns the previous value.
    pub fn set_daily_budget(&self, level: Level, id: &str, daily: Option<f64>) -> Option<Option<f64>> {
        let mut tree = self.tree.write();
        let entity = tree.entity_mut(level, id)?;
        Some(std::mem::replace(&mut entity.budget.daily, daily))
    }

    /// Ids of every entity in the tree, depth-first.
    #[must_use]
    pub fn all_ids(&self) -> Vec<String> {
        let tree = self.tree.read();
        let mut ids = Vec::new();
        for campaign in &tree.campaigns {
            ids.push(campaign.entity.id.clone());
            for group in &campaign.ad_groups {
                ids.push(group.entity.id.clone());
                ids.extend(group.line_items.iter().map(|i| i.entity.id.clone()));
            }
        }
        ids
    }

    /// Ids of every visible entity, depth-first: all campaigns, plus the
    /// children of each expanded campaign / ad group.
    #[must_use]
    pub fn visible_ids(&self, expanded: &HashSet<String>) -> Vec<String> {
        let tree = self.tree.read();
        let mut ids = Vec::new();
        for campaign in &tree.campaigns {
            ids.push(campaign.entity.id.clone());
            if !expanded.contains(&campaign.entity.id) {
                continue;
            }
            for group in &campaign.ad_groups {
                ids.push(group.entity.id.clone());
                if expanded.contains(&group.entity.id) {
                    ids.extend(group.line_items.iter().map(|i| i.entity.id.clone()));
                }
            }
        }
        ids
    }
}
