use std::collections::{BTreeMap, BTreeSet};

use crate::model::{VersionId, WebVersion};

/// Arena of website versions indexed by id, with both edge directions.
///
/// Built from a store read at the start of a decision and never mutated by
/// the resolvers, so every question asked during one decision sees the same
/// graph.
#[derive(Debug, Clone, Default)]
pub struct VersionGraph {
    nodes: BTreeMap<VersionId, WebVersion>,
    next_versions: BTreeMap<VersionId, BTreeSet<VersionId>>,
    incompatible_next_versions: BTreeMap<VersionId, BTreeSet<VersionId>>,
}

impl VersionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_versions(versions: impl IntoIterator<Item = WebVersion>) -> Self {
        let mut graph = Self::new();
        for version in versions {
            graph.insert(version);
        }
        graph
    }

    /// Insert or replace a node, keeping the reverse index in sync.
    pub fn insert(&mut self, version: WebVersion) {
        self.remove(version.version_id);
        let id = version.version_id;
        for previous in &version.previous_versions {
            self.next_versions.entry(*previous).or_default().insert(id);
        }
        for previous in &version.incompatible_previous_versions {
            self.incompatible_next_versions
                .entry(*previous)
                .or_default()
                .insert(id);
        }
        self.nodes.insert(id, version);
    }

    pub fn remove(&mut self, id: VersionId) -> Option<WebVersion> {
        let removed = self.nodes.remove(&id)?;
        for previous in &removed.previous_versions {
            if let Some(next) = self.next_versions.get_mut(previous) {
                next.remove(&id);
            }
        }
        for previous in &removed.incompatible_previous_versions {
            if let Some(next) = self.incompatible_next_versions.get_mut(previous) {
                next.remove(&id);
            }
        }
        Some(removed)
    }

    pub fn get(&self, id: VersionId) -> Option<&WebVersion> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: VersionId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Nodes in `version_id` order.
    pub fn versions(&self) -> impl Iterator<Item = &WebVersion> {
        self.nodes.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = VersionId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn previous_versions(&self, id: VersionId) -> impl Iterator<Item = VersionId> + '_ {
        self.nodes
            .get(&id)
            .into_iter()
            .flat_map(|node| node.previous_versions.iter().copied())
    }

    /// Versions listing `id` as a previous version.
    pub fn next_versions(&self, id: VersionId) -> impl Iterator<Item = VersionId> + '_ {
        self.next_versions
            .get(&id)
            .into_iter()
            .flat_map(|next| next.iter().copied())
    }

    /// Versions listing `id` as an incompatible previous version.
    pub fn incompatible_next_versions(&self, id: VersionId) -> impl Iterator<Item = VersionId> + '_ {
        self.incompatible_next_versions
            .get(&id)
            .into_iter()
            .flat_map(|next| next.iter().copied())
    }
}
