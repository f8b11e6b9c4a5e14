use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::logic::url::{append_slash, version_path_segment};
use crate::model::{validators, Deprecatable, Searchable, VersionId};

/// One release of the website, a node of the compatibility graph.
///
/// Edges are stored skin-deep: only the direct predecessors are recorded and
/// any transitive question has to walk the graph explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebVersion {
    pub version_id: VersionId,
    pub version_name: String,
    pub name: String,
    #[serde(default)]
    pub added_feature: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub deprecated_at: Option<DateTime<Utc>>,
    /// Versions that must be published before this one.
    #[serde(default)]
    pub previous_versions: BTreeSet<VersionId>,
    /// Older versions that block this one until they are deprecated.
    #[serde(default)]
    pub incompatible_previous_versions: BTreeSet<VersionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weblog_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panel_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub register_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_prefix: Option<String>,
}

impl WebVersion {
    pub fn new(version_id: VersionId, version_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            version_id,
            version_name: version_name.into(),
            name: name.into(),
            added_feature: String::new(),
            details: String::new(),
            deprecated_at: None,
            previous_versions: BTreeSet::new(),
            incompatible_previous_versions: BTreeSet::new(),
            weblog_url: None,
            panel_url: None,
            login_url: None,
            register_url: None,
            api_prefix: None,
        }
    }

    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = Some(prefix.into());
        self
    }

    pub fn with_previous(mut self, ids: impl IntoIterator<Item = VersionId>) -> Self {
        self.previous_versions.extend(ids);
        self
    }

    pub fn with_incompatible(mut self, ids: impl IntoIterator<Item = VersionId>) -> Self {
        self.incompatible_previous_versions.extend(ids);
        self
    }

    pub fn deprecated_since(mut self, at: DateTime<Utc>) -> Self {
        self.deprecated_at = Some(at);
        self
    }

    /// URL path segment of this version (`v2`, `v3`, `v2.3.4`).
    pub fn version_uri(&self) -> String {
        version_path_segment(&self.version_name)
    }

    /// Prefix every view URL of this version starts with.
    ///
    /// API views need an `api_prefix`; without one there is no API prefix at all.
    pub fn complete_prefix(&self, is_api: bool) -> Option<String> {
        let version_uri = append_slash(&self.version_uri());
        if is_api {
            let api_prefix = self.api_prefix.as_deref()?;
            Some(append_slash(api_prefix) + &version_uri)
        } else {
            Some(version_uri)
        }
    }

    /// Every edge of this node, both relation types.
    pub fn all_edges(&self) -> impl Iterator<Item = VersionId> + '_ {
        self.previous_versions
            .iter()
            .chain(self.incompatible_previous_versions.iter())
            .copied()
    }

    pub fn references(&self, other: VersionId) -> bool {
        self.previous_versions.contains(&other) || self.incompatible_previous_versions.contains(&other)
    }

    /// Field-level checks run before an administrative save.
    pub fn validate(&self) -> Result<(), String> {
        if self.version_id == 0 {
            return Err("version_id must be a positive integer".to_string());
        }
        validators::validate_version_name(&self.version_name)?;
        for url in [&self.weblog_url, &self.panel_url, &self.login_url, &self.register_url]
            .into_iter()
            .flatten()
        {
            validators::validate_path(url)?;
        }
        if let Some(prefix) = &self.api_prefix {
            validators::validate_view_path(prefix)?;
        }
        // Predecessors are always older releases, which also rules out cycles.
        if let Some(bad) = self.all_edges().find(|id| *id >= self.version_id) {
            return Err(format!(
                "Version {} can only depend on older versions, got {}",
                self.version_id, bad
            ));
        }
        Ok(())
    }
}

impl Deprecatable for WebVersion {
    fn deprecated_at(&self) -> Option<DateTime<Utc>> {
        self.deprecated_at
    }
}

impl Searchable for WebVersion {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.version_name.as_str(), self.name.as_str(), self.added_feature.as_str()]
    }
}

impl std::fmt::Display for WebVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "V{}", self.version_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_prefix_for_api_and_pages() {
        let version = WebVersion::new(2, "2.0.0", "Second").with_api_prefix("/api");
        assert_eq!(version.complete_prefix(true).as_deref(), Some("/api/v2/"));
        assert_eq!(version.complete_prefix(false).as_deref(), Some("v2/"));

        let no_api = WebVersion::new(3, "2.3.4", "Patch");
        assert_eq!(no_api.complete_prefix(true), None);
        assert_eq!(no_api.complete_prefix(false).as_deref(), Some("v2.3.4/"));
    }

    #[test]
    fn validate_rejects_forward_and_self_edges() {
        let ok = WebVersion::new(3, "3.0.0", "Three").with_previous([1, 2]);
        assert!(ok.validate().is_ok());

        let self_edge = WebVersion::new(3, "3.0.0", "Three").with_incompatible([3]);
        assert!(self_edge.validate().is_err());

        let forward = WebVersion::new(3, "3.0.0", "Three").with_previous([4]);
        assert!(forward.validate().is_err());
    }

    #[test]
    fn validate_checks_urls() {
        let mut version = WebVersion::new(1, "1.0.0", "One");
        version.login_url = Some("login".to_string());
        assert!(version.validate().is_err());
        version.login_url = Some("/login".to_string());
        assert!(version.validate().is_ok());
    }

    #[test]
    fn display_uses_version_name() {
        assert_eq!(WebVersion::new(1, "1.2.3", "x").to_string(), "V1.2.3");
    }
}
