use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{validators, Deprecatable, Searchable, VersionId, ViewCode, WebVersion};

/// A concrete view (web page or API endpoint) introduced by one website version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointRecord {
    pub view_code_name: ViewCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_name: Option<String>,
    /// `None` only while the record is a pending placeholder.
    #[serde(default)]
    pub web_version: Option<VersionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absolute_view_url: Option<String>,
    #[serde(default)]
    pub is_api: bool,
    /// "This view has been replaced by that one."
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_compatible_view: Option<ViewCode>,
    #[serde(default)]
    pub deprecated_at: Option<DateTime<Utc>>,
}

impl EndpointRecord {
    pub fn new(view_code_name: impl Into<ViewCode>, web_version: VersionId, is_api: bool) -> Self {
        Self {
            view_code_name: view_code_name.into(),
            view_name: None,
            web_version: Some(web_version),
            view_url: None,
            absolute_view_url: None,
            is_api,
            new_compatible_view: None,
            deprecated_at: None,
        }
    }

    /// Placeholder stored the first time an unknown view is hit.
    pub fn pending(view_code_name: impl Into<ViewCode>, view_name: Option<String>, is_api: bool) -> Self {
        Self {
            view_code_name: view_code_name.into(),
            view_name,
            web_version: None,
            view_url: None,
            absolute_view_url: None,
            is_api,
            new_compatible_view: None,
            deprecated_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.web_version.is_none()
    }

    pub fn with_view_url(mut self, path: impl Into<String>) -> Self {
        self.view_url = Some(path.into());
        self
    }

    pub fn with_absolute_url(mut self, url: impl Into<String>) -> Self {
        self.absolute_view_url = Some(url.into());
        self
    }

    pub fn superseded_by(mut self, code: impl Into<ViewCode>) -> Self {
        self.new_compatible_view = Some(code.into());
        self
    }

    pub fn deprecated_since(mut self, at: DateTime<Utc>) -> Self {
        self.deprecated_at = Some(at);
        self
    }

    /// Fill in the relative path from an absolute URL under the version's prefix.
    pub fn normalize(&mut self, version: &WebVersion) {
        if self.view_url.is_some() {
            return;
        }
        let (Some(absolute), Some(prefix)) = (&self.absolute_view_url, version.complete_prefix(self.is_api)) else {
            return;
        };
        if let Some(rest) = absolute.strip_prefix(prefix.as_str()) {
            self.view_url = Some(format!("/{}", rest.trim_start_matches('/')));
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validators::validate_view_code(&self.view_code_name)?;
        if let Some(path) = &self.view_url {
            validators::validate_view_path(path)?;
        }
        if let Some(url) = &self.absolute_view_url {
            validators::validate_absolute_url(url)?;
        }
        if self.new_compatible_view.as_deref() == Some(self.view_code_name.as_str()) {
            return Err(format!("View '{}' cannot supersede itself", self.view_code_name));
        }
        Ok(())
    }
}

impl Deprecatable for EndpointRecord {
    fn deprecated_at(&self) -> Option<DateTime<Utc>> {
        self.deprecated_at
    }
}

impl Searchable for EndpointRecord {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.view_code_name.as_str()];
        fields.extend(self.view_name.as_deref());
        fields
    }
}

impl std::fmt::Display for EndpointRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.view_name {
            Some(name) => write!(f, "{} ({})", name, self.view_code_name),
            None => write!(f, "{}", self.view_code_name),
        }
    }
}

/// Endpoint records keyed by view code, the in-memory side of a decision.
#[derive(Debug, Clone, Default)]
pub struct EndpointCatalog {
    records: BTreeMap<ViewCode, EndpointRecord>,
}

impl EndpointCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = EndpointRecord>) -> Self {
        let mut catalog = Self::new();
        for record in records {
            catalog.insert(record);
        }
        catalog
    }

    pub fn insert(&mut self, record: EndpointRecord) {
        self.records.insert(record.view_code_name.clone(), record);
    }

    pub fn get(&self, code: &str) -> Option<&EndpointRecord> {
        self.records.get(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.records.contains_key(code)
    }

    /// The record `code` was replaced by, if the link exists and resolves.
    pub fn successor(&self, record: &EndpointRecord) -> Option<&EndpointRecord> {
        record
            .new_compatible_view
            .as_deref()
            .and_then(|next| self.records.get(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_derives_relative_path() {
        let version = WebVersion::new(2, "2.0.0", "Two").with_api_prefix("/api");
        let mut record = EndpointRecord::new("users", 2, true).with_absolute_url("/api/v2/users");
        record.normalize(&version);
        assert_eq!(record.view_url.as_deref(), Some("/users"));

        let mut foreign = EndpointRecord::new("docs", 2, true).with_absolute_url("https://docs.example.com/");
        foreign.normalize(&version);
        assert_eq!(foreign.view_url, None);
    }

    #[test]
    fn normalize_keeps_existing_path() {
        let version = WebVersion::new(2, "2.0.0", "Two").with_api_prefix("/api");
        let mut record = EndpointRecord::new("users", 2, true)
            .with_view_url("/people")
            .with_absolute_url("/api/v2/users");
        record.normalize(&version);
        assert_eq!(record.view_url.as_deref(), Some("/people"));
    }

    #[test]
    fn self_supersession_is_invalid() {
        let record = EndpointRecord::new("users", 1, false).superseded_by("users");
        assert!(record.validate().is_err());
    }

    #[test]
    fn pending_records_have_no_version() {
        let record = EndpointRecord::pending("fresh", Some("Fresh".to_string()), true);
        assert!(record.is_pending());
        assert_eq!(record.to_string(), "Fresh (fresh)");
    }

    #[test]
    fn catalog_successor_skips_dangling_links() {
        let catalog = EndpointCatalog::from_records([
            EndpointRecord::new("a", 1, false).superseded_by("b"),
            EndpointRecord::new("b", 2, false).superseded_by("missing"),
        ]);
        let a = catalog.get("a").unwrap();
        let b = catalog.successor(a).unwrap();
        assert_eq!(b.view_code_name, "b");
        assert!(catalog.successor(b).is_none());
    }
}
