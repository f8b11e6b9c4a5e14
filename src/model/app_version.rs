use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{validators, Deprecatable, Searchable, VersionId};

/// An installable application release.
///
/// App versions sit outside the compatibility graph: `base` is build lineage
/// only, and availability comes from the endpoints the release requires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppVersion {
    pub version_id: VersionId,
    pub version_name: String,
    pub name: String,
    #[serde(default)]
    pub added_feature: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub deprecated_at: Option<DateTime<Utc>>,
    /// Stored package file name (`.apk`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dependency_web_version: Option<VersionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<VersionId>,
}

impl AppVersion {
    pub fn new(version_id: VersionId, version_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            version_id,
            version_name: version_name.into(),
            name: name.into(),
            added_feature: String::new(),
            details: String::new(),
            deprecated_at: None,
            attachment: None,
            base_dependency_web_version: None,
            base: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.version_id == 0 {
            return Err("version_id must be a positive integer".to_string());
        }
        validators::validate_version_name(&self.version_name)?;
        if let Some(base) = self.base {
            if base >= self.version_id {
                return Err(format!(
                    "Base of app version {} must be an older release, got {}",
                    self.version_id, base
                ));
            }
        }
        if let Some(attachment) = &self.attachment {
            if !attachment.to_ascii_lowercase().ends_with(".apk") {
                return Err(format!("Application file '{}' must be an .apk", attachment));
            }
        }
        Ok(())
    }
}

impl Deprecatable for AppVersion {
    fn deprecated_at(&self) -> Option<DateTime<Utc>> {
        self.deprecated_at
    }
}

impl Searchable for AppVersion {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.version_name.as_str(), self.name.as_str(), self.added_feature.as_str()]
    }
}

impl std::fmt::Display for AppVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "V{}", self.version_name)
    }
}

/// Public projection of an app version served by the read API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppVersionSummary {
    pub version_id: VersionId,
    pub version_name: String,
    pub name: String,
    pub added_feature: String,
    pub details: String,
    pub attachment: Option<String>,
    pub base: Option<VersionId>,
}

impl From<AppVersion> for AppVersionSummary {
    fn from(app: AppVersion) -> Self {
        Self {
            version_id: app.version_id,
            version_name: app.version_name,
            name: app.name,
            added_feature: app.added_feature,
            details: app.details,
            attachment: app.attachment,
            base: app.base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_must_be_older() {
        let mut app = AppVersion::new(3, "3.0.0", "Three");
        app.base = Some(2);
        assert!(app.validate().is_ok());
        app.base = Some(3);
        assert!(app.validate().is_err());
    }

    #[test]
    fn attachment_must_be_apk() {
        let mut app = AppVersion::new(1, "1.0.0", "One");
        app.attachment = Some("release.zip".to_string());
        assert!(app.validate().is_err());
        app.attachment = Some("release.APK".to_string());
        assert!(app.validate().is_ok());
    }
}
