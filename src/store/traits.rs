use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::model::{AppVersion, EndpointRecord, VersionId, ViewCode, WebVersion};

#[async_trait::async_trait]
pub trait VersionStore: Send + Sync {
    async fn get_version(&self, id: VersionId) -> Result<Option<WebVersion>>;
    /// All website versions ordered by `version_id`.
    async fn list_versions(&self) -> Result<Vec<WebVersion>>;
    async fn upsert_version(&self, version: WebVersion) -> Result<()>;
    async fn delete_version(&self, id: VersionId) -> Result<bool>;
    /// Set or clear `deprecated_at` on a batch in one step; returns rows touched.
    async fn set_versions_deprecated_at(&self, ids: &[VersionId], at: Option<DateTime<Utc>>) -> Result<usize>;
}

#[async_trait::async_trait]
pub trait EndpointStore: Send + Sync {
    async fn get_endpoint(&self, code: &str) -> Result<Option<EndpointRecord>>;
    async fn list_endpoints(&self) -> Result<Vec<EndpointRecord>>;
    /// Insert or update keyed by `view_code_name`.
    async fn upsert_endpoint(&self, record: EndpointRecord) -> Result<()>;
    /// Insert only when no record holds `view_code_name`; false if one already did.
    async fn insert_endpoint_if_absent(&self, record: EndpointRecord) -> Result<bool>;
    /// Rewrite only the API flag; false when the view is unknown.
    async fn set_endpoint_is_api(&self, code: &str, is_api: bool) -> Result<bool>;
    async fn delete_endpoint(&self, code: &str) -> Result<bool>;
    async fn set_endpoints_deprecated_at(&self, codes: &[ViewCode], at: Option<DateTime<Utc>>) -> Result<usize>;
}

#[async_trait::async_trait]
pub trait AppVersionStore: Send + Sync {
    async fn get_app_version(&self, id: VersionId) -> Result<Option<AppVersion>>;
    async fn list_app_versions(&self) -> Result<Vec<AppVersion>>;
    async fn upsert_app_version(&self, app: AppVersion) -> Result<()>;
    /// Removes the release and its requirement rows.
    async fn delete_app_version(&self, id: VersionId) -> Result<bool>;
    async fn set_app_versions_deprecated_at(&self, ids: &[VersionId], at: Option<DateTime<Utc>>) -> Result<usize>;
    async fn list_required_endpoints(&self, app_version: VersionId) -> Result<Vec<EndpointRecord>>;
    async fn set_required_endpoints(&self, app_version: VersionId, codes: &[ViewCode]) -> Result<()>;
    /// App releases that list `code` among their requirements.
    async fn list_apps_requiring(&self, code: &str) -> Result<Vec<VersionId>>;
}

pub trait Store: VersionStore + EndpointStore + AppVersionStore + Send + Sync {}
