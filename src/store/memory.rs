use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use crate::model::{AppVersion, EndpointRecord, VersionId, ViewCode, WebVersion};
use crate::store::traits::{AppVersionStore, EndpointStore, Store, VersionStore};

#[derive(Debug, Default)]
struct Tables {
    versions: BTreeMap<VersionId, WebVersion>,
    endpoints: BTreeMap<ViewCode, EndpointRecord>,
    app_versions: BTreeMap<VersionId, AppVersion>,
    requirements: BTreeMap<VersionId, BTreeSet<ViewCode>>,
}

/// Process-local store; every call takes the lock once and never across an await.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl VersionStore for MemoryStore {
    async fn get_version(&self, id: VersionId) -> Result<Option<WebVersion>> {
        Ok(self.tables.read().versions.get(&id).cloned())
    }

    async fn list_versions(&self) -> Result<Vec<WebVersion>> {
        Ok(self.tables.read().versions.values().cloned().collect())
    }

    async fn upsert_version(&self, version: WebVersion) -> Result<()> {
        let mut tables = self.tables.write();
        if let Some(clash) = tables
            .versions
            .values()
            .find(|other| other.version_name == version.version_name && other.version_id != version.version_id)
        {
            anyhow::bail!(
                "version name {} already used by version {}",
                version.version_name,
                clash.version_id
            );
        }
        tables.versions.insert(version.version_id, version);
        Ok(())
    }

    async fn delete_version(&self, id: VersionId) -> Result<bool> {
        Ok(self.tables.write().versions.remove(&id).is_some())
    }

    async fn set_versions_deprecated_at(&self, ids: &[VersionId], at: Option<DateTime<Utc>>) -> Result<usize> {
        let mut tables = self.tables.write();
        let mut touched = 0;
        for id in ids {
            if let Some(version) = tables.versions.get_mut(id) {
                version.deprecated_at = at;
                touched += 1;
            }
        }
        Ok(touched)
    }
}

#[async_trait::async_trait]
impl EndpointStore for MemoryStore {
    async fn get_endpoint(&self, code: &str) -> Result<Option<EndpointRecord>> {
        Ok(self.tables.read().endpoints.get(code).cloned())
    }

    async fn list_endpoints(&self) -> Result<Vec<EndpointRecord>> {
        Ok(self.tables.read().endpoints.values().cloned().collect())
    }

    async fn upsert_endpoint(&self, record: EndpointRecord) -> Result<()> {
        self.tables
            .write()
            .endpoints
            .insert(record.view_code_name.clone(), record);
        Ok(())
    }

    async fn insert_endpoint_if_absent(&self, record: EndpointRecord) -> Result<bool> {
        let mut tables = self.tables.write();
        match tables.endpoints.entry(record.view_code_name.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(true)
            }
        }
    }

    async fn set_endpoint_is_api(&self, code: &str, is_api: bool) -> Result<bool> {
        let mut tables = self.tables.write();
        Ok(match tables.endpoints.get_mut(code) {
            Some(record) => {
                record.is_api = is_api;
                true
            }
            None => false,
        })
    }

    async fn delete_endpoint(&self, code: &str) -> Result<bool> {
        let mut tables = self.tables.write();
        for required in tables.requirements.values_mut() {
            required.remove(code);
        }
        Ok(tables.endpoints.remove(code).is_some())
    }

    async fn set_endpoints_deprecated_at(&self, codes: &[ViewCode], at: Option<DateTime<Utc>>) -> Result<usize> {
        let mut tables = self.tables.write();
        let mut touched = 0;
        for code in codes {
            if let Some(record) = tables.endpoints.get_mut(code) {
                record.deprecated_at = at;
                touched += 1;
            }
        }
        Ok(touched)
    }
}

#[async_trait::async_trait]
impl AppVersionStore for MemoryStore {
    async fn get_app_version(&self, id: VersionId) -> Result<Option<AppVersion>> {
        Ok(self.tables.read().app_versions.get(&id).cloned())
    }

    async fn list_app_versions(&self) -> Result<Vec<AppVersion>> {
        Ok(self.tables.read().app_versions.values().cloned().collect())
    }

    async fn upsert_app_version(&self, app: AppVersion) -> Result<()> {
        self.tables.write().app_versions.insert(app.version_id, app);
        Ok(())
    }

    async fn delete_app_version(&self, id: VersionId) -> Result<bool> {
        let mut tables = self.tables.write();
        tables.requirements.remove(&id);
        Ok(tables.app_versions.remove(&id).is_some())
    }

    async fn set_app_versions_deprecated_at(&self, ids: &[VersionId], at: Option<DateTime<Utc>>) -> Result<usize> {
        let mut tables = self.tables.write();
        let mut touched = 0;
        for id in ids {
            if let Some(app) = tables.app_versions.get_mut(id) {
                app.deprecated_at = at;
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn list_required_endpoints(&self, app_version: VersionId) -> Result<Vec<EndpointRecord>> {
        let tables = self.tables.read();
        let Some(codes) = tables.requirements.get(&app_version) else {
            return Ok(Vec::new());
        };
        Ok(codes
            .iter()
            .filter_map(|code| tables.endpoints.get(code).cloned())
            .collect())
    }

    async fn set_required_endpoints(&self, app_version: VersionId, codes: &[ViewCode]) -> Result<()> {
        let mut tables = self.tables.write();
        if !tables.app_versions.contains_key(&app_version) {
            anyhow::bail!("app version {} does not exist", app_version);
        }
        if let Some(missing) = codes.iter().find(|code| !tables.endpoints.contains_key(*code)) {
            anyhow::bail!("endpoint '{}' does not exist", missing);
        }
        tables
            .requirements
            .insert(app_version, codes.iter().cloned().collect());
        Ok(())
    }

    async fn list_apps_requiring(&self, code: &str) -> Result<Vec<VersionId>> {
        Ok(self
            .tables
            .read()
            .requirements
            .iter()
            .filter(|(_, codes)| codes.contains(code))
            .map(|(id, _)| *id)
            .collect())
    }
}

impl Store for MemoryStore {}
