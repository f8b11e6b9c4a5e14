//! Referential rules applied before rows disappear.
//!
//! Versions are protected while anything points at them. Deleting a view nulls
//! the `new_compatible_view` of its predecessors and moves app requirements onto
//! its successor; without a successor the delete is refused. Deleting an app
//! release detaches releases that used it as their base.

use itertools::Itertools;

use crate::logic::errors::AdminError;
use crate::model::{VersionGraph, VersionId};
use crate::store::traits::Store;

pub async fn delete_version<S: Store + ?Sized>(store: &S, id: VersionId) -> Result<(), AdminError> {
    let graph = VersionGraph::from_versions(store.list_versions().await?);
    if !graph.contains(id) {
        return Err(AdminError::NotFound(format!("version {}", id)));
    }

    let mut referenced_by: Vec<String> = graph
        .versions()
        .filter(|other| other.version_id != id && other.references(id))
        .map(|other| format!("version {}", other.version_id))
        .collect();
    referenced_by.extend(
        store
            .list_endpoints()
            .await?
            .into_iter()
            .filter(|record| record.web_version == Some(id))
            .map(|record| format!("view '{}'", record.view_code_name)),
    );
    referenced_by.extend(
        store
            .list_app_versions()
            .await?
            .into_iter()
            .filter(|app| app.base_dependency_web_version == Some(id))
            .map(|app| format!("app version {}", app.version_id)),
    );

    if !referenced_by.is_empty() {
        return Err(AdminError::Restricted {
            target: format!("version {}", id),
            referenced_by: referenced_by.iter().join(", "),
        });
    }

    store.delete_version(id).await?;
    log::info!("deleted website version {}", id);
    Ok(())
}

pub async fn delete_endpoint<S: Store + ?Sized>(store: &S, code: &str) -> Result<(), AdminError> {
    let record = store
        .get_endpoint(code)
        .await?
        .ok_or_else(|| AdminError::NotFound(format!("view '{}'", code)))?;

    let requiring = store.list_apps_requiring(code).await?;
    if !requiring.is_empty() {
        let Some(successor) = record.new_compatible_view.clone() else {
            return Err(AdminError::Restricted {
                target: format!("view '{}'", code),
                referenced_by: requiring.iter().map(|id| format!("app version {}", id)).join(", "),
            });
        };
        for app_version in &requiring {
            let codes = store
                .list_required_endpoints(*app_version)
                .await?
                .into_iter()
                .map(|required| {
                    if required.view_code_name == code {
                        successor.clone()
                    } else {
                        required.view_code_name
                    }
                })
                .unique()
                .collect_vec();
            store.set_required_endpoints(*app_version, &codes).await?;
            log::info!(
                "app version {} now requires '{}' in place of '{}'",
                app_version,
                successor,
                code
            );
        }
    }

    for mut predecessor in store
        .list_endpoints()
        .await?
        .into_iter()
        .filter(|other| other.new_compatible_view.as_deref() == Some(code))
    {
        predecessor.new_compatible_view = None;
        store.upsert_endpoint(predecessor).await?;
    }

    store.delete_endpoint(code).await?;
    log::info!("deleted view '{}'", code);
    Ok(())
}

pub async fn delete_app_version<S: Store + ?Sized>(store: &S, id: VersionId) -> Result<(), AdminError> {
    if store.get_app_version(id).await?.is_none() {
        return Err(AdminError::NotFound(format!("app version {}", id)));
    }
    for mut dependant in store
        .list_app_versions()
        .await?
        .into_iter()
        .filter(|app| app.base == Some(id))
    {
        dependant.base = None;
        store.upsert_app_version(dependant).await?;
    }
    store.delete_app_version(id).await?;
    log::info!("deleted app version {}", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AppVersion, EndpointRecord, WebVersion};
    use crate::store::traits::{AppVersionStore, EndpointStore, VersionStore};
    use crate::store::MemoryStore;

    async fn store_with_views() -> MemoryStore {
        let store = MemoryStore::new();
        store.upsert_version(WebVersion::new(1, "1.0.0", "One")).await.unwrap();
        store
            .upsert_version(WebVersion::new(2, "2.0.0", "Two").with_previous([1]))
            .await
            .unwrap();
        store
            .upsert_endpoint(EndpointRecord::new("old", 1, false).superseded_by("new"))
            .await
            .unwrap();
        store.upsert_endpoint(EndpointRecord::new("new", 2, false)).await.unwrap();
        store.upsert_app_version(AppVersion::new(1, "1.0.0", "App")).await.unwrap();
        store
    }

    #[tokio::test]
    async fn referenced_version_is_protected() {
        let store = store_with_views().await;
        let err = delete_version(&store, 1).await.unwrap_err();
        match err {
            AdminError::Restricted { referenced_by, .. } => {
                assert!(referenced_by.contains("version 2"));
                assert!(referenced_by.contains("view 'old'"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(store.get_version(1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unreferenced_version_is_deleted() {
        let store = MemoryStore::new();
        store.upsert_version(WebVersion::new(7, "7.0.0", "Seven")).await.unwrap();
        delete_version(&store, 7).await.unwrap();
        assert!(store.get_version(7).await.unwrap().is_none());
        assert!(matches!(delete_version(&store, 7).await, Err(AdminError::NotFound(_))));
    }

    #[tokio::test]
    async fn requirements_move_to_successor() {
        let store = store_with_views().await;
        store.set_required_endpoints(1, &["old".to_string()]).await.unwrap();
        delete_endpoint(&store, "old").await.unwrap();
        let required = store.list_required_endpoints(1).await.unwrap();
        assert_eq!(required.len(), 1);
        assert_eq!(required[0].view_code_name, "new");
    }

    #[tokio::test]
    async fn requirement_without_successor_blocks_delete() {
        let store = store_with_views().await;
        store.set_required_endpoints(1, &["new".to_string()]).await.unwrap();
        let err = delete_endpoint(&store, "new").await.unwrap_err();
        assert!(matches!(err, AdminError::Restricted { .. }));
        assert!(store.get_endpoint("new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn predecessors_lose_their_link() {
        let store = store_with_views().await;
        delete_endpoint(&store, "new").await.unwrap();
        let old = store.get_endpoint("old").await.unwrap().unwrap();
        assert!(old.new_compatible_view.is_none());
    }

    #[tokio::test]
    async fn app_base_is_cleared() {
        let store = store_with_views().await;
        let mut second = AppVersion::new(2, "2.0.0", "App");
        second.base = Some(1);
        store.upsert_app_version(second).await.unwrap();
        delete_app_version(&store, 1).await.unwrap();
        assert!(store.get_app_version(2).await.unwrap().unwrap().base.is_none());
    }
}
