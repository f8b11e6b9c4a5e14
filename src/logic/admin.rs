use itertools::Itertools;
use serde::Serialize;
use std::collections::HashSet;

use crate::logic::app_support::{app_version_state, AppVersionState};
use crate::logic::availability::{AvailabilityResolver, VersionState};
use crate::logic::clock::Clock;
use crate::logic::errors::{AdminError, GraphCycleError};
use crate::logic::traversal::{all_predecessors, all_successors, find_cycle};
use crate::model::{
    AppVersion, BatchAction, Deprecatable, DeprecatedFilter, EndpointRecord, Searchable, VersionGraph, VersionId,
    ViewCode, WebVersion,
};
use crate::store::traits::Store;

#[derive(Debug, Clone, Serialize)]
pub struct VersionSummary {
    pub version: WebVersion,
    pub state: VersionState,
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionReport {
    pub version: WebVersion,
    pub state: VersionState,
    pub version_uri: String,
    pub all_predecessors: Vec<VersionId>,
    pub all_successors: Vec<VersionId>,
    pub incompatible_next_versions: Vec<VersionId>,
    pub views: Vec<ViewCode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppVersionReport {
    pub app_version: AppVersion,
    pub state: AppVersionState,
    pub required_endpoints: Vec<ViewCode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub action: BatchAction,
    pub requested: usize,
    pub updated: usize,
}

async fn load_graph<S: Store + ?Sized>(store: &S) -> Result<VersionGraph, AdminError> {
    Ok(VersionGraph::from_versions(store.list_versions().await?))
}

/// Save a version after field checks, edge existence checks and a cycle check.
pub async fn upsert_version<S: Store + ?Sized>(store: &S, version: WebVersion) -> Result<(), AdminError> {
    version.validate().map_err(AdminError::Validation)?;

    let mut graph = load_graph(store).await?;
    if let Some(missing) = version.all_edges().find(|id| !graph.contains(*id)) {
        return Err(AdminError::NotFound(format!("version {}", missing)));
    }
    graph.insert(version.clone());
    if let Some(cycle) = find_cycle(&graph) {
        return Err(cycle.into());
    }

    log::info!("saving website version {} ({})", version.version_id, version);
    store.upsert_version(version).await?;
    Ok(())
}

/// Replace both edge sets of one version.
pub async fn set_version_edges<S: Store + ?Sized>(
    store: &S,
    id: VersionId,
    previous: impl IntoIterator<Item = VersionId>,
    incompatible: impl IntoIterator<Item = VersionId>,
) -> Result<WebVersion, AdminError> {
    let mut version = store
        .get_version(id)
        .await?
        .ok_or_else(|| AdminError::NotFound(format!("version {}", id)))?;
    version.previous_versions = previous.into_iter().collect();
    version.incompatible_previous_versions = incompatible.into_iter().collect();
    upsert_version(store, version.clone()).await?;
    Ok(version)
}

/// Save an endpoint bound to an existing version, with an acyclic successor chain.
pub async fn upsert_endpoint<S: Store + ?Sized>(store: &S, mut record: EndpointRecord) -> Result<(), AdminError> {
    record.validate().map_err(AdminError::Validation)?;

    if let Some(version_id) = record.web_version {
        let version = store
            .get_version(version_id)
            .await?
            .ok_or_else(|| AdminError::NotFound(format!("version {}", version_id)))?;
        record.normalize(&version);
    }

    let mut path = vec![record.view_code_name.clone()];
    let mut next = record.new_compatible_view.clone();
    while let Some(code) = next {
        if path.contains(&code) {
            return Err(GraphCycleError::endpoints(&path, &code).into());
        }
        let successor = store
            .get_endpoint(&code)
            .await?
            .ok_or_else(|| AdminError::NotFound(format!("view '{}'", code)))?;
        path.push(code);
        next = successor.new_compatible_view;
    }

    log::info!("saving view {}", record);
    store.upsert_endpoint(record).await?;
    Ok(())
}

pub async fn upsert_app_version<S: Store + ?Sized>(store: &S, app: AppVersion) -> Result<(), AdminError> {
    app.validate().map_err(AdminError::Validation)?;
    if let Some(base) = app.base {
        if store.get_app_version(base).await?.is_none() {
            return Err(AdminError::NotFound(format!("app version {}", base)));
        }
    }
    if let Some(web_version) = app.base_dependency_web_version {
        if store.get_version(web_version).await?.is_none() {
            return Err(AdminError::NotFound(format!("version {}", web_version)));
        }
    }
    log::info!("saving app version {} ({})", app.version_id, app);
    store.upsert_app_version(app).await?;
    Ok(())
}

pub async fn set_required_endpoints<S: Store + ?Sized>(
    store: &S,
    app_version: VersionId,
    codes: Vec<ViewCode>,
) -> Result<(), AdminError> {
    if store.get_app_version(app_version).await?.is_none() {
        return Err(AdminError::NotFound(format!("app version {}", app_version)));
    }
    for code in &codes {
        if store.get_endpoint(code).await?.is_none() {
            return Err(AdminError::NotFound(format!("view '{}'", code)));
        }
    }
    let codes: Vec<ViewCode> = codes.into_iter().unique().collect();
    store.set_required_endpoints(app_version, &codes).await?;
    Ok(())
}

/// Ids a "deprecate" action should stamp: those not already past their date.
fn to_stamp<'a, T: Deprecatable + 'a, K>(
    items: impl IntoIterator<Item = (K, &'a T)>,
    now: chrono::DateTime<chrono::Utc>,
) -> Vec<K> {
    items
        .into_iter()
        .filter(|(_, item)| !item.is_expired(now))
        .map(|(key, _)| key)
        .collect()
}

/// Deprecate (stamp now, skipping already expired rows) or republish (clear) versions.
pub async fn batch_versions<S: Store + ?Sized>(
    store: &S,
    clock: &dyn Clock,
    ids: &[VersionId],
    action: BatchAction,
) -> Result<BatchResult, AdminError> {
    let updated = match action {
        BatchAction::Deprecate => {
            let now = clock.now();
            let wanted: HashSet<VersionId> = ids.iter().copied().collect();
            let versions: Vec<WebVersion> = store
                .list_versions()
                .await?
                .into_iter()
                .filter(|v| wanted.contains(&v.version_id))
                .collect();
            let targets = to_stamp(versions.iter().map(|v| (v.version_id, v)), now);
            store.set_versions_deprecated_at(&targets, Some(now)).await?
        }
        BatchAction::Republish => store.set_versions_deprecated_at(ids, None).await?,
    };
    log::info!("{:?} applied to {} of {} versions", action, updated, ids.len());
    Ok(BatchResult {
        action,
        requested: ids.len(),
        updated,
    })
}

pub async fn batch_endpoints<S: Store + ?Sized>(
    store: &S,
    clock: &dyn Clock,
    codes: &[ViewCode],
    action: BatchAction,
) -> Result<BatchResult, AdminError> {
    let updated = match action {
        BatchAction::Deprecate => {
            let now = clock.now();
            let mut records = Vec::new();
            for code in codes.iter().unique() {
                if let Some(record) = store.get_endpoint(code).await? {
                    records.push(record);
                }
            }
            let targets = to_stamp(records.iter().map(|r| (r.view_code_name.clone(), r)), now);
            store.set_endpoints_deprecated_at(&targets, Some(now)).await?
        }
        BatchAction::Republish => store.set_endpoints_deprecated_at(codes, None).await?,
    };
    log::info!("{:?} applied to {} of {} views", action, updated, codes.len());
    Ok(BatchResult {
        action,
        requested: codes.len(),
        updated,
    })
}

pub async fn batch_app_versions<S: Store + ?Sized>(
    store: &S,
    clock: &dyn Clock,
    ids: &[VersionId],
    action: BatchAction,
) -> Result<BatchResult, AdminError> {
    let updated = match action {
        BatchAction::Deprecate => {
            let now = clock.now();
            let wanted: HashSet<VersionId> = ids.iter().copied().collect();
            let apps: Vec<AppVersion> = store
                .list_app_versions()
                .await?
                .into_iter()
                .filter(|a| wanted.contains(&a.version_id))
                .collect();
            let targets = to_stamp(apps.iter().map(|a| (a.version_id, a)), now);
            store.set_app_versions_deprecated_at(&targets, Some(now)).await?
        }
        BatchAction::Republish => store.set_app_versions_deprecated_at(ids, None).await?,
    };
    log::info!("{:?} applied to {} of {} app versions", action, updated, ids.len());
    Ok(BatchResult {
        action,
        requested: ids.len(),
        updated,
    })
}

/// Every version with its derived state, optionally filtered on deprecation date and a search term.
pub async fn list_versions<S: Store + ?Sized>(
    store: &S,
    clock: &dyn Clock,
    filter: Option<DeprecatedFilter>,
    search: Option<&str>,
) -> Result<Vec<VersionSummary>, AdminError> {
    let now = clock.now();
    let graph = load_graph(store).await?;
    let mut availability = AvailabilityResolver::new(&graph, now);
    let mut summaries = Vec::new();
    for version in graph.versions() {
        if let Some(filter) = filter {
            if !filter.matches(version, now) {
                continue;
            }
        }
        if !search.map_or(true, |query| version.matches_search(query)) {
            continue;
        }
        summaries.push(VersionSummary {
            version: version.clone(),
            state: availability.state(version.version_id)?,
        });
    }
    Ok(summaries)
}

pub async fn version_report<S: Store + ?Sized>(
    store: &S,
    clock: &dyn Clock,
    id: VersionId,
) -> Result<VersionReport, AdminError> {
    let graph = load_graph(store).await?;
    let version = graph
        .get(id)
        .cloned()
        .ok_or_else(|| AdminError::NotFound(format!("version {}", id)))?;
    let state = AvailabilityResolver::new(&graph, clock.now()).state(id)?;
    let views = store
        .list_endpoints()
        .await?
        .into_iter()
        .filter(|record| record.web_version == Some(id))
        .map(|record| record.view_code_name)
        .sorted()
        .collect();

    Ok(VersionReport {
        version_uri: version.version_uri(),
        all_predecessors: all_predecessors(&graph, id)?,
        all_successors: all_successors(&graph, id)?,
        incompatible_next_versions: graph.incompatible_next_versions(id).collect(),
        views,
        state,
        version,
    })
}

pub async fn app_version_report<S: Store + ?Sized>(
    store: &S,
    clock: &dyn Clock,
    id: VersionId,
) -> Result<AppVersionReport, AdminError> {
    let app_version = store
        .get_app_version(id)
        .await?
        .ok_or_else(|| AdminError::NotFound(format!("app version {}", id)))?;
    let required = store.list_required_endpoints(id).await?;
    let graph = load_graph(store).await?;
    let mut availability = AvailabilityResolver::new(&graph, clock.now());
    let state = app_version_state(&mut availability, &app_version, &required)?;
    Ok(AppVersionReport {
        app_version,
        state,
        required_endpoints: required.into_iter().map(|r| r.view_code_name).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::clock::FixedClock;
    use crate::logic::errors::GraphError;
    use crate::store::traits::{EndpointStore, VersionStore};
    use crate::store::MemoryStore;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        upsert_version(&store, WebVersion::new(1, "1.0.0", "One")).await.unwrap();
        upsert_version(&store, WebVersion::new(2, "2.0.0", "Two").with_previous([1]))
            .await
            .unwrap();
        upsert_version(&store, WebVersion::new(3, "3.0.0", "Three").with_incompatible([2]))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn upsert_rejects_unknown_edges() {
        let store = seeded().await;
        let err = upsert_version(&store, WebVersion::new(5, "5.0.0", "Five").with_previous([4]))
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::NotFound(_)));
    }

    #[tokio::test]
    async fn upsert_rejects_forward_edges() {
        let store = seeded().await;
        let err = set_version_edges(&store, 1, [2], []).await.unwrap_err();
        assert!(matches!(err, AdminError::Validation(_)));
    }

    #[tokio::test]
    async fn upsert_rejects_cycles_in_loaded_graph() {
        // A cycle written by another writer is still caught on the next edit.
        let store = MemoryStore::new();
        store
            .upsert_version(WebVersion::new(1, "1.0.0", "One").with_previous([2]))
            .await
            .unwrap();
        store.upsert_version(WebVersion::new(2, "2.0.0", "Two")).await.unwrap();
        let err = upsert_version(&store, WebVersion::new(2, "2.0.0", "Two").with_previous([1]))
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::Graph(GraphError::Cycle(_))));
    }

    #[tokio::test]
    async fn endpoint_chain_cycles_are_rejected() {
        let store = seeded().await;
        upsert_endpoint(&store, EndpointRecord::new("a", 1, false)).await.unwrap();
        upsert_endpoint(&store, EndpointRecord::new("b", 2, false).superseded_by("a"))
            .await
            .unwrap();
        let err = upsert_endpoint(&store, EndpointRecord::new("a", 1, false).superseded_by("b"))
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::Graph(GraphError::Cycle(_))));
    }

    #[tokio::test]
    async fn endpoint_needs_existing_version_and_successor() {
        let store = seeded().await;
        let err = upsert_endpoint(&store, EndpointRecord::new("x", 9, false)).await.unwrap_err();
        assert!(matches!(err, AdminError::NotFound(_)));
        let err = upsert_endpoint(&store, EndpointRecord::new("x", 1, false).superseded_by("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::NotFound(_)));
    }

    #[tokio::test]
    async fn deprecate_skips_already_expired_rows() {
        let store = seeded().await;
        let earlier = now() - Duration::days(30);
        store.set_versions_deprecated_at(&[1], Some(earlier)).await.unwrap();
        let clock = FixedClock(now());

        let result = batch_versions(&store, &clock, &[1, 2], BatchAction::Deprecate).await.unwrap();
        assert_eq!(result.updated, 1);
        assert_eq!(store.get_version(1).await.unwrap().unwrap().deprecated_at, Some(earlier));
        assert_eq!(store.get_version(2).await.unwrap().unwrap().deprecated_at, Some(now()));

        let result = batch_versions(&store, &clock, &[1, 2], BatchAction::Republish).await.unwrap();
        assert_eq!(result.updated, 2);
        assert!(store.get_version(1).await.unwrap().unwrap().deprecated_at.is_none());
    }

    #[tokio::test]
    async fn deprecate_restamps_future_dates() {
        let store = seeded().await;
        upsert_endpoint(&store, EndpointRecord::new("soon", 1, false).deprecated_since(now() + Duration::days(5)))
            .await
            .unwrap();
        let clock = FixedClock(now());
        let result = batch_endpoints(&store, &clock, &["soon".to_string()], BatchAction::Deprecate)
            .await
            .unwrap();
        assert_eq!(result.updated, 1);
        assert_eq!(store.get_endpoint("soon").await.unwrap().unwrap().deprecated_at, Some(now()));
    }

    #[tokio::test]
    async fn listing_filters_on_deprecation() {
        let store = seeded().await;
        store
            .set_versions_deprecated_at(&[1], Some(now() - Duration::days(1)))
            .await
            .unwrap();
        let clock = FixedClock(now());
        let deprecated = list_versions(&store, &clock, Some(DeprecatedFilter::Yes), None).await.unwrap();
        assert_eq!(deprecated.len(), 1);
        assert_eq!(deprecated[0].version.version_id, 1);
        let live = list_versions(&store, &clock, Some(DeprecatedFilter::No), None).await.unwrap();
        assert_eq!(live.len(), 2);
        assert_eq!(list_versions(&store, &clock, None, None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn listing_searches_name_and_feature() {
        let store = seeded().await;
        let mut version = WebVersion::new(4, "4.0.0", "Four");
        version.added_feature = "Dark mode".to_string();
        upsert_version(&store, version).await.unwrap();
        let clock = FixedClock(now());

        let by_feature = list_versions(&store, &clock, None, Some("DARK")).await.unwrap();
        assert_eq!(by_feature.len(), 1);
        assert_eq!(by_feature[0].version.version_id, 4);
        let by_name = list_versions(&store, &clock, None, Some("thr")).await.unwrap();
        assert_eq!(by_name[0].version.version_id, 3);
        let by_version_name = list_versions(&store, &clock, None, Some("2.0")).await.unwrap();
        assert_eq!(by_version_name[0].version.version_id, 2);
        assert!(list_versions(&store, &clock, None, Some("nothing")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn report_walks_the_graph() {
        let store = seeded().await;
        upsert_endpoint(&store, EndpointRecord::new("home", 2, false)).await.unwrap();
        let clock = FixedClock(now());
        let report = version_report(&store, &clock, 2).await.unwrap();
        assert_eq!(report.all_predecessors, vec![1]);
        assert!(report.all_successors.is_empty());
        assert_eq!(report.incompatible_next_versions, vec![3]);
        assert_eq!(report.views, vec!["home".to_string()]);
        assert_eq!(report.version_uri, "v2");
        assert!(report.state.available);
    }
}
